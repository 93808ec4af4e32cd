use crate::gateway_wrapper::FormParams;

const ACTION_GET_DEVICE_DATA: &str = "getDeviceData";
const ACTION_READ_STORAGE_PARAM: &str = "readStorageParam";
const ACTION_SPF5000_SET: &str = "storageSPF5000Set";

const PARAM_SOC: &str = "storage_soc";
pub(crate) const PARAM_BAT_FEED: &str = "storage_spf5000_uw_bat_feed_en";
pub(crate) const PARAM_PEAK_SHAVING: &str = "storage_spf5000_ut_peak_shaving_set";

/// `startAddr`/`endAddr` value telling the gateway to read the named register only
const NO_ADDRESS_RANGE: &str = "-1";

pub(crate) fn soc_query(serial_num: &str) -> FormParams {
    vec![
        ("action", ACTION_GET_DEVICE_DATA.into()),
        ("serialNum", serial_num.into()),
        ("paramId", PARAM_SOC.into()),
    ]
}

pub(crate) fn bat_feed_query(serial_num: &str) -> FormParams {
    vec![
        ("action", ACTION_READ_STORAGE_PARAM.into()),
        ("serialNum", serial_num.into()),
        ("paramId", PARAM_BAT_FEED.into()),
        ("startAddr", NO_ADDRESS_RANGE.into()),
        ("endAddr", NO_ADDRESS_RANGE.into()),
    ]
}

pub(crate) fn storage_set(serial_num: &str, param_type: &str, enabled: bool) -> FormParams {
    vec![
        ("action", ACTION_SPF5000_SET.into()),
        ("serialNum", serial_num.into()),
        ("type", param_type.into()),
        ("param1", if enabled { "1" } else { "0" }.into()),
    ]
}
