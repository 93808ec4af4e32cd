use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

fn default_base_url() -> String {
    "https://server-cn.growatt.com/tcpSet.do".into()
}

fn default_permissions_key() -> String {
    "oss_cn_".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Environment variable that supplies a device setting
fn env_var(setting: &str) -> &'static str {
    match setting {
        "device.token" => "MAKETOKEN",
        "device.serial_num" => "SERIAL_NUM",
        _ => "-",
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting `{0}` (set it in the config file or export {env})", env = env_var(.0))]
    MissingSetting(&'static str),
    #[error("low threshold {low} must be strictly below high threshold {high}")]
    InvalidThresholds { low: f64, high: f64 },
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_permissions_key")]
    pub permissions_key: String,
    /// Upper bound for a single gateway call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            permissions_key: default_permissions_key(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

// Blank values count as absent so that an exported-but-empty variable still
// short-circuits the cycle.
fn deserialize_setting<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|value| !value.trim().is_empty()))
}

/// Device settings as loaded; both may still be missing at this point.
#[derive(Deserialize, Clone, Default)]
pub struct DeviceConfig {
    #[serde(default, deserialize_with = "deserialize_setting")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_setting")]
    pub serial_num: Option<String>,
}

impl DeviceConfig {
    pub fn new(token: Option<String>, serial_num: Option<String>) -> Self {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            token: present(token),
            serial_num: present(serial_num),
        }
    }

    /// Resolve the settings every gateway call needs.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let token = self
            .token
            .clone()
            .ok_or(ConfigError::MissingSetting("device.token"))?;
        let serial_num = self
            .serial_num
            .clone()
            .ok_or(ConfigError::MissingSetting("device.serial_num"))?;
        Ok(Credentials { token, serial_num })
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("serial_num", &self.serial_num)
            .finish()
    }
}

/// Token and serial number of one device, both known to be present.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
    serial_num: String,
}

impl Credentials {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn serial_num(&self) -> &str {
        &self.serial_num
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("serial_num", &self.serial_num)
            .finish()
    }
}
