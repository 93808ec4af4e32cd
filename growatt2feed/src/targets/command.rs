use std::fmt;

use serde::Serialize;

use crate::gateway_wrapper::FormParams;
use crate::growatt::{self, PARAM_BAT_FEED, PARAM_PEAK_SHAVING};

/// A write to the device. Every command changes physical hardware state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    EnableGridFeed,
    DisableGridFeed,
    EnablePeakShaving,
}

impl Command {
    pub const ALL: [Command; 3] = [
        Command::EnableGridFeed,
        Command::DisableGridFeed,
        Command::EnablePeakShaving,
    ];

    pub fn params(self, serial_num: &str) -> FormParams {
        match self {
            Command::EnableGridFeed => growatt::storage_set(serial_num, PARAM_BAT_FEED, true),
            Command::DisableGridFeed => growatt::storage_set(serial_num, PARAM_BAT_FEED, false),
            Command::EnablePeakShaving => {
                growatt::storage_set(serial_num, PARAM_PEAK_SHAVING, true)
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Command::EnableGridFeed => "enable grid-feed",
            Command::DisableGridFeed => "disable grid-feed",
            Command::EnablePeakShaving => "enable peak-shaving",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
