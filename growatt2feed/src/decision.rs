use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::gateway_config::ConfigError;
use crate::sources::telemetry::Reading;

fn default_low_threshold() -> f64 {
    25.0
}

fn default_high_threshold() -> f64 {
    35.0
}

/// What a cycle should do to the grid-feed and peak-shaving settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    NoOp,
    Disable,
    Enable,
}

impl Decision {
    /// Integer encoding used by earlier deployments of this controller
    pub fn code(self) -> i8 {
        match self {
            Decision::NoOp => -1,
            Decision::Disable => 0,
            Decision::Enable => 1,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Decision::NoOp => "no-op",
            Decision::Disable => "disable",
            Decision::Enable => "enable",
        };
        f.write_str(name)
    }
}

#[derive(Deserialize)]
struct RawFeedPolicy {
    #[serde(default = "default_low_threshold")]
    low_threshold: f64,
    #[serde(default = "default_high_threshold")]
    high_threshold: f64,
}

impl TryFrom<RawFeedPolicy> for FeedPolicy {
    type Error = ConfigError;

    fn try_from(raw: RawFeedPolicy) -> Result<Self, Self::Error> {
        FeedPolicy::new(raw.low_threshold, raw.high_threshold)
    }
}

/// SOC hysteresis band. Grid-feed is shed at or below `low_threshold` and
/// resumed at or above `high_threshold`; in between nothing changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFeedPolicy")]
pub struct FeedPolicy {
    low_threshold: f64,
    high_threshold: f64,
}

impl FeedPolicy {
    /// The band must be non-empty, otherwise the controller would flap.
    pub fn new(low_threshold: f64, high_threshold: f64) -> Result<Self, ConfigError> {
        if !low_threshold.is_finite()
            || !high_threshold.is_finite()
            || low_threshold >= high_threshold
        {
            return Err(ConfigError::InvalidThresholds {
                low: low_threshold,
                high: high_threshold,
            });
        }
        Ok(Self {
            low_threshold,
            high_threshold,
        })
    }

    pub fn low_threshold(&self) -> f64 {
        self.low_threshold
    }

    pub fn high_threshold(&self) -> f64 {
        self.high_threshold
    }
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self {
            low_threshold: default_low_threshold(),
            high_threshold: default_high_threshold(),
        }
    }
}

/// Map one cycle's readings to a decision. Failed or non-numeric readings
/// never cause an action.
pub fn determine_action(policy: &FeedPolicy, soc: &Reading, feed: &Reading) -> Decision {
    let (Some(soc), Some(feed)) = (soc.value(), feed.value()) else {
        debug!("incomplete telemetry (soc: {soc}, feed: {feed}), holding");
        return Decision::NoOp;
    };
    let feed_on = feed != 0.0;

    if soc <= policy.low_threshold && feed_on {
        Decision::Disable
    } else if soc >= policy.high_threshold && !feed_on {
        Decision::Enable
    } else {
        Decision::NoOp
    }
}
