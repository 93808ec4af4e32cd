use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use crate::gateway_config::Credentials;
use crate::gateway_wrapper::{Envelope, FormParams, GatewayWrapper};
use crate::growatt;

/// Reason recorded when a read never produced a reply envelope
pub const REQUEST_FAILED: &str = "request failed";

/// Outcome of one telemetry read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "msg", rename_all = "snake_case")]
pub enum Reading {
    /// Raw register value as reported by the gateway
    Ok(String),
    /// Business or transport failure, with the reason
    Failed(String),
}

impl Reading {
    /// Numeric value of a successful reading. Blank, non-numeric and
    /// non-finite values yield `None`.
    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite()),
            Reading::Failed(_) => None,
        }
    }
}

impl From<Envelope> for Reading {
    fn from(envelope: Envelope) -> Self {
        if envelope.success {
            Reading::Ok(envelope.msg)
        } else {
            Reading::Failed(envelope.msg)
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Ok(raw) => write!(f, "ok({raw})"),
            Reading::Failed(reason) => write!(f, "failed({reason})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Soc,
    GridFeed,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Soc, Metric::GridFeed];

    pub fn params(self, serial_num: &str) -> FormParams {
        match self {
            Metric::Soc => growatt::soc_query(serial_num),
            Metric::GridFeed => growatt::bat_feed_query(serial_num),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Soc => f.write_str("SOC"),
            Metric::GridFeed => f.write_str("grid-feed"),
        }
    }
}

/// Single attempt, no retry. Transport errors are folded into
/// `Reading::Failed` so callers only ever see one failure shape.
pub async fn read(gateway: &dyn GatewayWrapper, credentials: &Credentials, metric: Metric) -> Reading {
    let params = metric.params(credentials.serial_num());
    debug!("reading {metric}: {params:?}");

    match gateway.post(credentials, &params).await {
        Ok(envelope) => envelope.into(),
        Err(e) => {
            warn!("{metric} read failed: {e:#}");
            Reading::Failed(REQUEST_FAILED.into())
        }
    }
}

pub async fn read_soc(gateway: &dyn GatewayWrapper, credentials: &Credentials) -> Reading {
    read(gateway, credentials, Metric::Soc).await
}

pub async fn read_feed_state(gateway: &dyn GatewayWrapper, credentials: &Credentials) -> Reading {
    read(gateway, credentials, Metric::GridFeed).await
}
