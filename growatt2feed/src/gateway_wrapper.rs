use crate::gateway_config::{Credentials, GatewayConfig};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Form fields of a single gateway request, in the order they are sent
pub type FormParams = Vec<(&'static str, String)>;

/// Reply envelope returned by every gateway operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    pub success: bool,
    /// Register value on successful reads, error description otherwise
    #[serde(default, deserialize_with = "deserialize_msg")]
    pub msg: String,
}

impl Envelope {
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            success: true,
            msg: msg.into(),
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: msg.into(),
        }
    }
}

// The gateway is not consistent about quoting: `msg` may come back as a JSON
// number for numeric registers.
fn deserialize_msg<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(msg) => msg,
        other => other.to_string(),
    })
}

#[async_trait]
pub trait GatewayWrapper: Send + Sync {
    // This trait decouples the control logic from the HTTP client. The binary
    // wraps its client in a new type implementing this trait; tests and the
    // `--fake` mode use the in-process fake device instead.

    /// Issue one POST with the given form fields. Any error is a transport or
    /// parse failure; business failures come back as `success: false`.
    async fn post(&self, credentials: &Credentials, params: &FormParams) -> anyhow::Result<Envelope>;

    fn new(config: &GatewayConfig) -> anyhow::Result<Self>
    where
        Self: Sized;
}

#[cfg(test)]
mod test {
    use super::Envelope;

    #[test]
    fn test_deserialize_string_msg() {
        let envelope: Envelope = serde_json::from_str(r#"{"success":true,"msg":"57"}"#).unwrap();
        assert_eq!(envelope, Envelope::ok("57"));
    }

    #[test]
    fn test_deserialize_numeric_msg() {
        let envelope: Envelope = serde_json::from_str(r#"{"success":true,"msg":57}"#).unwrap();
        assert_eq!(envelope.msg, "57");
    }

    #[test]
    fn test_deserialize_missing_msg() {
        let envelope: Envelope = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert_eq!(envelope, Envelope::failed(""));
    }

    #[test]
    fn test_missing_success_is_an_error() {
        assert!(serde_json::from_str::<Envelope>(r#"{"msg":"1"}"#).is_err());
    }
}
