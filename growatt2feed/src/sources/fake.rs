use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use async_trait::async_trait;
use log::debug;

use super::telemetry::Metric;
use crate::gateway_config::{Credentials, GatewayConfig};
use crate::gateway_wrapper::{Envelope, FormParams, GatewayWrapper};
use crate::targets::command::Command;

/// A request the fake gateway recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read(Metric),
    Write(Command),
}

impl Operation {
    fn classify(params: &FormParams) -> Option<Self> {
        let serial_num = params
            .iter()
            .find(|(key, _)| *key == "serialNum")
            .map(|(_, value)| value.as_str())?;

        Metric::ALL
            .into_iter()
            .find(|metric| metric.params(serial_num) == *params)
            .map(Operation::Read)
            .or_else(|| {
                Command::ALL
                    .into_iter()
                    .find(|command| command.params(serial_num) == *params)
                    .map(Operation::Write)
            })
    }
}

/// Simulated inverter state behind the fake gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeDevice {
    /// Reported verbatim, so tests can feed it garbage
    pub soc: String,
    pub feed_enabled: bool,
    pub peak_shaving_enabled: bool,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self {
            soc: "50".into(),
            feed_enabled: true,
            peak_shaving_enabled: true,
        }
    }
}

enum Reply {
    Envelope(Envelope),
    TransportError(String),
}

/// In-process stand-in for the Growatt gateway. Reads report the simulated
/// device, writes change it, and any operation can be overridden with a fixed
/// reply. Every recognised request is recorded.
#[derive(Default)]
pub struct FakeGateway {
    device: Mutex<FakeDevice>,
    overrides: HashMap<Operation, Reply>,
    calls: Mutex<Vec<Operation>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeGateway {
    pub fn with_device(device: FakeDevice) -> Self {
        Self {
            device: Mutex::new(device),
            ..Default::default()
        }
    }

    /// Answer `operation` with `envelope` instead of simulating it.
    pub fn respond(mut self, operation: Operation, envelope: Envelope) -> Self {
        self.overrides.insert(operation, Reply::Envelope(envelope));
        self
    }

    /// Make `operation` fail as if the transport broke.
    pub fn fail(mut self, operation: Operation, reason: impl Into<String>) -> Self {
        self.overrides
            .insert(operation, Reply::TransportError(reason.into()));
        self
    }

    pub fn calls(&self) -> Vec<Operation> {
        lock(&self.calls).clone()
    }

    pub fn writes(&self) -> Vec<Command> {
        self.calls()
            .into_iter()
            .filter_map(|operation| match operation {
                Operation::Write(command) => Some(command),
                Operation::Read(_) => None,
            })
            .collect()
    }

    pub fn device(&self) -> FakeDevice {
        lock(&self.device).clone()
    }

    fn simulate(&self, operation: Operation) -> Envelope {
        let mut device = lock(&self.device);
        match operation {
            Operation::Read(Metric::Soc) => Envelope::ok(device.soc.clone()),
            Operation::Read(Metric::GridFeed) => {
                Envelope::ok(if device.feed_enabled { "1" } else { "0" })
            }
            Operation::Write(command) => {
                match command {
                    Command::EnableGridFeed => device.feed_enabled = true,
                    Command::DisableGridFeed => device.feed_enabled = false,
                    Command::EnablePeakShaving => device.peak_shaving_enabled = true,
                }
                Envelope::ok("")
            }
        }
    }
}

#[async_trait]
impl GatewayWrapper for FakeGateway {
    async fn post(&self, _credentials: &Credentials, params: &FormParams) -> anyhow::Result<Envelope> {
        let operation =
            Operation::classify(params).ok_or_else(|| anyhow!("unsupported request: {params:?}"))?;
        debug!("fake gateway: {operation:?}");
        lock(&self.calls).push(operation);

        match self.overrides.get(&operation) {
            Some(Reply::Envelope(envelope)) => Ok(envelope.clone()),
            Some(Reply::TransportError(reason)) => Err(anyhow!("{reason}")),
            None => Ok(self.simulate(operation)),
        }
    }

    fn new(_config: &GatewayConfig) -> anyhow::Result<Self> {
        Ok(Self::default())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gateway_config::DeviceConfig;

    fn credentials() -> Credentials {
        DeviceConfig::new(Some("tok".into()), Some("SN42".into()))
            .credentials()
            .unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            Operation::classify(&Metric::GridFeed.params("X")),
            Some(Operation::Read(Metric::GridFeed))
        );
        assert_eq!(
            Operation::classify(&Command::EnablePeakShaving.params("X")),
            Some(Operation::Write(Command::EnablePeakShaving))
        );
        assert_eq!(Operation::classify(&vec![("action", "reboot".into())]), None);
    }

    #[tokio::test]
    async fn test_writes_change_device() {
        let gateway = FakeGateway::default();
        let credentials = credentials();

        gateway
            .post(&credentials, &Command::DisableGridFeed.params("SN42"))
            .await
            .unwrap();
        let feed = gateway
            .post(&credentials, &Metric::GridFeed.params("SN42"))
            .await
            .unwrap();

        assert!(!gateway.device().feed_enabled);
        assert_eq!(feed, Envelope::ok("0"));
    }

    #[tokio::test]
    async fn test_unknown_request_is_rejected() {
        let gateway = FakeGateway::default();

        let result = gateway
            .post(&credentials(), &vec![("action", "reboot".into())])
            .await;

        assert!(result.is_err());
        assert!(gateway.calls().is_empty());
    }
}
