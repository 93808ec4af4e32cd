use std::sync::Arc;

use chrono::{DateTime, Local};
use log::{error, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::decision::{determine_action, Decision, FeedPolicy};
use crate::gateway_config::{ConfigError, DeviceConfig};
use crate::gateway_wrapper::GatewayWrapper;
use crate::sources::telemetry::{read_feed_state, read_soc, Reading};
use crate::targets::executor::{execute_action, ActionReport};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The cycle task panicked or was cancelled
    #[error("cycle aborted: {0}")]
    Aborted(String),
}

/// Everything one cycle saw and did. Not retained after it is returned.
#[derive(Debug, Clone, Serialize)]
pub struct CycleResult {
    pub started_at: DateTime<Local>,
    pub soc: Reading,
    pub feed: Reading,
    pub decision: Decision,
    pub report: ActionReport,
}

impl CycleResult {
    /// Operator-facing report, one line per command
    pub fn output(&self) -> String {
        self.report.to_string()
    }
}

/// Runs read, decide, execute against one device. Holds no state between
/// cycles; concurrent cycles are not serialised against each other.
pub struct Controller {
    gateway: Arc<dyn GatewayWrapper>,
    device: DeviceConfig,
    policy: FeedPolicy,
}

impl Controller {
    pub fn new(gateway: Arc<dyn GatewayWrapper>, device: DeviceConfig, policy: FeedPolicy) -> Self {
        Self {
            gateway,
            device,
            policy,
        }
    }

    pub async fn run_cycle(&self) -> Result<CycleResult, CycleError> {
        // before any remote call
        let credentials = self.device.credentials()?;
        let gateway = self.gateway.as_ref();
        let started_at = Local::now();

        let (soc, feed) = tokio::join!(
            read_soc(gateway, &credentials),
            read_feed_state(gateway, &credentials)
        );
        info!("SOC read: {soc}");
        info!("grid-feed read: {feed}");

        let decision = determine_action(&self.policy, &soc, &feed);
        info!("decision: {decision} ({})", decision.code());

        let report = execute_action(gateway, &credentials, decision).await;
        if report.all_succeeded() {
            info!("report: {report}");
        } else {
            warn!("report: {report}");
        }

        Ok(CycleResult {
            started_at,
            soc,
            feed,
            decision,
            report,
        })
    }

    /// Run one cycle on its own task so a panic inside it surfaces as
    /// `CycleError::Aborted` instead of taking the caller down.
    pub async fn run_isolated(self: Arc<Self>) -> Result<CycleResult, CycleError> {
        tokio::spawn(async move { self.run_cycle().await })
            .await
            .unwrap_or_else(|e| Err(CycleError::Aborted(e.to_string())))
    }

    /// Body of the scheduled trigger. Logs the outcome and hands it back; never
    /// panics.
    pub async fn run_scheduled(self: Arc<Self>, tick: u64) -> Result<CycleResult, CycleError> {
        info!("scheduled cycle #{tick} triggered");
        let result = self.run_isolated().await;
        match &result {
            Ok(cycle) => info!("scheduled cycle #{tick} finished: {}", cycle.decision),
            Err(e) => error!("scheduled cycle #{tick} failed: {e}"),
        }
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gateway_config::Credentials;
    use crate::gateway_wrapper::{Envelope, FormParams};
    use crate::sources::fake::{FakeDevice, FakeGateway, Operation};
    use crate::sources::telemetry::Metric;
    use crate::targets::command::Command;
    use async_trait::async_trait;

    fn device() -> DeviceConfig {
        DeviceConfig::new(Some("tok".into()), Some("SN42".into()))
    }

    fn controller(gateway: &Arc<FakeGateway>) -> Arc<Controller> {
        Arc::new(Controller::new(
            gateway.clone(),
            device(),
            FeedPolicy::new(25.0, 35.0).unwrap(),
        ))
    }

    fn fake(soc: &str, feed_enabled: bool) -> Arc<FakeGateway> {
        Arc::new(FakeGateway::with_device(FakeDevice {
            soc: soc.into(),
            feed_enabled,
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_low_soc_disables_feed() {
        let gateway = fake("20", true);

        let result = controller(&gateway).run_cycle().await.unwrap();

        assert_eq!(result.soc, Reading::Ok("20".into()));
        assert_eq!(result.feed, Reading::Ok("1".into()));
        assert_eq!(result.decision, Decision::Disable);
        assert_eq!(gateway.writes(), vec![Command::DisableGridFeed]);
        assert_eq!(result.output(), "disable grid-feed succeeded");
    }

    #[tokio::test]
    async fn test_low_soc_disable_rejected() {
        let gateway = Arc::new(
            FakeGateway::with_device(FakeDevice {
                soc: "20".into(),
                ..Default::default()
            })
            .respond(
                Operation::Write(Command::DisableGridFeed),
                Envelope::failed("device busy"),
            ),
        );

        let result = controller(&gateway).run_cycle().await.unwrap();

        assert_eq!(result.decision, Decision::Disable);
        assert_eq!(gateway.writes().len(), 1);
        assert_eq!(result.output(), "disable grid-feed failed: device busy");
    }

    #[tokio::test]
    async fn test_recharged_enables_feed_and_peak_shaving() {
        let gateway = fake("80", false);

        let result = controller(&gateway).run_cycle().await.unwrap();

        assert_eq!(result.decision, Decision::Enable);
        assert_eq!(
            gateway.writes(),
            vec![Command::EnableGridFeed, Command::EnablePeakShaving]
        );
        assert!(gateway.device().feed_enabled);
    }

    #[tokio::test]
    async fn test_dead_zone_reads_only() {
        let gateway = fake("30", true);

        let result = controller(&gateway).run_cycle().await.unwrap();

        assert_eq!(result.decision, Decision::NoOp);
        assert_eq!(gateway.calls().len(), 2);
        assert!(gateway.writes().is_empty());
        assert_eq!(result.output(), "no action taken");
    }

    #[tokio::test]
    async fn test_failed_read_holds() {
        let gateway = Arc::new(
            FakeGateway::with_device(FakeDevice {
                soc: "5".into(),
                ..Default::default()
            })
            .fail(Operation::Read(Metric::GridFeed), "timed out"),
        );

        let result = controller(&gateway).run_cycle().await.unwrap();

        assert_eq!(result.decision, Decision::NoOp);
        assert!(gateway.writes().is_empty());
    }

    #[tokio::test]
    async fn test_missing_config_makes_no_calls() {
        let gateway = fake("20", true);
        let controller = Controller::new(
            gateway.clone(),
            DeviceConfig::new(None, Some("SN42".into())),
            FeedPolicy::default(),
        );

        let result = controller.run_cycle().await;

        assert!(matches!(
            result,
            Err(CycleError::Config(ConfigError::MissingSetting("device.token")))
        ));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_consecutive_cycles_settle() {
        let gateway = fake("20", true);
        let controller = controller(&gateway);

        let first = controller.run_cycle().await.unwrap();
        let second = controller.run_cycle().await.unwrap();

        assert_eq!(first.decision, Decision::Disable);
        assert_eq!(second.decision, Decision::NoOp);
        assert_eq!(gateway.writes().len(), 1);
    }

    struct PanickingGateway;

    #[async_trait]
    impl GatewayWrapper for PanickingGateway {
        async fn post(&self, _: &Credentials, _: &FormParams) -> anyhow::Result<Envelope> {
            panic!("gateway exploded");
        }

        fn new(_: &crate::gateway_config::GatewayConfig) -> anyhow::Result<Self> {
            Ok(Self)
        }
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let controller = Arc::new(Controller::new(
            Arc::new(PanickingGateway),
            device(),
            FeedPolicy::default(),
        ));

        let result = controller.run_scheduled(1).await;

        assert!(matches!(result, Err(CycleError::Aborted(_))));
    }

    #[tokio::test]
    async fn test_scheduled_cycle_returns_result() {
        let gateway = fake("20", true);

        let result = controller(&gateway).run_scheduled(1).await.unwrap();

        assert_eq!(result.soc, Reading::Ok("20".into()));
        assert_eq!(result.decision, Decision::Disable);
        assert_eq!(gateway.writes(), vec![Command::DisableGridFeed]);
        assert!(!gateway.device().feed_enabled);
    }

    #[test]
    fn test_serialize_result() {
        let result = CycleResult {
            started_at: Local::now(),
            soc: Reading::Ok("20".into()),
            feed: Reading::Failed("request failed".into()),
            decision: Decision::NoOp,
            report: ActionReport::default(),
        };

        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["decision"], "no_op");
        assert_eq!(json["feed"]["status"], "failed");
        assert_eq!(json["report"]["outcomes"], serde_json::json!([]));
    }
}
