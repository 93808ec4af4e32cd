mod http;
mod logging;
mod reqwest_wrapper;

use anyhow::{bail, Context};
use clap::Parser;
use growatt2feed::controller::Controller;
use growatt2feed::decision::FeedPolicy;
use growatt2feed::gateway_config::{DeviceConfig, GatewayConfig};
use growatt2feed::gateway_wrapper::GatewayWrapper;
use growatt2feed::sources::fake::FakeGateway;
use reqwest_wrapper::ReqwestWrapper;
use serde_derive::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;

use log::{error, info, warn};

fn default_update_interval() -> u64 {
    300_000
}

#[derive(Debug, Deserialize)]
struct Config {
    /// Milliseconds between scheduled cycles
    #[serde(default = "default_update_interval")]
    update_interval: u64,
    /// Address for the on-demand HTTP trigger; no listener when absent
    listen: Option<SocketAddr>,
    #[serde(default)]
    gateway: GatewayConfig,
    #[serde(default)]
    device: DeviceConfig,
    #[serde(default)]
    policy: FeedPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
            listen: None,
            gateway: GatewayConfig::default(),
            device: DeviceConfig::default(),
            policy: FeedPolicy::default(),
        }
    }
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Use a simulated inverter instead of the Growatt API; token and serial
    /// number fall back to placeholders
    #[arg(short, long)]
    fake: bool,

    /// Run a single cycle, print its result and exit
    #[arg(long)]
    once: bool,

    /// Path to the configuration file (TOML, or YAML by extension)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Growatt API token
    #[arg(long, env = "MAKETOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Inverter serial number
    #[arg(long, env = "SERIAL_NUM")]
    serial_num: Option<String>,
}

const FAKE_TOKEN: &str = "fake-token";
const FAKE_SERIAL_NUM: &str = "FAKE0000000";

/// Merge device settings; command line and environment win over the file.
fn resolve_device(cli: DeviceConfig, file: DeviceConfig, fake: bool) -> DeviceConfig {
    let device = DeviceConfig::new(cli.token.or(file.token), cli.serial_num.or(file.serial_num));
    if !fake {
        return device;
    }
    DeviceConfig::new(
        device.token.or_else(|| Some(FAKE_TOKEN.into())),
        device.serial_num.or_else(|| Some(FAKE_SERIAL_NUM.into())),
    )
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        warn!("{} not found, using defaults", path.display());
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("could not read config file {}", path.display()))?;
    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&contents).context("yaml config unparsable")?,
        _ => toml::from_str(&contents).context("toml config unparsable")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logger();
    let args = Cli::parse();
    info!("Running revision: {}", env!("GIT_HASH"));

    let config = load_config(&args.config)?;
    let device = resolve_device(
        DeviceConfig::new(args.token, args.serial_num),
        config.device,
        args.fake,
    );
    if config.update_interval == 0 {
        bail!("update_interval must be greater than zero");
    }

    info!(
        "policy: shed grid-feed at <= {}%, resume at >= {}%",
        config.policy.low_threshold(),
        config.policy.high_threshold()
    );
    let gateway: Arc<dyn GatewayWrapper> = if args.fake {
        info!("Using a simulated inverter");
        Arc::new(FakeGateway::new(&config.gateway)?)
    } else {
        info!("gateway: {}", config.gateway.base_url);
        Arc::new(ReqwestWrapper::new(&config.gateway)?)
    };
    let controller = Arc::new(Controller::new(gateway, device, config.policy));

    if args.once {
        let cycle = controller.run_isolated().await?;
        println!("{}", serde_json::to_string_pretty(&cycle)?);
        return Ok(());
    }

    if let Some(addr) = config.listen {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("could not listen on {addr}"))?;
        info!("HTTP trigger listening on {addr}");
        let router = http::router(controller.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!("HTTP trigger stopped: {e}");
            }
        });
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(config.update_interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick = 0_u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick += 1;
                // outcome is already logged
                let _ = controller.clone().run_scheduled(tick).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}
