use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use grass_monitor::api::GrassClient;
use grass_monitor::config::{AppConfig, CONFIG_PATH};
use grass_monitor::monitor::{Monitor, MonitorSettings, wait_for_shutdown};
use grass_monitor::notifier::WebhookSink;
use grass_monitor::types::CycleStatus;

#[derive(Parser)]
#[command(name = "grass-monitor", about = "Poll Grass accounts and post epoch reports to a webhook")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, env = "GRASS_MONITOR_CONFIG", default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = AppConfig::load(&args.config)?;
    info!("Loaded config from {}", args.config.display());

    let settings = MonitorSettings::from(&config.settings);
    let timeout = Duration::from_secs(config.settings.request_timeout_secs);
    let source = GrassClient::connect(timeout)?;
    let sink = WebhookSink::from_config(&config.webhook, timeout)?;
    if let Some(proxy) = &config.webhook.proxy {
        info!("Delivering reports through proxy {proxy}");
    }

    info!(
        "Starting {} monitor: {} account(s), notify={:?}, interval={}s",
        settings.app_name,
        config.accounts.len(),
        settings.notify,
        settings.poll_interval.as_secs(),
    );

    let mut monitor = Monitor::new(source, sink, config.accounts, settings);

    if args.once {
        let outcomes = monitor.poll_once().await?;
        for outcome in &outcomes {
            info!(
                "{}: {:?} (changed={})",
                outcome.credential, outcome.status, outcome.changed
            );
        }
        if outcomes.iter().all(|o| o.status == CycleStatus::FetchFailed) {
            anyhow::bail!("every account failed to poll");
        }
        return Ok(());
    }

    info!("Entering polling loop. Press Ctrl+C to stop.");
    monitor
        .run_until(wait_for_shutdown(tokio::signal::ctrl_c()))
        .await;

    Ok(())
}
