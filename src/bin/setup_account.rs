//! setup-account — Add or update a monitored Grass account.
//!
//! Expects `config.toml` to already exist (copied from `config.toml.template`).
//! Validates the token against the profile endpoint, prints what the monitor
//! will see for it (username, epochs, devices), and stores the token under
//! the given account name.
//!
//! By default, reads the token interactively (hidden input) to avoid leaking
//! it into shell history. Use `--token` only for scripted/CI use.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use grass_monitor::api::{DataSource, GrassClient};
use grass_monitor::config::{AppConfig, CONFIG_PATH, Credential};
use grass_monitor::engine::{aggregate_nodes, extract_nodes, group_epochs};
use grass_monitor::reporter::{format_thousands, format_uptime};

#[derive(Parser)]
#[command(
    name = "setup-account",
    about = "Validate a Grass token, print account info, and save it to config.toml"
)]
struct Cli {
    /// Account label used in reports.
    #[arg(long)]
    name: String,

    /// Authorization token copied from the Grass dashboard.
    /// If omitted, reads interactively with hidden input (recommended).
    #[arg(long)]
    token: Option<String>,

    /// Path to the TOML config file.
    #[arg(long, env = "GRASS_MONITOR_CONFIG", default_value = CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config_path = cli.config.as_path();

    if cli.name.trim().is_empty() {
        bail!("--name cannot be empty");
    }

    let mut app_config = AppConfig::read(config_path).with_context(|| {
        format!(
            "{} not found — copy config.toml.template to config.toml first",
            config_path.display()
        )
    })?;

    println!("=== Grass Monitor — Account Setup ===\n");

    // ── Step 1: Read token ─────────────────────────────────────────
    let token = match cli.token {
        Some(token) => token.trim().to_string(),
        None => {
            let token = rpassword::prompt_password("Enter authorization token: ")
                .context("failed to read token")?;
            token.trim().to_string()
        }
    };
    if token.is_empty() {
        bail!("token cannot be empty");
    }

    let client =
        GrassClient::connect(Duration::from_secs(app_config.settings.request_timeout_secs))?;

    // ── Step 2: Validate token ─────────────────────────────────────
    println!("Validating token...");
    let profile = client
        .get_profile(&token)
        .await
        .context("profile request failed — check your token")?;
    println!("  Username: {}", profile.display_name());
    println!();

    // ── Step 3: Preview account state ──────────────────────────────
    println!("Fetching epoch earnings...");
    let earnings = client
        .get_earnings(&token)
        .await
        .context("failed to fetch epoch earnings")?;
    let epochs = group_epochs(&earnings);
    for (epoch, stat) in &epochs {
        println!(
            "  {epoch}: {} points, {} referral",
            format_thousands(stat.combined_points()),
            format_thousands(stat.referral_points)
        );
    }
    if epochs.is_empty() {
        println!("  (no epochs yet)");
    }
    println!();

    println!("Fetching devices...");
    let raw = client
        .get_devices(&token)
        .await
        .context("failed to fetch devices")?;
    let nodes = extract_nodes(&cli.name, &raw);
    let totals = aggregate_nodes(&nodes);
    println!(
        "  {} device(s): {} online, {} offline, total uptime {}",
        nodes.len(),
        totals.online_count,
        totals.offline_count,
        format_uptime(totals.total_uptime)
    );
    println!();

    // ── Step 4: Save token to config.toml ──────────────────────────
    println!("Updating account '{}' in {}...", cli.name, config_path.display());
    app_config.upsert_account(Credential {
        name: cli.name.clone(),
        token,
    });
    app_config.save(config_path)?;
    println!("  Config updated successfully");
    println!();

    println!("=== Setup Complete ===");
    println!();
    println!("Next steps:");
    println!("  cargo run --bin grass-monitor -- --once");

    Ok(())
}
