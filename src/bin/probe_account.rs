//! Probe: raw Grass API responses for one token
//!
//! Hits the profile, epoch earnings and device endpoints with GRASS_TOKEN and
//! documents:
//! - HTTP status and latency per endpoint
//! - Response envelope shape (`result.data` / `result.data.data`)
//! - Field names present on the first list entry

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::Value;

use grass_monitor::api::GrassClient;
use grass_monitor::error::MonitorError;
use grass_monitor::{DEVICES_PATH, EARNINGS_PATH, PROFILE_PATH};

const TOKEN_VAR: &str = "GRASS_TOKEN";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let token = std::env::var(TOKEN_VAR).with_context(|| format!("{TOKEN_VAR} not set"))?;
    let client = GrassClient::connect(Duration::from_secs(30))?;

    println!("=== Probe: Grass account endpoints ===\n");

    for path in [PROFILE_PATH, EARNINGS_PATH, DEVICES_PATH] {
        println!("--- GET {path} ---");
        let start = Instant::now();
        let result = client.get_raw(path, &token).await;
        println!("Latency: {:?}", start.elapsed());

        let body = match result {
            Ok(body) => body,
            Err(e @ MonitorError::Auth { .. }) => {
                println!("Auth rejected: {e}");
                println!();
                continue;
            }
            Err(e) => {
                println!("Request failed: {e}");
                println!();
                continue;
            }
        };

        let json: Value = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                println!("Body is not JSON ({e}): {}", String::from_utf8_lossy(&body));
                println!();
                continue;
            }
        };

        let data = &json["result"]["data"];
        match data.get("data").and_then(Value::as_array) {
            Some(items) => {
                println!("List payload: {} entries", items.len());
                if let Some(first) = items.first() {
                    println!("\nSample entry (first):");
                    println!("{}", serde_json::to_string_pretty(first)?);
                    println!("\nFields present:");
                    if let Some(obj) = first.as_object() {
                        for key in obj.keys() {
                            println!("  - {key}");
                        }
                    }
                }
            }
            None => {
                println!("Object payload:");
                println!("{}", serde_json::to_string_pretty(data)?);
            }
        }
        println!();
    }

    Ok(())
}
