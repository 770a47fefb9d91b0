//! One-shot stale runner sweep, for cron-style scheduling.
//!
//! Only the DigitalOcean settings and reaper limits are read from the
//! environment; GitHub and Vault settings are not required.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ghr_cloud::{DigitalOceanClient, DigitalOceanConfig};
use ghr_provisioner::cleanup::{ReaperConfig, StaleResourceReaper};
use ghr_provisioner::logging;
use tracing::{error, info};

const SWEEP_DEADLINE: Duration = Duration::from_secs(120);

fn env_secs(key: &str, default: u64) -> Result<Duration> {
    let secs = match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<i64>()
            .with_context(|| format!("{key} must be an integer (seconds)."))?,
        _ => 0,
    };
    Ok(Duration::from_secs(if secs > 0 { secs as u64 } else { default }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("GHR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    logging::init_tracing(&log_level);

    let token = std::env::var("DIGITALOCEAN_TOKEN")
        .context("Missing required environment variable DIGITALOCEAN_TOKEN.")?;
    let provider = DigitalOceanClient::new(DigitalOceanConfig::new(token))
        .context("Failed to build DigitalOcean client")?;

    let config = ReaperConfig {
        max_age: env_secs("REAPER_MAX_AGE_SECS", 3600)?,
        sweep_timeout: SWEEP_DEADLINE,
        ..ReaperConfig::default()
    };
    info!(max_age_secs = config.max_age.as_secs(), tag = %config.tag, "Starting cleanup sweep");

    let reaper = StaleResourceReaper::new(Arc::new(provider), config);
    match reaper.sweep().await {
        Ok(report) => {
            info!(
                deleted = report.deleted.len(),
                failed = report.failed.len(),
                "Cleanup finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Cleanup sweep failed");
            Err(e.into())
        }
    }
}
