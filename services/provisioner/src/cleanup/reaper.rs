use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ghr_cloud::{ComputeProvider, InstanceId, ProviderError, RUNNER_TAG};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Time between sweeps when running in-process.
    pub interval: Duration,
    /// Instances older than this are deleted.
    pub max_age: Duration,
    /// Tag identifying runner instances.
    pub tag: String,
    /// Deadline for a single sweep.
    pub sweep_timeout: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            max_age: Duration::from_secs(3600),
            tag: RUNNER_TAG.to_string(),
            sweep_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReapError {
    #[error("listing instances failed: {0}")]
    List(#[from] ProviderError),

    #[error("sweep did not finish within {0:?}")]
    Timeout(Duration),
}

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub listed: usize,
    pub expired: usize,
    pub deleted: Vec<InstanceId>,
    pub failed: Vec<InstanceId>,
}

/// Deletes runner instances that outlived `max_age`.
///
/// Backstop for workers whose self-destruct callback never arrived.
pub struct StaleResourceReaper {
    provider: Arc<dyn ComputeProvider>,
    config: ReaperConfig,
}

impl StaleResourceReaper {
    pub fn new(provider: Arc<dyn ComputeProvider>, config: ReaperConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &ReaperConfig {
        &self.config
    }

    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            max_age_secs = self.config.max_age.as_secs(),
            tag = %self.config.tag,
            "Starting stale instance reaper"
        );

        let mut interval = tokio::time::interval(self.config.interval);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Reaper sweep failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Reaper shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One sweep against the current time, bounded by `sweep_timeout`.
    pub async fn sweep(&self) -> Result<ReapReport, ReapError> {
        let timeout = self.config.sweep_timeout;
        tokio::time::timeout(timeout, self.sweep_at(Utc::now()))
            .await
            .map_err(|_| ReapError::Timeout(timeout))?
    }

    /// One sweep treating `now` as the current time.
    ///
    /// A failed delete is logged and the sweep moves on to the next instance.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<ReapReport, ReapError> {
        let instances = self.provider.list_instances_by_tag(&self.config.tag).await?;
        let max_age = chrono::Duration::from_std(self.config.max_age)
            .unwrap_or(chrono::Duration::MAX);

        let mut report = ReapReport {
            listed: instances.len(),
            ..ReapReport::default()
        };

        for instance in instances.iter().filter(|i| i.age(now) > max_age) {
            report.expired += 1;
            let age_secs = instance.age(now).num_seconds();

            match self.provider.delete_instance(instance.id).await {
                Ok(()) | Err(ProviderError::NotFound(_)) => {
                    info!(
                        instance_id = %instance.id,
                        name = %instance.name,
                        age_secs,
                        "Deleted stale runner instance"
                    );
                    report.deleted.push(instance.id);
                }
                Err(e) => {
                    warn!(
                        instance_id = %instance.id,
                        name = %instance.name,
                        age_secs,
                        error = %e,
                        "Failed to delete stale runner instance"
                    );
                    report.failed.push(instance.id);
                }
            }
        }

        info!(
            listed = report.listed,
            expired = report.expired,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Reaper sweep complete"
        );

        Ok(report)
    }
}
