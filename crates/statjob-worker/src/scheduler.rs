//! Cron scheduler for the stale-claim sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use statjob_core::config::worker::WorkerConfig;
use statjob_core::error::AppError;
use statjob_queue::DirQueue;

/// Periodically moves abandoned claims back into the queue
pub struct StaleClaimScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Queue swept on each tick
    queue: Arc<DirQueue>,
    /// Claims older than this are requeued
    lease: Duration,
}

impl std::fmt::Debug for StaleClaimScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaleClaimScheduler")
            .field("queue", &self.queue.root())
            .field("lease", &self.lease)
            .finish()
    }
}

impl StaleClaimScheduler {
    /// Create a new scheduler
    pub async fn new(queue: Arc<DirQueue>, lease: Duration) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            queue,
            lease,
        })
    }

    /// Create and register the sweep from worker configuration.
    ///
    /// Returns `None` when `claim_lease_seconds` is `0`.
    pub async fn from_config(
        queue: Arc<DirQueue>,
        config: &WorkerConfig,
    ) -> Result<Option<Self>, AppError> {
        if config.claim_lease_seconds == 0 {
            tracing::info!("Stale-claim requeue disabled (claim_lease_seconds = 0)");
            return Ok(None);
        }

        let scheduler = Self::new(queue, Duration::from_secs(config.claim_lease_seconds)).await?;
        scheduler.register_sweep(&config.stale_claim_cron).await?;
        Ok(Some(scheduler))
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Stale-claim scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Stale-claim scheduler shut down");
        Ok(())
    }

    /// Stale-claim sweep on `schedule` (cron with seconds)
    pub async fn register_sweep(&self, schedule: &str) -> Result<(), AppError> {
        let queue = Arc::clone(&self.queue);
        let lease = self.lease;
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            Box::pin(async move {
                tracing::debug!("Sweeping stale claims");
                match tokio::task::spawn_blocking(move || queue.requeue_stale(lease)).await {
                    Ok(Ok(requeued)) if !requeued.is_empty() => {
                        tracing::warn!(count = requeued.len(), "Requeued abandoned claims");
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "Stale-claim sweep failed"),
                    Err(e) => tracing::error!(error = %e, "Stale-claim sweep task panicked"),
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid stale_claim_cron '{}': {}",
                schedule, e
            ))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add stale-claim schedule: {}", e))
        })?;

        tracing::info!(
            schedule,
            lease_seconds = self.lease.as_secs(),
            "Registered: stale-claim sweep"
        );
        Ok(())
    }
}
