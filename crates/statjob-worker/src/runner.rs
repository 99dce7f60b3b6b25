//! Worker runner: main loop that claims jobs and drives them to completion.
//!
//! Each claimed job goes through
//! `claimed → running (+ run record) → execute → succeeded | failed → ack`.
//! The record store and queue block on file locks, so every call into them
//! runs on the blocking thread pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::time;
use tracing;

use statjob_core::config::worker::WorkerConfig;
use statjob_core::error::{AppError, ErrorKind};
use statjob_core::result::AppResult;
use statjob_core::types::{JobId, WorkerId};
use statjob_entity::{JobStatus, RunOutcome};
use statjob_queue::{Claim, WorkQueue};
use statjob_store::JobRecordStore;

use crate::executor::{AnalysisEngine, EngineError, ExecutionContext};

/// How long shutdown waits for in-flight jobs.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Final state of one processed claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    /// The processed job.
    pub job_id: JobId,
    /// Terminal status written to the record.
    pub status: JobStatus,
    /// Number of artifacts indexed by this run.
    pub artifacts: usize,
}

/// Claims jobs from the queue and executes them with an analysis engine
#[derive(Debug, Clone)]
pub struct WorkerRunner {
    /// Record store holding job state
    store: Arc<JobRecordStore>,
    /// Queue to claim from
    queue: Arc<dyn WorkQueue>,
    /// Engine that performs the analysis
    engine: Arc<dyn AnalysisEngine>,
    /// Worker configuration
    config: WorkerConfig,
    /// Worker identifier stamped on claims and runs
    worker_id: WorkerId,
}

impl WorkerRunner {
    /// Create a new worker runner
    pub fn new(
        store: Arc<JobRecordStore>,
        queue: Arc<dyn WorkQueue>,
        engine: Arc<dyn AnalysisEngine>,
        config: WorkerConfig,
        worker_id: WorkerId,
    ) -> Self {
        Self {
            store,
            queue,
            engine,
            config,
            worker_id,
        }
    }

    /// Worker identifier
    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Start the worker runner. Runs until the cancel signal is received
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let concurrency = self.config.concurrency.max(1);
        tracing::info!(
            worker_id = %self.worker_id,
            concurrency,
            poll_interval_ms = self.config.poll_interval_ms,
            engine = self.engine.name(),
            "Worker started"
        );

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if *cancel.borrow() {
                break;
            }

            // Keep claiming while work is available and slots are free.
            if self.poll_and_execute(&semaphore).await {
                continue;
            }

            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!(worker_id = %self.worker_id, "Worker received shutdown signal");
                        break;
                    }
                }
                _ = time::sleep(poll_interval) => {}
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Worker waiting for in-flight jobs to complete...");

        let _ = time::timeout(SHUTDOWN_GRACE, semaphore.acquire_many(concurrency as u32)).await;

        tracing::info!(worker_id = %self.worker_id, "Worker shut down complete");
    }

    /// Claim one job and spawn its processing. Returns whether a job was claimed.
    async fn poll_and_execute(&self, semaphore: &Arc<Semaphore>) -> bool {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::trace!("All worker slots occupied, waiting...");
                return false;
            }
        };

        match self.claim().await {
            Ok(Some(claim)) => {
                let runner = self.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    let job_id = claim.job_id().clone();
                    if let Err(e) = runner.process(claim).await {
                        tracing::error!(job_id = %job_id, error = %e, "Job processing failed");
                    }
                });
                true
            }
            Ok(None) => {
                tracing::trace!("No jobs available");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim job");
                false
            }
        }
    }

    /// Claim and fully process at most one job.
    ///
    /// Returns `None` when the queue is empty.
    pub async fn run_once(&self) -> AppResult<Option<JobOutcome>> {
        match self.claim().await? {
            Some(claim) => self.process(claim).await.map(Some),
            None => Ok(None),
        }
    }

    /// Process jobs one at a time until the queue is empty.
    pub async fn drain(&self) -> AppResult<Vec<JobOutcome>> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.run_once().await? {
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn claim(&self) -> AppResult<Option<Claim>> {
        let queue = Arc::clone(&self.queue);
        let worker_id = self.worker_id.clone();
        blocking(move || queue.claim(&worker_id)).await
    }

    /// Drive one claim to a terminal status and ack it.
    ///
    /// A claim whose record is missing or unreadable is acked without
    /// processing so it cannot block the queue; the error is returned.
    /// Storage failures leave the claim in place for stale-claim requeue.
    pub async fn process(&self, claim: Claim) -> AppResult<JobOutcome> {
        let job_id = claim.job_id().clone();

        let ctx = match self.start_run(&claim).await {
            Ok(ctx) => ctx,
            Err(e) if e.is(ErrorKind::NotFound) || e.is(ErrorKind::CorruptRecord) => {
                tracing::error!(job_id = %job_id, error = %e, "Dropping claim for unusable job record");
                self.ack(claim).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            job_id = %job_id,
            worker_id = %self.worker_id,
            run_id = %ctx.run_id,
            "Processing job"
        );

        let result = self.engine.execute(&ctx).await;

        let (status, outcome, error, artifacts) = match result {
            Ok(artifacts) => {
                tracing::info!(job_id = %job_id, artifacts = artifacts.len(), "Job completed successfully");
                (JobStatus::Succeeded, RunOutcome::Succeeded, None, artifacts)
            }
            Err(EngineError::Internal(err)) => {
                tracing::error!(job_id = %job_id, error = %err, "Job internal error");
                (JobStatus::Failed, RunOutcome::Failed, Some(err.to_string()), Vec::new())
            }
            Err(err) => {
                tracing::warn!(job_id = %job_id, error = %err, "Job failed");
                (JobStatus::Failed, RunOutcome::Failed, Some(err.to_string()), Vec::new())
            }
        };

        let store = Arc::clone(&self.store);
        let finish_id = job_id.clone();
        let artifact_count = blocking(move || {
            let mut added: usize = 0;
            store.update(&finish_id, |record| {
                record.finish_run(outcome, error);
                for artifact in artifacts {
                    if record.add_artifact(artifact) {
                        added += 1;
                    }
                }
                record.status = status;
                Ok(())
            })?;
            Ok(added)
        })
        .await?;

        self.ack(claim).await?;

        Ok(JobOutcome {
            job_id,
            status,
            artifacts: artifact_count,
        })
    }

    /// Record the claim, then open a run and mark the job running.
    ///
    /// A job reclaimed after a stale requeue is still `claimed` or
    /// `running`; its open runs are closed as failed before the new claim
    /// is recorded.
    async fn start_run(&self, claim: &Claim) -> AppResult<ExecutionContext> {
        let store = Arc::clone(&self.store);
        let job_id = claim.job_id().clone();
        let worker_id = self.worker_id.clone();

        blocking(move || {
            let mut abandoned = 0;
            store.update(&job_id, |record| {
                while record.finish_run(
                    RunOutcome::Failed,
                    Some(format!("Run abandoned; job reclaimed by {worker_id}")),
                ) {
                    abandoned += 1;
                }
                record.status = JobStatus::Claimed;
                Ok(())
            })?;
            if abandoned > 0 {
                tracing::warn!(job_id = %job_id, abandoned, "Closed abandoned runs of reclaimed job");
            }

            let mut run_id = String::new();
            let record = store.update(&job_id, |record| {
                run_id = record.start_run(worker_id.clone()).run_id.clone();
                record.status = JobStatus::Running;
                Ok(())
            })?;

            Ok(ExecutionContext {
                job_dir: store.job_dir(&job_id),
                job_id,
                worker_id,
                run_id,
                requirement: record.requirement,
            })
        })
        .await
    }

    async fn ack(&self, claim: Claim) -> AppResult<()> {
        let queue = Arc::clone(&self.queue);
        blocking(move || queue.ack(&claim)).await
    }
}

/// Run a store or queue call on the blocking thread pool.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal(format!("Blocking task failed: {e}")))?
}
