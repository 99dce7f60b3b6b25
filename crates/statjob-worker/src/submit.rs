//! Job submission: create a record and hand it to the queue.

use std::sync::Arc;

use tracing;

use statjob_core::error::AppError;
use statjob_core::result::AppResult;
use statjob_core::types::JobId;
use statjob_entity::{JobRecord, JobStatus, QueueEntry};
use statjob_queue::WorkQueue;
use statjob_store::JobRecordStore;

/// Producer side of the worker pipeline.
#[derive(Debug, Clone)]
pub struct JobSubmitter {
    store: Arc<JobRecordStore>,
    queue: Arc<dyn WorkQueue>,
}

impl JobSubmitter {
    /// Create a submitter over a store and queue.
    pub fn new(store: Arc<JobRecordStore>, queue: Arc<dyn WorkQueue>) -> Self {
        Self { store, queue }
    }

    /// Create a record and immediately submit it.
    pub fn create_and_submit(
        &self,
        job_id: Option<JobId>,
        requirement: Option<String>,
    ) -> AppResult<(JobRecord, QueueEntry)> {
        let record = self.store.create(job_id, requirement)?;
        self.submit(&record.job_id)
    }

    /// Mark a job `queued` and enqueue it.
    ///
    /// Only `created` jobs, or `queued` jobs whose queue entry went
    /// missing, can be submitted. The status is written before the entry
    /// exists so a fast worker never sees its `claimed` status overwritten.
    pub fn submit(&self, job_id: &JobId) -> AppResult<(JobRecord, QueueEntry)> {
        let record = self.store.update(job_id, |record| match record.status {
            JobStatus::Created | JobStatus::Queued => {
                record.status = JobStatus::Queued;
                Ok(())
            }
            other => Err(AppError::invalid_transition(format!(
                "Job {job_id} cannot be submitted from status '{other}'"
            ))),
        })?;

        let entry = self.queue.enqueue(job_id)?;
        tracing::info!(job_id = %job_id, sequence = entry.sequence, "Submitted job");
        Ok((record, entry))
    }
}
