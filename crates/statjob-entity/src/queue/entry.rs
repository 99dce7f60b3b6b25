//! Queue entry documents.
//!
//! An entry only locates a job and orders it; the job record stays the
//! source of truth for job state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use statjob_core::types::JobId;

/// Width of the zero-padded sequence prefix in entry filenames.
pub const SEQUENCE_WIDTH: usize = 20;

/// A pointer document stored in `queued/` (and carried into `claimed/`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// The job this entry points at.
    pub job_id: JobId,
    /// Monotonic enqueue sequence; orders claims.
    pub sequence: u64,
    /// When the job was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Create an entry enqueued now.
    pub fn new(job_id: JobId, sequence: u64) -> Self {
        Self {
            job_id,
            sequence,
            enqueued_at: Utc::now(),
        }
    }

    /// Filename stem whose lexical order equals enqueue order.
    pub fn stem(&self) -> String {
        format!("{:0width$}-{}", self.sequence, self.job_id, width = SEQUENCE_WIDTH)
    }

    /// Parse `(sequence, job_id)` back out of a filename stem.
    pub fn parse_stem(stem: &str) -> Option<(u64, JobId)> {
        let (sequence, job_id) = stem.split_once('-')?;
        if sequence.len() != SEQUENCE_WIDTH {
            return None;
        }
        let sequence = sequence.parse().ok()?;
        let job_id = JobId::new(job_id).ok()?;
        Some((sequence, job_id))
    }
}

/// A `claimed/` entry as seen by inspection tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedEntry {
    /// The job.
    pub job_id: JobId,
    /// Enqueue sequence carried over from `queued/`.
    pub sequence: u64,
    /// Claim token embedded in the filename.
    pub claim_id: String,
    /// When the claim was taken.
    pub claimed_at: DateTime<Utc>,
}

impl ClaimedEntry {
    /// Age of the claim relative to `now`, in whole seconds.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.claimed_at).num_seconds()
    }
}
