//! Claim tokens.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use statjob_core::types::{JobId, WorkerId};

/// Proof of exclusive processing rights over one job until it is acked.
///
/// Only a queue can issue a claim. The token is not persisted beyond the
/// `claimed/` entry it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    job_id: JobId,
    worker_id: WorkerId,
    claimed_at: DateTime<Utc>,
    claim_id: Uuid,
    sequence: u64,
    entry_name: String,
    queue_root: PathBuf,
}

impl Claim {
    pub(crate) fn new(
        job_id: JobId,
        worker_id: WorkerId,
        claimed_at: DateTime<Utc>,
        claim_id: Uuid,
        sequence: u64,
        entry_name: String,
        queue_root: PathBuf,
    ) -> Self {
        Self {
            job_id,
            worker_id,
            claimed_at,
            claim_id,
            sequence,
            entry_name,
            queue_root,
        }
    }

    /// The claimed job.
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// The worker holding the claim.
    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// When the claim was taken.
    pub fn claimed_at(&self) -> DateTime<Utc> {
        self.claimed_at
    }

    /// Unique token of this claim.
    pub fn claim_id(&self) -> Uuid {
        self.claim_id
    }

    /// Enqueue sequence of the claimed entry.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn entry_name(&self) -> &str {
        &self.entry_name
    }

    pub(crate) fn queue_root(&self) -> &Path {
        &self.queue_root
    }
}
