//! Backend-independent queue interface.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use statjob_core::result::AppResult;
use statjob_core::types::{JobId, WorkerId};
use statjob_entity::queue::QueueEntry;

use crate::claim::Claim;

/// Exactly-once claim/ack protocol over job identifiers.
///
/// Every method must be safe to call concurrently from any number of
/// threads or processes sharing the backend.
pub trait WorkQueue: Send + Sync + Debug {
    /// Add a job to the backlog. Rejects a job that already has an entry.
    fn enqueue(&self, job_id: &JobId) -> AppResult<QueueEntry>;

    /// Take the earliest available job, or `None` when the backlog is
    /// empty. Never blocks and never hands the same entry to two callers.
    fn claim(&self, worker_id: &WorkerId) -> AppResult<Option<Claim>>;

    /// Release a finished claim. Must be called exactly once per claim.
    fn ack(&self, claim: &Claim) -> AppResult<()>;

    /// Entry counts.
    fn stats(&self) -> AppResult<QueueStats>;
}

/// Queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Entries waiting to be claimed.
    pub queued: usize,
    /// Entries currently claimed.
    pub claimed: usize,
    /// Age in seconds of the oldest outstanding claim.
    pub oldest_claim_age_seconds: Option<i64>,
}
