//! Work queue events.

use serde::{Deserialize, Serialize};

use crate::types::{JobId, WorkerId};

/// Events emitted by the work queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    /// A job entry was placed in `queued/`.
    Enqueued {
        /// The job.
        job_id: JobId,
        /// Ordering sequence assigned to the entry.
        sequence: u64,
    },
    /// A worker won the rename race for an entry.
    Claimed {
        /// The job.
        job_id: JobId,
        /// The claiming worker.
        worker_id: WorkerId,
    },
    /// A claim was acknowledged and its entry removed.
    Acked {
        /// The job.
        job_id: JobId,
        /// The worker that held the claim.
        worker_id: WorkerId,
    },
    /// An abandoned claim was moved back to `queued/`.
    Requeued {
        /// The job.
        job_id: JobId,
        /// Age of the claim in seconds when it was revoked.
        claim_age_seconds: i64,
    },
}
