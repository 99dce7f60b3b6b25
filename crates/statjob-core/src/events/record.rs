//! Job record events.

use serde::{Deserialize, Serialize};

use crate::types::JobId;

/// Events emitted by the job record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecordEvent {
    /// A new record was written.
    Created {
        /// The job.
        job_id: JobId,
    },
    /// One schema migration step was applied. Emitted once per step,
    /// in ascending version order.
    Migrated {
        /// The job.
        job_id: JobId,
        /// Schema version before the step.
        from_version: u32,
        /// Schema version after the step.
        to_version: u32,
    },
    /// A record was persisted.
    Saved {
        /// The job.
        job_id: JobId,
        /// Status at the time of the save.
        status: String,
    },
}
