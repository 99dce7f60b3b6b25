//! Job status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a job.
///
/// `created → queued → claimed → running → {succeeded | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Record written, not yet submitted.
    Created,
    /// Entry placed in the work queue.
    Queued,
    /// A worker holds the claim.
    Claimed,
    /// The engine is executing.
    Running,
    /// Execution finished successfully.
    Succeeded,
    /// Execution finished with an error.
    Failed,
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [JobStatus; 6] = [
        Self::Created,
        Self::Queued,
        Self::Claimed,
        Self::Running,
        Self::Succeeded,
        Self::Failed,
    ];

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether moving from `self` to `next` is an edge of the state machine.
    ///
    /// Staying in the same status is always allowed. `claimed → queued`
    /// covers stale-claim requeue and `claimed → failed` covers jobs that
    /// fail before the engine starts. `running → claimed` is a re-attempt:
    /// a worker reclaiming a job whose previous run was abandoned.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Self::Created, Self::Queued)
                | (Self::Queued, Self::Claimed)
                | (Self::Claimed, Self::Running)
                | (Self::Claimed, Self::Queued)
                | (Self::Claimed, Self::Failed)
                | (Self::Running, Self::Claimed)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Queued => "queued",
            Self::Claimed => "claimed",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
