//! # statjob-entity
//!
//! Data model for StatJob. [`job::JobRecord`] is the canonical,
//! persisted state of a job; [`queue::QueueEntry`] is the small pointer
//! document stored in the queue directories. All models derive `Debug`,
//! `Clone`, `Serialize`, and `Deserialize`.

pub mod job;
pub mod queue;

pub use job::{ArtifactDescriptor, JobRecord, JobStatus, RunOutcome, RunRecord};
pub use queue::{ClaimedEntry, QueueEntry};
