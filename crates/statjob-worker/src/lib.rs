//! Worker loop and scheduled maintenance for StatJob.
//!
//! This crate provides:
//! - A worker runner that claims queued jobs and drives them to a terminal status
//! - The analysis engine boundary and a subprocess-backed engine
//! - A submitter that moves created jobs into the queue
//! - A cron scheduler that requeues abandoned claims

pub mod executor;
pub mod runner;
pub mod scheduler;
pub mod submit;

pub use executor::{AnalysisEngine, CommandEngine, EngineError, ExecutionContext};
pub use runner::{JobOutcome, WorkerRunner};
pub use scheduler::StaleClaimScheduler;
pub use submit::JobSubmitter;
