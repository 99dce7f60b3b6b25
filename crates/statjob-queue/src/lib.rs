//! # statjob-queue
//!
//! Work queue giving any number of workers, in any number of processes,
//! an exactly-once claim over a shared backlog of job identifiers.
//!
//! [`DirQueue`] keeps the backlog as files in `queued/` and uses the
//! atomic rename into `claimed/` as the mutual-exclusion primitive. The
//! [`WorkQueue`] trait is the seam for swapping in another backend.

pub mod claim;
pub mod dir_queue;
pub mod work_queue;

pub use claim::Claim;
pub use dir_queue::DirQueue;
pub use work_queue::{QueueStats, WorkQueue};
