//! # statjob-store
//!
//! Filesystem-resident store for [`JobRecord`](statjob_entity::JobRecord)
//! documents. Each job lives in its own directory as `job.json`; writes
//! are write-new-then-rename under a per-job exclusive file lock, and
//! documents written by older schema versions are migrated step by step
//! and persisted on first load.

pub mod atomic;
pub mod lock;
pub mod migration;
pub mod record_store;

pub use lock::{ExclusiveLock, lock_exclusive, try_lock_exclusive};
pub use migration::{MigrationStep, Migrated};
pub use record_store::{JobRecordStore, MigrationReport};
