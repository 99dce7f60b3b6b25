//! Queue pointer documents.

pub mod entry;

pub use entry::{ClaimedEntry, QueueEntry};
