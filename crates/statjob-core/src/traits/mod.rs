//! Core traits defined in `statjob-core` and implemented by other crates.

pub mod event_sink;

pub use event_sink::{EventSink, MemoryEventSink, TracingEventSink};
