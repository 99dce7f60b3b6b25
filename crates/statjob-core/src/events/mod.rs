//! Domain events emitted by the record store and the queue.
//!
//! Events are handed to an [`EventSink`](crate::traits::EventSink), which
//! forwards them to logging or telemetry collaborators.

pub mod queue;
pub mod record;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use queue::QueueEvent;
pub use record::RecordEvent;

/// Wrapper for all domain events with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub payload: EventPayload,
}

/// Union of all domain event types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event")]
pub enum EventPayload {
    /// A job record event.
    Record(RecordEvent),
    /// A work queue event.
    Queue(QueueEvent),
}

impl DomainEvent {
    /// Create a new domain event stamped with the current time.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

impl From<RecordEvent> for DomainEvent {
    fn from(event: RecordEvent) -> Self {
        Self::new(EventPayload::Record(event))
    }
}

impl From<QueueEvent> for DomainEvent {
    fn from(event: QueueEvent) -> Self {
        Self::new(EventPayload::Queue(event))
    }
}
