//! Telemetry boundary for domain events.

use std::fmt::Debug;
use std::sync::Mutex;

use crate::events::{DomainEvent, EventPayload, QueueEvent, RecordEvent};

/// Receiver of domain events from the store and the queue.
///
/// `emit` is called on the caller's thread, synchronously, after the
/// corresponding change is durable. Implementations must not block for
/// long and must not fail the operation that produced the event.
pub trait EventSink: Send + Sync + Debug {
    /// Deliver one event.
    fn emit(&self, event: DomainEvent);
}

/// Sink that writes every event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: DomainEvent) {
        match &event.payload {
            EventPayload::Record(RecordEvent::Migrated {
                job_id,
                from_version,
                to_version,
            }) => {
                tracing::info!(
                    event_id = %event.id,
                    job_id = %job_id,
                    from_version,
                    to_version,
                    "job record migrated"
                );
            }
            EventPayload::Record(RecordEvent::Created { job_id }) => {
                tracing::info!(event_id = %event.id, job_id = %job_id, "job record created");
            }
            EventPayload::Record(RecordEvent::Saved { job_id, status }) => {
                tracing::debug!(event_id = %event.id, job_id = %job_id, status = %status, "job record saved");
            }
            EventPayload::Queue(QueueEvent::Enqueued { job_id, sequence }) => {
                tracing::info!(event_id = %event.id, job_id = %job_id, sequence, "job enqueued");
            }
            EventPayload::Queue(QueueEvent::Claimed { job_id, worker_id }) => {
                tracing::info!(
                    event_id = %event.id,
                    job_id = %job_id,
                    worker_id = %worker_id,
                    "job claimed"
                );
            }
            EventPayload::Queue(QueueEvent::Acked { job_id, worker_id }) => {
                tracing::info!(
                    event_id = %event.id,
                    job_id = %job_id,
                    worker_id = %worker_id,
                    "claim acknowledged"
                );
            }
            EventPayload::Queue(QueueEvent::Requeued {
                job_id,
                claim_age_seconds,
            }) => {
                tracing::warn!(
                    event_id = %event.id,
                    job_id = %job_id,
                    claim_age_seconds,
                    "stale claim requeued"
                );
            }
        }
    }
}

/// Sink that keeps events in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemoryEventSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all payloads received so far.
    pub fn payloads(&self) -> Vec<EventPayload> {
        self.events
            .lock()
            .map(|events| events.iter().map(|e| e.payload.clone()).collect())
            .unwrap_or_default()
    }

    /// Record events only, in emission order.
    pub fn record_events(&self) -> Vec<RecordEvent> {
        self.payloads()
            .into_iter()
            .filter_map(|p| match p {
                EventPayload::Record(e) => Some(e),
                EventPayload::Queue(_) => None,
            })
            .collect()
    }

    /// Queue events only, in emission order.
    pub fn queue_events(&self) -> Vec<QueueEvent> {
        self.payloads()
            .into_iter()
            .filter_map(|p| match p {
                EventPayload::Queue(e) => Some(e),
                EventPayload::Record(_) => None,
            })
            .collect()
    }

    /// Drop all buffered events.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: DomainEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobId;

    #[test]
    fn test_memory_sink_preserves_order() {
        let sink = MemoryEventSink::new();
        let job_id = JobId::new("job-1").unwrap();
        for (from, to) in [(1, 2), (2, 3)] {
            sink.emit(
                RecordEvent::Migrated {
                    job_id: job_id.clone(),
                    from_version: from,
                    to_version: to,
                }
                .into(),
            );
        }
        sink.emit(
            QueueEvent::Enqueued {
                job_id: job_id.clone(),
                sequence: 1,
            }
            .into(),
        );

        let records = sink.record_events();
        assert_eq!(records.len(), 2);
        assert!(matches!(
            records[0],
            RecordEvent::Migrated { from_version: 1, to_version: 2, .. }
        ));
        assert_eq!(sink.queue_events().len(), 1);

        sink.clear();
        assert!(sink.payloads().is_empty());
    }
}
