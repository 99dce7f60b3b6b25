//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;

use statjob_core::traits::MemoryEventSink;
use statjob_core::types::JobId;
use statjob_entity::JobStatus;
use statjob_queue::DirQueue;
use statjob_store::JobRecordStore;

/// Test environment: a store and a queue under one temp directory
pub struct TestEnv {
    /// Owns the temp directory for the lifetime of the test
    pub dir: TempDir,
    /// Captured events
    pub events: Arc<MemoryEventSink>,
    /// Record store under `<tmp>/jobs`
    pub store: Arc<JobRecordStore>,
    /// Queue under `<tmp>/queue`
    pub queue: Arc<DirQueue>,
}

impl TestEnv {
    /// Create a new test environment
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let events = Arc::new(MemoryEventSink::new());
        let store = Arc::new(
            JobRecordStore::new(dir.path().join("jobs"), events.clone())
                .expect("Failed to open store")
                .with_fsync(false),
        );
        let queue = Arc::new(
            DirQueue::new(dir.path().join("queue"), events.clone())
                .expect("Failed to open queue")
                .with_fsync(false),
        );
        Self {
            dir,
            events,
            store,
            queue,
        }
    }

    /// Open a second store handle over the same directory, as another process would
    pub fn reopen_store(&self) -> JobRecordStore {
        JobRecordStore::new(self.dir.path().join("jobs"), self.events.clone())
            .expect("Failed to reopen store")
            .with_fsync(false)
    }

    /// Open a second queue handle over the same directory
    pub fn reopen_queue(&self) -> DirQueue {
        DirQueue::new(self.dir.path().join("queue"), self.events.clone())
            .expect("Failed to reopen queue")
            .with_fsync(false)
    }

    /// Write a raw record document, bypassing the store
    pub fn write_raw(&self, job_id: &str, doc: &Value) -> PathBuf {
        let job_dir = self.dir.path().join("jobs").join(job_id);
        std::fs::create_dir_all(&job_dir).expect("Failed to create job dir");
        let path = job_dir.join("job.json");
        std::fs::write(&path, serde_json::to_vec_pretty(doc).unwrap()).expect("Failed to write");
        path
    }

    /// Read a record document straight from disk
    pub fn read_raw(&self, job_id: &str) -> Value {
        let path = self.dir.path().join("jobs").join(job_id).join("job.json");
        serde_json::from_slice(&std::fs::read(path).expect("Failed to read")).unwrap()
    }

    /// Create a job, mark it queued and enqueue it
    pub fn submit(&self, id: &str) -> JobId {
        let job_id = JobId::new(id).unwrap();
        self.store
            .create(Some(job_id.clone()), Some(format!("analyse {id}")))
            .unwrap();
        self.store.set_status(&job_id, JobStatus::Queued).unwrap();
        self.queue.enqueue(&job_id).unwrap();
        job_id
    }

    /// Count visible entries in `queue/<sub>`
    pub fn entries_in(&self, sub: &str) -> usize {
        std::fs::read_dir(self.dir.path().join("queue").join(sub))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .count()
    }
}
