//! The job record store.
//!
//! Layout under the jobs directory:
//!
//! ```text
//! jobs/
//!   <job_id>/
//!     job.json    the record document
//!     .job.lock   lock file guarding job.json
//! ```
//!
//! There is no in-memory cache: every call re-reads from disk. Reads of a
//! current-schema document take no lock, since writers only ever replace
//! `job.json` by rename. Anything that writes (create, save, update, and
//! a load that has to migrate) holds the job's lock for the whole cycle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use statjob_core::config::storage::{StorageConfig, StoreConfig};
use statjob_core::error::{AppError, ErrorKind};
use statjob_core::events::RecordEvent;
use statjob_core::result::AppResult;
use statjob_core::traits::EventSink;
use statjob_core::types::JobId;
use statjob_entity::job::{CURRENT_SCHEMA_VERSION, JobRecord, JobStatus};

use crate::atomic::write_atomic;
use crate::lock::{ExclusiveLock, lock_exclusive};
use crate::migration::{self, Migrated};

/// Record document filename inside a job directory.
pub const RECORD_FILE: &str = "job.json";
/// Lock filename inside a job directory.
pub const LOCK_FILE: &str = ".job.lock";

/// Summary of a [`JobRecordStore::migrate_all`] sweep.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Number of job directories examined.
    pub scanned: usize,
    /// Jobs that were upgraded, with the version they started from.
    pub migrated: Vec<(JobId, u32)>,
    /// Jobs that could not be read or migrated.
    pub failed: Vec<(JobId, String)>,
}

/// Filesystem-backed store of [`JobRecord`]s.
#[derive(Debug, Clone)]
pub struct JobRecordStore {
    /// Directory containing one sub-directory per job.
    jobs_dir: PathBuf,
    /// Receiver of record events.
    events: Arc<dyn EventSink>,
    /// Whether atomic writes fsync.
    fsync: bool,
    /// Whether status changes must follow the state machine.
    enforce_transitions: bool,
}

impl JobRecordStore {
    /// Open (creating if needed) a store rooted at `jobs_dir`.
    pub fn new(jobs_dir: impl Into<PathBuf>, events: Arc<dyn EventSink>) -> AppResult<Self> {
        let jobs_dir = jobs_dir.into();
        std::fs::create_dir_all(&jobs_dir).map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create jobs directory: {}", jobs_dir.display()),
                e,
            )
        })?;
        Ok(Self {
            jobs_dir,
            events,
            fsync: true,
            enforce_transitions: false,
        })
    }

    /// Open a store from configuration.
    pub fn from_config(
        storage: &StorageConfig,
        store: &StoreConfig,
        events: Arc<dyn EventSink>,
    ) -> AppResult<Self> {
        Ok(Self::new(storage.jobs_path(), events)?
            .with_fsync(storage.fsync)
            .with_transition_enforcement(store.enforce_transitions))
    }

    /// Enable or disable fsync on writes.
    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    /// Enable or disable status-transition validation on writes.
    pub fn with_transition_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_transitions = enforce;
        self
    }

    /// Root directory of the store.
    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    /// Directory of one job.
    pub fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.jobs_dir.join(job_id.as_str())
    }

    /// Path of one job's record document.
    pub fn record_path(&self, job_id: &JobId) -> PathBuf {
        self.job_dir(job_id).join(RECORD_FILE)
    }

    fn lock_job(&self, job_id: &JobId) -> AppResult<ExclusiveLock> {
        let dir = self.job_dir(job_id);
        std::fs::create_dir_all(&dir).map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create job directory: {}", dir.display()),
                e,
            )
        })?;
        lock_exclusive(&dir.join(LOCK_FILE))
    }

    /// Whether a record document exists for `job_id`.
    pub fn exists(&self, job_id: &JobId) -> bool {
        self.record_path(job_id).is_file()
    }

    /// Create a fresh record in `created` status.
    ///
    /// A missing `job_id` is generated. Fails with `Conflict` when a
    /// record already exists for the id.
    pub fn create(&self, job_id: Option<JobId>, requirement: Option<String>) -> AppResult<JobRecord> {
        let job_id = job_id.unwrap_or_else(JobId::generate);
        let record = JobRecord::new(job_id.clone(), requirement);

        {
            let _lock = self.lock_job(&job_id)?;
            if self.exists(&job_id) {
                return Err(AppError::conflict(format!("Job already exists: {job_id}")));
            }
            self.write_record(&record)?;
        }

        info!(job_id = %job_id, "Created job record");
        self.events.emit(RecordEvent::Created { job_id }.into());
        Ok(record)
    }

    /// Load a record, migrating and persisting it first if it was written
    /// by an older schema version.
    ///
    /// Emits one `Migrated` event per applied step, in ascending order,
    /// after the migrated document is durable.
    pub fn load(&self, job_id: &JobId) -> AppResult<JobRecord> {
        let doc = self.read_document(job_id)?;
        if !migration::needs_migration(&doc)? {
            return decode(job_id, doc);
        }

        let (record, applied) = {
            let _lock = self.lock_job(job_id)?;
            self.read_migrated_locked(job_id)?
        };
        self.emit_migrations(job_id, &applied);
        Ok(record)
    }

    /// Persist `record` atomically under its job lock.
    ///
    /// Concurrent saves of the same job serialize through the lock and the
    /// last writer wins; saves of different jobs do not contend.
    pub fn save(&self, record: &JobRecord) -> AppResult<()> {
        if record.schema_version != CURRENT_SCHEMA_VERSION {
            return Err(AppError::corrupt_record(format!(
                "Refusing to save job {} at schema_version {} (current is {CURRENT_SCHEMA_VERSION})",
                record.job_id, record.schema_version
            )));
        }

        {
            let _lock = self.lock_job(&record.job_id)?;
            if self.enforce_transitions {
                if let Some(current) = self.current_status_locked(&record.job_id)? {
                    check_transition(&record.job_id, current, record.status)?;
                }
            }
            self.write_record(record)?;
        }

        self.events.emit(
            RecordEvent::Saved {
                job_id: record.job_id.clone(),
                status: record.status.to_string(),
            }
            .into(),
        );
        Ok(())
    }

    /// Locked read-modify-write of one record.
    ///
    /// `f` runs while the job lock is held, so concurrent updaters never
    /// lose each other's changes. If `f` fails nothing is written beyond a
    /// migration the load itself required.
    pub fn update<F>(&self, job_id: &JobId, f: F) -> AppResult<JobRecord>
    where
        F: FnOnce(&mut JobRecord) -> AppResult<()>,
    {
        if !self.exists(job_id) {
            return Err(AppError::not_found(format!("Job not found: {job_id}")));
        }

        let lock = self.lock_job(job_id)?;
        let (mut record, applied) = self.read_migrated_locked(job_id)?;
        let before = record.status;

        let outcome = f(&mut record).and_then(|()| {
            if record.job_id != *job_id {
                return Err(AppError::internal(format!(
                    "Update of job {job_id} changed its job_id to {}",
                    record.job_id
                )));
            }
            if self.enforce_transitions {
                check_transition(job_id, before, record.status)?;
            }
            self.write_record(&record)
        });
        drop(lock);

        // A migration the load required is durable even when `f` failed.
        self.emit_migrations(job_id, &applied);
        outcome?;

        self.events.emit(
            RecordEvent::Saved {
                job_id: job_id.clone(),
                status: record.status.to_string(),
            }
            .into(),
        );
        Ok(record)
    }

    /// Set a job's status under its lock.
    pub fn set_status(&self, job_id: &JobId, status: JobStatus) -> AppResult<JobRecord> {
        self.update(job_id, |record| {
            record.status = status;
            Ok(())
        })
    }

    /// Identifiers of every job that has a record document, sorted.
    pub fn list_ids(&self) -> AppResult<Vec<JobId>> {
        let entries = std::fs::read_dir(&self.jobs_dir).map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to list jobs directory: {}", self.jobs_dir.display()),
                e,
            )
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to read jobs directory entry", e)
            })?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Ok(job_id) = JobId::new(name) else {
                continue;
            };
            if self.exists(&job_id) {
                ids.push(job_id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Load every record once so legacy documents are upgraded on disk.
    pub fn migrate_all(&self) -> AppResult<MigrationReport> {
        let mut report = MigrationReport::default();

        for job_id in self.list_ids()? {
            report.scanned += 1;
            let from = match self
                .read_document(&job_id)
                .and_then(|doc| migration::schema_version_of(&doc))
            {
                Ok(version) => version,
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Skipping unreadable job record");
                    report.failed.push((job_id, e.to_string()));
                    continue;
                }
            };
            if from >= CURRENT_SCHEMA_VERSION {
                continue;
            }
            match self.load(&job_id) {
                Ok(_) => report.migrated.push((job_id, from)),
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Failed to migrate job record");
                    report.failed.push((job_id, e.to_string()));
                }
            }
        }

        info!(
            scanned = report.scanned,
            migrated = report.migrated.len(),
            failed = report.failed.len(),
            "Migration sweep complete"
        );
        Ok(report)
    }

    /// Read, migrate, and persist (when needed). Caller holds the job lock.
    fn read_migrated_locked(&self, job_id: &JobId) -> AppResult<(JobRecord, Vec<(u32, u32)>)> {
        let doc = self.read_document(job_id)?;
        let Migrated { document, applied } = migration::migrate(doc)?;
        let record = decode(job_id, document)?;

        if !applied.is_empty() {
            // Another loader may have migrated between our unlocked peek and
            // taking the lock; in that case `applied` is empty here and no
            // events are emitted twice.
            self.write_record(&record)?;
            debug!(job_id = %job_id, steps = applied.len(), "Persisted migrated job record");
        }
        Ok((record, applied))
    }

    fn current_status_locked(&self, job_id: &JobId) -> AppResult<Option<JobStatus>> {
        match self.read_document(job_id) {
            Ok(doc) => {
                let status = doc.get("status").cloned().ok_or_else(|| {
                    AppError::corrupt_record(format!("Job {job_id} has no status field"))
                })?;
                serde_json::from_value(status).map(Some).map_err(|e| {
                    AppError::with_source(
                        ErrorKind::CorruptRecord,
                        format!("Job {job_id} has an invalid status"),
                        e,
                    )
                })
            }
            Err(e) if e.kind == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read_document(&self, job_id: &JobId) -> AppResult<Value> {
        let path = self.record_path(job_id);
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Job not found: {job_id}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read job record: {}", path.display()),
                    e,
                )
            }
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::with_source(
                ErrorKind::CorruptRecord,
                format!("Job record is not valid JSON: {job_id}"),
                e,
            )
        })
    }

    fn write_record(&self, record: &JobRecord) -> AppResult<()> {
        let bytes = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.record_path(&record.job_id), &bytes, self.fsync)
    }

    fn emit_migrations(&self, job_id: &JobId, applied: &[(u32, u32)]) {
        for &(from_version, to_version) in applied {
            self.events.emit(
                RecordEvent::Migrated {
                    job_id: job_id.clone(),
                    from_version,
                    to_version,
                }
                .into(),
            );
        }
    }
}

/// Turn a current-schema document into a typed record.
fn decode(job_id: &JobId, doc: Value) -> AppResult<JobRecord> {
    let record: JobRecord = serde_json::from_value(doc).map_err(|e| {
        AppError::with_source(
            ErrorKind::CorruptRecord,
            format!("Job record {job_id} does not match the current schema: {e}"),
            e,
        )
    })?;
    if record.job_id != *job_id {
        return Err(AppError::corrupt_record(format!(
            "Job record in directory {job_id} belongs to job {}",
            record.job_id
        )));
    }
    Ok(record)
}

fn check_transition(job_id: &JobId, from: JobStatus, to: JobStatus) -> AppResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AppError::invalid_transition(format!(
            "Job {job_id} cannot move from {from} to {to}"
        )))
    }
}
