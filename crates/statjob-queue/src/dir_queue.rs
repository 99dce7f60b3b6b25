//! Directory-backed exactly-once queue.
//!
//! ```text
//! queue/
//!   .queue.lock                                 serializes enqueue and requeue
//!   .sequence                                   last issued sequence number
//!   queued/<seq:020>-<job_id>.json              waiting entries
//!   claimed/<seq:020>-<job_id>~<claim>.json     claimed entries
//! ```
//!
//! `claim()` renames a `queued/` entry to a fresh name in `claimed/`.
//! The filesystem lets exactly one rename of a given source path succeed;
//! every loser sees `NotFound` and moves on to the next candidate. Claims
//! never take a lock and never block.
//!
//! Entries only move `queued → claimed` outside the queue lock. The
//! reverse move (stale-claim requeue) and entry creation both hold the
//! lock, which keeps the duplicate-enqueue scan race free.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use statjob_core::config::storage::StorageConfig;
use statjob_core::error::{AppError, ErrorKind};
use statjob_core::events::QueueEvent;
use statjob_core::result::AppResult;
use statjob_core::traits::EventSink;
use statjob_core::types::{JobId, WorkerId};
use statjob_entity::queue::{ClaimedEntry, QueueEntry};
use statjob_store::atomic::write_atomic;
use statjob_store::lock::lock_exclusive;

use crate::claim::Claim;
use crate::work_queue::{QueueStats, WorkQueue};

const QUEUED_DIR: &str = "queued";
const CLAIMED_DIR: &str = "claimed";
const LOCK_FILE: &str = ".queue.lock";
const SEQUENCE_FILE: &str = ".sequence";
const ENTRY_EXT: &str = ".json";
const CLAIM_SEPARATOR: char = '~';

/// Work queue stored as pointer files in `queued/` and `claimed/`.
#[derive(Debug, Clone)]
pub struct DirQueue {
    /// Queue root directory.
    root: PathBuf,
    /// Receiver of queue events.
    events: Arc<dyn EventSink>,
    /// Whether entry writes fsync.
    fsync: bool,
}

impl DirQueue {
    /// Open (creating if needed) a queue rooted at `root`.
    ///
    /// The root is stored canonicalized.
    pub fn new(root: impl Into<PathBuf>, events: Arc<dyn EventSink>) -> AppResult<Self> {
        let root = root.into();
        for dir in [root.join(QUEUED_DIR), root.join(CLAIMED_DIR)] {
            fs::create_dir_all(&dir).map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create queue directory: {}", dir.display()),
                    e,
                )
            })?;
        }
        let root = fs::canonicalize(&root).map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to resolve queue directory: {}", root.display()),
                e,
            )
        })?;
        Ok(Self {
            root,
            events,
            fsync: true,
        })
    }

    /// Open a queue from configuration.
    pub fn from_config(storage: &StorageConfig, events: Arc<dyn EventSink>) -> AppResult<Self> {
        Ok(Self::new(storage.queue_path(), events)?.with_fsync(storage.fsync))
    }

    /// Enable or disable fsync on entry writes.
    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    /// Queue root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn queued_dir(&self) -> PathBuf {
        self.root.join(QUEUED_DIR)
    }

    fn claimed_dir(&self) -> PathBuf {
        self.root.join(CLAIMED_DIR)
    }

    /// Add `job_id` to the backlog.
    ///
    /// Fails with `DuplicateEnqueue` while the job still has an entry in
    /// `queued/` or `claimed/`; once acked it may be enqueued again.
    pub fn enqueue(&self, job_id: &JobId) -> AppResult<QueueEntry> {
        let entry = {
            let _lock = lock_exclusive(&self.root.join(LOCK_FILE))?;

            // Scan queued/ before claimed/: an entry can only move in that
            // direction while we hold the lock, so it cannot slip past.
            let queued = self.scan_queued()?;
            let claimed = self.scan_claimed()?;
            if queued.iter().any(|(_, _, id)| id == job_id)
                || claimed.iter().any(|c| &c.job_id == job_id)
            {
                return Err(AppError::duplicate_enqueue(format!(
                    "Job {job_id} is already queued or claimed"
                )));
            }

            let highest_seen = queued
                .iter()
                .map(|(_, seq, _)| *seq)
                .chain(claimed.iter().map(|c| c.sequence))
                .max()
                .unwrap_or(0);
            let sequence = self.read_sequence()?.max(highest_seen) + 1;
            self.write_sequence(sequence)?;

            let entry = QueueEntry::new(job_id.clone(), sequence);
            let path = self
                .queued_dir()
                .join(format!("{}{ENTRY_EXT}", entry.stem()));
            write_atomic(&path, &serde_json::to_vec_pretty(&entry)?, self.fsync)?;
            entry
        };

        debug!(job_id = %job_id, sequence = entry.sequence, "Enqueued job");
        self.events.emit(
            QueueEvent::Enqueued {
                job_id: job_id.clone(),
                sequence: entry.sequence,
            }
            .into(),
        );
        Ok(entry)
    }

    /// Claim the earliest entry this scan can win.
    ///
    /// Lists `queued/` once, in ascending filename order, and tries to
    /// rename each candidate into `claimed/`. Losing a race just moves on
    /// to the next candidate. Returns `None` when the listing is exhausted.
    pub fn claim(&self, worker_id: &WorkerId) -> AppResult<Option<Claim>> {
        let queued_dir = self.queued_dir();
        let claimed_dir = self.claimed_dir();

        for (name, sequence, job_id) in self.scan_queued()? {
            let claim_id = Uuid::now_v7();
            let stem = name.trim_end_matches(ENTRY_EXT);
            let claimed_name = format!("{stem}{CLAIM_SEPARATOR}{}{ENTRY_EXT}", claim_id.simple());

            match fs::rename(queued_dir.join(&name), claimed_dir.join(&claimed_name)) {
                Ok(()) => {
                    let claimed_at = claim_time(&claim_id).unwrap_or_else(Utc::now);
                    debug!(job_id = %job_id, worker_id = %worker_id, "Claimed job");
                    self.events.emit(
                        QueueEvent::Claimed {
                            job_id: job_id.clone(),
                            worker_id: worker_id.clone(),
                        }
                        .into(),
                    );
                    return Ok(Some(Claim::new(
                        job_id,
                        worker_id.clone(),
                        claimed_at,
                        claim_id,
                        sequence,
                        claimed_name,
                        self.root.clone(),
                    )));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(job_id = %job_id, worker_id = %worker_id, "Lost claim race, trying next entry");
                }
                Err(e) => {
                    return Err(AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to claim queue entry {name}"),
                        e,
                    ));
                }
            }
        }

        Ok(None)
    }

    /// Remove a claim's `claimed/` entry.
    ///
    /// A second ack of the same claim (or an ack after the claim was
    /// requeued as stale) fails with `DuplicateAck`. A claim issued by a
    /// different queue fails with `UnknownClaim`.
    pub fn ack(&self, claim: &Claim) -> AppResult<()> {
        if claim.queue_root() != self.root.as_path() {
            return Err(AppError::unknown_claim(format!(
                "Claim {} for job {} was issued by queue {}",
                claim.claim_id(),
                claim.job_id(),
                claim.queue_root().display()
            )));
        }

        match fs::remove_file(self.claimed_dir().join(claim.entry_name())) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AppError::duplicate_ack(format!(
                    "Claim {} for job {} is no longer held",
                    claim.claim_id(),
                    claim.job_id()
                )));
            }
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to ack claim for job {}", claim.job_id()),
                    e,
                ));
            }
        }

        debug!(job_id = %claim.job_id(), worker_id = %claim.worker_id(), "Acked claim");
        self.events.emit(
            QueueEvent::Acked {
                job_id: claim.job_id().clone(),
                worker_id: claim.worker_id().clone(),
            }
            .into(),
        );
        Ok(())
    }

    /// Move claims older than `max_age` back into `queued/`.
    ///
    /// Requeued entries keep their original sequence, so they are claimed
    /// ahead of newer work. A claim acked concurrently simply wins. Returns
    /// the requeued job ids.
    pub fn requeue_stale(&self, max_age: Duration) -> AppResult<Vec<JobId>> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| AppError::configuration(format!("Invalid claim lease: {e}")))?;
        let now = Utc::now();
        let mut requeued = Vec::new();

        let _lock = lock_exclusive(&self.root.join(LOCK_FILE))?;
        for claimed in self.scan_claimed()? {
            let age = now - claimed.claimed_at;
            if age <= max_age {
                continue;
            }

            let stem = QueueEntry::new(claimed.job_id.clone(), claimed.sequence).stem();
            let from = self.claimed_dir().join(format!(
                "{stem}{CLAIM_SEPARATOR}{}{ENTRY_EXT}",
                claimed.claim_id
            ));
            let to = self.queued_dir().join(format!("{stem}{ENTRY_EXT}"));

            match fs::rename(&from, &to) {
                Ok(()) => {
                    warn!(
                        job_id = %claimed.job_id,
                        claim_age_seconds = age.num_seconds(),
                        "Requeued stale claim"
                    );
                    self.events.emit(
                        QueueEvent::Requeued {
                            job_id: claimed.job_id.clone(),
                            claim_age_seconds: age.num_seconds(),
                        }
                        .into(),
                    );
                    requeued.push(claimed.job_id);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(job_id = %claimed.job_id, "Stale claim was acked before requeue");
                }
                Err(e) => {
                    return Err(AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to requeue claim for job {}", claimed.job_id),
                        e,
                    ));
                }
            }
        }

        if !requeued.is_empty() {
            info!(count = requeued.len(), "Requeued stale claims");
        }
        Ok(requeued)
    }

    /// Entry counts and oldest claim age.
    pub fn stats(&self) -> AppResult<QueueStats> {
        let queued = self.scan_queued()?.len();
        let claimed = self.scan_claimed()?;
        let now = Utc::now();
        Ok(QueueStats {
            queued,
            claimed: claimed.len(),
            oldest_claim_age_seconds: claimed.iter().map(|c| c.age_seconds(now)).max(),
        })
    }

    /// Waiting entries in claim order.
    ///
    /// Entries claimed between listing and reading are skipped.
    pub fn list_queued(&self) -> AppResult<Vec<QueueEntry>> {
        let dir = self.queued_dir();
        let mut entries = Vec::new();
        for (name, sequence, job_id) in self.scan_queued()? {
            match fs::read(dir.join(&name)) {
                Ok(bytes) => match serde_json::from_slice::<QueueEntry>(&bytes) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => {
                        warn!(entry = %name, error = %e, "Unreadable queue entry, using filename");
                        entries.push(QueueEntry::new(job_id, sequence));
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to read queue entry {name}"),
                        e,
                    ));
                }
            }
        }
        Ok(entries)
    }

    /// Outstanding claims in enqueue order.
    pub fn list_claimed(&self) -> AppResult<Vec<ClaimedEntry>> {
        self.scan_claimed()
    }

    /// `(filename, sequence, job_id)` of every `queued/` entry, sorted.
    fn scan_queued(&self) -> AppResult<Vec<(String, u64, JobId)>> {
        let mut entries: Vec<_> = list_entry_names(&self.queued_dir())?
            .into_iter()
            .filter_map(|name| {
                let stem = name.strip_suffix(ENTRY_EXT)?;
                let (sequence, job_id) = QueueEntry::parse_stem(stem)?;
                Some((name, sequence, job_id))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    fn scan_claimed(&self) -> AppResult<Vec<ClaimedEntry>> {
        let mut entries: Vec<_> = list_entry_names(&self.claimed_dir())?
            .into_iter()
            .filter_map(|name| parse_claimed_name(&name))
            .collect();
        entries.sort_by_key(|c| c.sequence);
        Ok(entries)
    }

    fn read_sequence(&self) -> AppResult<u64> {
        let path = self.root.join(SEQUENCE_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text.trim().parse().unwrap_or_else(|_| {
                warn!(path = %path.display(), "Unparseable sequence file, rebuilding from entries");
                0
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to read sequence file: {}", path.display()),
                e,
            )),
        }
    }

    fn write_sequence(&self, sequence: u64) -> AppResult<()> {
        write_atomic(
            &self.root.join(SEQUENCE_FILE),
            sequence.to_string().as_bytes(),
            self.fsync,
        )
    }
}

impl WorkQueue for DirQueue {
    fn enqueue(&self, job_id: &JobId) -> AppResult<QueueEntry> {
        DirQueue::enqueue(self, job_id)
    }

    fn claim(&self, worker_id: &WorkerId) -> AppResult<Option<Claim>> {
        DirQueue::claim(self, worker_id)
    }

    fn ack(&self, claim: &Claim) -> AppResult<()> {
        DirQueue::ack(self, claim)
    }

    fn stats(&self) -> AppResult<QueueStats> {
        DirQueue::stats(self)
    }
}

/// Visible `*.json` filenames in `dir`. Dot-files (temp files) are skipped.
fn list_entry_names(dir: &Path) -> AppResult<Vec<String>> {
    let read = fs::read_dir(dir).map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to list queue directory: {}", dir.display()),
            e,
        )
    })?;

    let mut names = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to read queue directory entry", e)
        })?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || !name.ends_with(ENTRY_EXT) {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

fn parse_claimed_name(name: &str) -> Option<ClaimedEntry> {
    let base = name.strip_suffix(ENTRY_EXT)?;
    let (stem, claim) = base.split_once(CLAIM_SEPARATOR)?;
    let (sequence, job_id) = QueueEntry::parse_stem(stem)?;
    let claim_id = Uuid::parse_str(claim).ok()?;
    Some(ClaimedEntry {
        job_id,
        sequence,
        claim_id: claim_id.simple().to_string(),
        claimed_at: claim_time(&claim_id)?,
    })
}

/// Claim ids are UUIDv7, so the claim time is recoverable from the
/// filename alone.
fn claim_time(claim_id: &Uuid) -> Option<DateTime<Utc>> {
    let (secs, nanos) = claim_id.get_timestamp()?.to_unix();
    DateTime::from_timestamp(i64::try_from(secs).ok()?, nanos)
}
