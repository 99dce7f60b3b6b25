//! Exclusive advisory file locks.
//!
//! A lock guards one record's whole read-modify-write cycle. Records are
//! replaced by rename, which swaps the inode, so the lock is taken on a
//! sidecar lock file that is never replaced rather than on the record.
//!
//! Uses the `fs2` crate (`flock` on Unix, `LockFileEx` on Windows). The
//! lock is per open file description: it serializes threads and processes
//! alike, but it does not nest. Callers must not re-acquire a lock they
//! already hold.
//!
//! `FileExt` methods are called fully qualified, since `std::fs::File`
//! has inherent methods of the same names on newer toolchains.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use statjob_core::error::{AppError, ErrorKind};
use statjob_core::result::AppResult;

/// A held exclusive lock. Released when dropped.
pub struct ExclusiveLock {
    file: File,
    lock_path: PathBuf,
}

impl ExclusiveLock {
    /// Block until an exclusive lock on `file` is held.
    ///
    /// `file` must be open for writing on platforms that require it.
    pub fn acquire(file: File, lock_path: impl Into<PathBuf>) -> AppResult<Self> {
        let lock_path = lock_path.into();
        FileExt::lock_exclusive(&file).map_err(|e| {
            AppError::with_source(
                ErrorKind::Lock,
                format!("Failed to acquire lock: {}", lock_path.display()),
                e,
            )
        })?;
        debug!(path = %lock_path.display(), "Acquired exclusive lock");
        Ok(Self { file, lock_path })
    }

    /// Take the lock if nobody else holds it, without blocking.
    pub fn try_acquire(file: File, lock_path: impl Into<PathBuf>) -> AppResult<Option<Self>> {
        let lock_path = lock_path.into();
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                debug!(path = %lock_path.display(), "Acquired exclusive lock");
                Ok(Some(Self { file, lock_path }))
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Lock,
                format!("Failed to acquire lock: {}", lock_path.display()),
                e,
            )),
        }
    }

    /// Path of the lock file.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for ExclusiveLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock regardless, so a failed
        // unlock is only worth a warning.
        match FileExt::unlock(&self.file) {
            Ok(()) => debug!(path = %self.lock_path.display(), "Released exclusive lock"),
            Err(e) => warn!(
                path = %self.lock_path.display(),
                error = %e,
                "LockReleaseWarning: failed to release lock, relying on descriptor close"
            ),
        }
    }
}

impl std::fmt::Debug for ExclusiveLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusiveLock")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

fn open_lock_file(lock_path: &Path) -> AppResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e: io::Error| {
            AppError::with_source(
                ErrorKind::Lock,
                format!("Failed to open lock file: {}", lock_path.display()),
                e,
            )
        })
}

/// Open (creating if needed) `lock_path` and block until it is locked.
pub fn lock_exclusive(lock_path: &Path) -> AppResult<ExclusiveLock> {
    let file = open_lock_file(lock_path)?;
    ExclusiveLock::acquire(file, lock_path)
}

/// Open (creating if needed) `lock_path` and lock it if uncontended.
pub fn try_lock_exclusive(lock_path: &Path) -> AppResult<Option<ExclusiveLock>> {
    let file = open_lock_file(lock_path)?;
    ExclusiveLock::try_acquire(file, lock_path)
}
