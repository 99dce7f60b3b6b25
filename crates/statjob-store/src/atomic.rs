//! Write-new-then-rename persistence.

use std::io::Write;
use std::path::Path;

use tempfile::Builder;
use tracing::debug;

use statjob_core::error::{AppError, ErrorKind};
use statjob_core::result::AppResult;

/// Replace `path` with `bytes` so readers see either the old or the new
/// content, never a torn mix.
///
/// The temp file is created in the target directory (same filesystem, so
/// the rename is atomic) with a dot prefix so directory scans skip it.
/// With `fsync`, the data is flushed before the rename and the directory
/// afterwards.
pub fn write_atomic(path: &Path, bytes: &[u8], fsync: bool) -> AppResult<()> {
    let dir = path.parent().ok_or_else(|| {
        AppError::storage(format!("Path has no parent directory: {}", path.display()))
    })?;

    let mut tmp = Builder::new()
        .prefix(".statjob-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create temp file in {}", dir.display()),
                e,
            )
        })?;

    tmp.write_all(bytes).map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to write temp file for {}", path.display()),
            e,
        )
    })?;

    if fsync {
        tmp.as_file().sync_all().map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to sync temp file for {}", path.display()),
                e,
            )
        })?;
    }

    tmp.persist(path).map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to replace {}", path.display()),
            e.error,
        )
    })?;

    if fsync {
        sync_dir(dir)?;
    }

    debug!(path = %path.display(), bytes = bytes.len(), "Atomically replaced file");
    Ok(())
}

/// Flush directory metadata so a completed rename survives power loss.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> AppResult<()> {
    std::fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to sync directory {}", dir.display()),
                e,
            )
        })
}

#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> AppResult<()> {
    Ok(())
}
