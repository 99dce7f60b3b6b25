//! Storage layout and record store configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Filesystem layout for job records and the work queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for all runtime data.
    #[serde(default = "default_data_root")]
    pub data_root: String,
    /// Directory holding one sub-directory per job, relative to `data_root`.
    #[serde(default = "default_jobs_dir")]
    pub jobs_dir: String,
    /// Directory holding `queued/` and `claimed/`, relative to `data_root`.
    #[serde(default = "default_queue_dir")]
    pub queue_dir: String,
    /// Whether atomic replaces fsync the temp file and its directory.
    #[serde(default = "default_true")]
    pub fsync: bool,
}

impl StorageConfig {
    /// Absolute-or-relative path of the jobs directory.
    pub fn jobs_path(&self) -> PathBuf {
        PathBuf::from(&self.data_root).join(&self.jobs_dir)
    }

    /// Absolute-or-relative path of the queue root.
    pub fn queue_path(&self) -> PathBuf {
        PathBuf::from(&self.data_root).join(&self.queue_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            jobs_dir: default_jobs_dir(),
            queue_dir: default_queue_dir(),
            fsync: true,
        }
    }
}

/// Job record store behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Reject status changes that are not edges of the job state machine.
    ///
    /// Off by default: status policy belongs to the worker loop.
    #[serde(default)]
    pub enforce_transitions: bool,
}

fn default_data_root() -> String {
    "./data".to_string()
}

fn default_jobs_dir() -> String {
    "jobs".to_string()
}

fn default_queue_dir() -> String {
    "queue".to_string()
}

fn default_true() -> bool {
    true
}
