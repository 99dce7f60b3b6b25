//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker pool is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of jobs processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Interval in milliseconds between polls of an empty queue.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Prefix for generated worker identifiers.
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
    /// Age in seconds after which a claim is considered abandoned.
    /// `0` disables stale-claim requeue.
    #[serde(default)]
    pub claim_lease_seconds: u64,
    /// Cron expression (with seconds) for the stale-claim sweep.
    #[serde(default = "default_stale_claim_cron")]
    pub stale_claim_cron: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval(),
            id_prefix: default_id_prefix(),
            claim_lease_seconds: 0,
            stale_claim_cron: default_stale_claim_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_id_prefix() -> String {
    "worker".to_string()
}

fn default_stale_claim_cron() -> String {
    "0 * * * * *".to_string()
}
