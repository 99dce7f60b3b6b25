//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field carries a default so an empty file is valid.

pub mod engine;
pub mod logging;
pub mod storage;
pub mod worker;

use std::path::Path;

use serde::{Deserialize, Serialize};

use self::engine::EngineConfig;
use self::logging::LoggingConfig;
use self::storage::{StorageConfig, StoreConfig};
use self::worker::WorkerConfig;

use crate::error::AppError;

/// Prefix for environment variable overrides (`STATJOB__WORKER__CONCURRENCY=8`).
const ENV_PREFIX: &str = "STATJOB";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// On-disk layout of job records and queue directories.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Record store behaviour.
    #[serde(default)]
    pub store: StoreConfig,
    /// Worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// External analysis engine invocation.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration for an environment.
    ///
    /// Merges `config/default.toml` with `config/{env}.toml` and environment
    /// variables prefixed with `STATJOB__`. Missing files are skipped.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(Self::environment())
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Load configuration from a single file plus environment overrides.
    ///
    /// The file is optional; a missing path yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(Self::environment())
            .build()
            .map_err(|e| {
                AppError::configuration(format!(
                    "Failed to build config from {}: {e}",
                    path.display()
                ))
            })?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }
}
