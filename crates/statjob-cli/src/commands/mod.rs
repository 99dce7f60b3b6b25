//! CLI command definitions and dispatch.

pub mod config;
pub mod init;
pub mod job;
pub mod migrate;
pub mod queue;
pub mod work;

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use statjob_core::config::AppConfig;
use statjob_core::error::AppError;
use statjob_core::traits::{EventSink, TracingEventSink};
use statjob_queue::DirQueue;
use statjob_store::JobRecordStore;

/// StatJob: job record store and work queue administration
#[derive(Debug, Parser)]
#[command(name = "statjob", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the data directories
    Init,
    /// Job record management
    Job(job::JobArgs),
    /// Schema migration of stored records
    Migrate(migrate::MigrateArgs),
    /// Queue inspection and maintenance
    Queue(queue::QueueArgs),
    /// Process queued jobs in the foreground
    Work(work::WorkArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Init => init::execute(&self.config).await,
            Commands::Job(args) => job::execute(args, &self.config, self.format).await,
            Commands::Migrate(args) => migrate::execute(args, &self.config, self.format).await,
            Commands::Queue(args) => queue::execute(args, &self.config, self.format).await,
            Commands::Work(args) => work::execute(args, &self.config, self.format).await,
            Commands::Config(args) => config::execute(args, &self.config, self.format).await,
        }
    }
}

/// Helper: load configuration from file
pub async fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load_from(Path::new(config_path))
}

/// Helper: event sink for CLI operations
pub fn event_sink() -> Arc<dyn EventSink> {
    Arc::new(TracingEventSink)
}

/// Helper: open the record store from config
pub fn open_store(config: &AppConfig) -> Result<JobRecordStore, AppError> {
    JobRecordStore::from_config(&config.storage, &config.store, event_sink())
}

/// Helper: open the queue from config
pub fn open_queue(config: &AppConfig) -> Result<DirQueue, AppError> {
    DirQueue::from_config(&config.storage, event_sink())
}
