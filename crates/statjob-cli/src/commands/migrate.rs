//! Record schema migration commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use statjob_core::error::AppError;
use statjob_entity::job::record::CURRENT_SCHEMA_VERSION;
use statjob_store::migration;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Upgrade every legacy record on disk
    Run,
    /// Show the schema version of every record
    Status,
}

/// Migration status row
#[derive(Debug, Serialize, Tabled)]
struct VersionRow {
    /// Job ID
    job_id: String,
    /// Schema version on disk
    schema_version: String,
    /// Whether a load would migrate it
    pending: String,
}

/// Execute migration commands
pub async fn execute(
    args: &MigrateArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path).await?;
    let store = super::open_store(&config)?;

    match &args.command {
        MigrateCommand::Run => {
            println!("Migrating job records to schema v{}...", CURRENT_SCHEMA_VERSION);
            let report = store.migrate_all()?;

            for (job_id, from) in &report.migrated {
                println!("  {} v{} -> v{}", job_id, from, CURRENT_SCHEMA_VERSION);
            }
            for (job_id, error) in &report.failed {
                output::print_warning(&format!("{}: {}", job_id, error));
            }
            output::print_success(&format!(
                "Scanned {}, migrated {}, failed {}",
                report.scanned,
                report.migrated.len(),
                report.failed.len()
            ));
        }
        MigrateCommand::Status => {
            let mut rows = Vec::new();
            for job_id in store.list_ids()? {
                let path = store.record_path(&job_id);
                let version = std::fs::read(&path)
                    .map_err(AppError::from)
                    .and_then(|bytes| serde_json::from_slice(&bytes).map_err(AppError::from))
                    .and_then(|doc| migration::schema_version_of(&doc));
                let (schema_version, pending) = match version {
                    Ok(v) => (v.to_string(), (v < CURRENT_SCHEMA_VERSION).to_string()),
                    Err(e) => ("corrupt".to_string(), e.message),
                };
                rows.push(VersionRow {
                    job_id: job_id.to_string(),
                    schema_version,
                    pending,
                });
            }
            output::print_list(&rows, format);
        }
    }

    Ok(())
}
