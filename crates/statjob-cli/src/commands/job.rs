//! Job record management commands.

use std::sync::Arc;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use statjob_core::error::AppError;
use statjob_core::types::JobId;
use statjob_entity::JobStatus;
use statjob_worker::JobSubmitter;

/// Arguments for job commands
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Job subcommand
    #[command(subcommand)]
    pub command: JobCommand,
}

/// Job subcommands
#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Create a job record
    Create {
        /// Job ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Analysis requirement text
        #[arg(short, long)]
        requirement: Option<String>,
        /// Submit to the queue right away
        #[arg(long)]
        submit: bool,
    },
    /// Mark a created job queued and enqueue it
    Submit {
        /// Job ID
        id: String,
    },
    /// Show a job record (migrating it if needed)
    Show {
        /// Job ID
        id: String,
    },
    /// List job records
    List {
        /// Only jobs in this status
        #[arg(short, long, value_parser = parse_status)]
        status: Option<JobStatus>,
    },
}

/// Job display row
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    /// Job ID
    job_id: String,
    /// Status
    status: String,
    /// Schema
    schema: u32,
    /// Runs
    runs: usize,
    /// Artifacts
    artifacts: usize,
    /// Created
    created_at: String,
}

/// Execute job commands
pub async fn execute(
    args: &JobArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path).await?;
    let store = Arc::new(super::open_store(&config)?);

    match &args.command {
        JobCommand::Create {
            id,
            requirement,
            submit,
        } => {
            let job_id = id.as_deref().map(JobId::new).transpose()?;
            if *submit {
                let queue = Arc::new(super::open_queue(&config)?);
                let submitter = JobSubmitter::new(store, queue);
                let (record, entry) = submitter.create_and_submit(job_id, requirement.clone())?;
                output::print_success(&format!(
                    "Job '{}' created and queued (sequence {})",
                    record.job_id, entry.sequence
                ));
            } else {
                let record = store.create(job_id, requirement.clone())?;
                output::print_success(&format!("Job '{}' created", record.job_id));
            }
        }
        JobCommand::Submit { id } => {
            let job_id = JobId::new(id.as_str())?;
            let queue = Arc::new(super::open_queue(&config)?);
            let (_, entry) = JobSubmitter::new(store, queue).submit(&job_id)?;
            output::print_success(&format!(
                "Job '{}' queued (sequence {})",
                job_id, entry.sequence
            ));
        }
        JobCommand::Show { id } => {
            let record = store.load(&JobId::new(id.as_str())?)?;
            match format {
                OutputFormat::Json => output::print_json(&record),
                OutputFormat::Table => {
                    output::print_kv("Job", record.job_id.as_str());
                    output::print_kv("Status", record.status.as_str());
                    output::print_kv("Schema version", &record.schema_version.to_string());
                    output::print_kv("Version", &record.version.to_string());
                    output::print_kv("Created", &output::format_time(Some(record.created_at)));
                    output::print_kv(
                        "Requirement",
                        record.requirement.as_deref().unwrap_or("-"),
                    );
                    for run in &record.runs {
                        output::print_kv(
                            &format!("Run {}", run.run_id),
                            &format!(
                                "{:?} by {} ({} -> {}){}",
                                run.outcome,
                                run.worker_id,
                                output::format_time(Some(run.started_at)),
                                output::format_time(run.finished_at),
                                run.error
                                    .as_deref()
                                    .map(|e| format!(": {}", e))
                                    .unwrap_or_default()
                            ),
                        );
                    }
                    for artifact in &record.artifacts_index {
                        output::print_kv(&format!("Artifact [{}]", artifact.kind), &artifact.path);
                    }
                }
            }
        }
        JobCommand::List { status } => {
            let filter = *status;
            let mut rows = Vec::new();
            for job_id in store.list_ids()? {
                let record = match store.load(&job_id) {
                    Ok(record) => record,
                    Err(e) => {
                        output::print_warning(&format!("{}: {}", job_id, e));
                        continue;
                    }
                };
                if filter.is_some_and(|s| s != record.status) {
                    continue;
                }
                rows.push(JobRow {
                    job_id: record.job_id.to_string(),
                    status: record.status.to_string(),
                    schema: record.schema_version,
                    runs: record.runs.len(),
                    artifacts: record.artifacts_index.len(),
                    created_at: output::format_time(Some(record.created_at)),
                });
            }
            output::print_list(&rows, format);
        }
    }

    Ok(())
}

fn parse_status(value: &str) -> Result<JobStatus, String> {
    JobStatus::ALL
        .into_iter()
        .find(|s| s.as_str().eq_ignore_ascii_case(value))
        .ok_or_else(|| format!("unknown status '{}'", value))
}
