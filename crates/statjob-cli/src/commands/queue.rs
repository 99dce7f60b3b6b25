//! Queue inspection and maintenance commands.

use std::time::Duration;

use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use statjob_core::error::AppError;

/// Arguments for queue commands
#[derive(Debug, Args)]
pub struct QueueArgs {
    /// Queue subcommand
    #[command(subcommand)]
    pub command: QueueCommand,
}

/// Queue subcommands
#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// Show queued and claimed counts
    Status,
    /// List queued entries and outstanding claims
    List,
    /// Return claims older than a lease to the queue
    RequeueStale {
        /// Lease in seconds; defaults to worker.claim_lease_seconds
        #[arg(long)]
        older_than: Option<u64>,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

/// Queue entry display row
#[derive(Debug, Serialize, Tabled)]
struct EntryRow {
    /// Sequence
    sequence: u64,
    /// Job ID
    job_id: String,
    /// State
    state: String,
    /// Since
    since: String,
    /// Age (s)
    age_seconds: i64,
}

/// Execute queue commands
pub async fn execute(
    args: &QueueArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path).await?;
    let queue = super::open_queue(&config)?;

    match &args.command {
        QueueCommand::Status => {
            let stats = queue.stats()?;
            match format {
                OutputFormat::Json => output::print_json(&stats),
                OutputFormat::Table => {
                    println!("Queue Status:");
                    output::print_kv("Root", &queue.root().display().to_string());
                    output::print_kv("Queued", &stats.queued.to_string());
                    output::print_kv("Claimed", &stats.claimed.to_string());
                    output::print_kv(
                        "Oldest claim (s)",
                        &stats
                            .oldest_claim_age_seconds
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    );
                }
            }
        }
        QueueCommand::List => {
            let now = Utc::now();
            let mut rows: Vec<EntryRow> = queue
                .list_queued()?
                .into_iter()
                .map(|e| EntryRow {
                    sequence: e.sequence,
                    job_id: e.job_id.to_string(),
                    state: "queued".to_string(),
                    since: output::format_time(Some(e.enqueued_at)),
                    age_seconds: (now - e.enqueued_at).num_seconds(),
                })
                .collect();
            rows.extend(queue.list_claimed()?.into_iter().map(|c| EntryRow {
                sequence: c.sequence,
                job_id: c.job_id.to_string(),
                state: "claimed".to_string(),
                since: output::format_time(Some(c.claimed_at)),
                age_seconds: c.age_seconds(now),
            }));
            rows.sort_by_key(|r| r.sequence);
            output::print_list(&rows, format);
        }
        QueueCommand::RequeueStale { older_than, force } => {
            let lease = older_than.unwrap_or(config.worker.claim_lease_seconds);
            if lease == 0 {
                return Err(AppError::configuration(
                    "No lease given: pass --older-than or set worker.claim_lease_seconds",
                ));
            }

            if !force {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "Requeue claims older than {}s? Workers still holding them will fail to ack.",
                        lease
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;

                if !confirm {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let requeued = queue.requeue_stale(Duration::from_secs(lease))?;
            for job_id in &requeued {
                println!("  {}", job_id);
            }
            output::print_success(&format!("Requeued {} stale claim(s)", requeued.len()));
        }
    }

    Ok(())
}
