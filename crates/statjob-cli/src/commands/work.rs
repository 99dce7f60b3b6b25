//! Foreground job processing.

use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tokio::sync::watch;

use crate::output::{self, OutputFormat};
use statjob_core::error::AppError;
use statjob_core::types::WorkerId;
use statjob_worker::{CommandEngine, JobOutcome, WorkerRunner};

/// Arguments for the work command
#[derive(Debug, Args)]
pub struct WorkArgs {
    /// Process at most one job
    #[arg(long, conflicts_with = "follow")]
    pub once: bool,
    /// Keep polling until Ctrl-C instead of stopping when the queue is empty
    #[arg(long)]
    pub follow: bool,
}

/// Processed job row
#[derive(Debug, Serialize, Tabled)]
struct OutcomeRow {
    /// Job ID
    job_id: String,
    /// Final status
    status: String,
    /// Artifacts
    artifacts: usize,
}

impl From<JobOutcome> for OutcomeRow {
    fn from(outcome: JobOutcome) -> Self {
        Self {
            job_id: outcome.job_id.to_string(),
            status: outcome.status.to_string(),
            artifacts: outcome.artifacts,
        }
    }
}

/// Execute the work command
pub async fn execute(
    args: &WorkArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path).await?;
    let store = Arc::new(super::open_store(&config)?);
    let queue = Arc::new(super::open_queue(&config)?);
    let engine = Arc::new(CommandEngine::from_config(&config.engine)?);
    let worker_id = WorkerId::generate(&config.worker.id_prefix, 0)?;

    let runner = WorkerRunner::new(store, queue, engine, config.worker.clone(), worker_id);

    if args.follow {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(true);
            }
        });
        println!("Worker '{}' polling; press Ctrl-C to stop.", runner.worker_id());
        runner.run(rx).await;
        return Ok(());
    }

    let outcomes: Vec<JobOutcome> = if args.once {
        runner.run_once().await?.into_iter().collect()
    } else {
        runner.drain().await?
    };

    if outcomes.is_empty() && format == OutputFormat::Table {
        output::print_warning("Queue is empty");
        return Ok(());
    }
    let rows: Vec<OutcomeRow> = outcomes.into_iter().map(OutcomeRow::from).collect();
    output::print_list(&rows, format);
    Ok(())
}
