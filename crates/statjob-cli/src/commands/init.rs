//! Data directory initialization.

use crate::output;
use statjob_core::error::AppError;

/// Create the jobs and queue directories named by the configuration
pub async fn execute(config_path: &str) -> Result<(), AppError> {
    let config = super::load_config(config_path).await?;
    let store = super::open_store(&config)?;
    let queue = super::open_queue(&config)?;

    output::print_success("Data directories ready");
    output::print_kv("Jobs", &store.jobs_dir().display().to_string());
    output::print_kv("Queue", &queue.root().display().to_string());
    Ok(())
}
