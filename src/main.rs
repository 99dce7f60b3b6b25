//! StatJob worker daemon.
//!
//! Wires the record store, the directory queue and the analysis engine
//! together, runs the worker pool and the stale-claim sweep, and shuts
//! down gracefully on Ctrl+C or SIGTERM.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use statjob_core::config::AppConfig;
use statjob_core::error::AppError;
use statjob_core::traits::{EventSink, TracingEventSink};
use statjob_core::types::WorkerId;
use statjob_queue::DirQueue;
use statjob_store::JobRecordStore;
use statjob_worker::{CommandEngine, StaleClaimScheduler, WorkerRunner};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Worker daemon error");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    match std::env::var("STATJOB_CONFIG") {
        Ok(path) => AppConfig::load_from(Path::new(&path)),
        Err(_) => {
            let env =
                std::env::var("STATJOB_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main daemon run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting StatJob worker daemon");

    if !config.worker.enabled {
        tracing::warn!("worker.enabled is false; nothing to do");
        return Ok(());
    }

    let events: Arc<dyn EventSink> = Arc::new(TracingEventSink);

    let store = Arc::new(JobRecordStore::from_config(
        &config.storage,
        &config.store,
        Arc::clone(&events),
    )?);
    tracing::info!(path = %store.jobs_dir().display(), "Record store opened");

    let queue = Arc::new(DirQueue::from_config(&config.storage, Arc::clone(&events))?);
    tracing::info!(path = %queue.root().display(), "Queue opened");

    // Heal legacy records up front so the first claims do not pay for it.
    let sweep_store = Arc::clone(&store);
    let report = tokio::task::spawn_blocking(move || sweep_store.migrate_all())
        .await
        .map_err(|e| AppError::internal(format!("Migration task failed: {}", e)))??;
    if !report.failed.is_empty() {
        tracing::warn!(failed = report.failed.len(), "Some job records could not be migrated");
    }

    let engine = Arc::new(CommandEngine::from_config(&config.engine)?);

    let mut scheduler = StaleClaimScheduler::from_config(Arc::clone(&queue), &config.worker).await?;
    if let Some(scheduler) = &scheduler {
        scheduler.start().await?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker_id = WorkerId::generate(&config.worker.id_prefix, 0)?;
    let runner = WorkerRunner::new(
        Arc::clone(&store),
        queue,
        engine,
        config.worker.clone(),
        worker_id,
    );
    let worker_handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Worker task failed");
    }
    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.shutdown().await?;
    }

    tracing::info!("StatJob worker daemon shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
