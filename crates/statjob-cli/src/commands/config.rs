//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use statjob_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show effective configuration (file + environment)
    Show,
    /// Validate configuration file
    Validate,
    /// Generate a default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config/generated.toml")]
        output: String,
    },
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = super::load_config(config_path).await?;
            match format {
                OutputFormat::Json => output::print_json(&config),
                OutputFormat::Table => {
                    output::print_kv("Jobs dir", &config.storage.jobs_path().display().to_string());
                    output::print_kv("Queue dir", &config.storage.queue_path().display().to_string());
                    output::print_kv("Fsync", &config.storage.fsync.to_string());
                    output::print_kv(
                        "Enforce transitions",
                        &config.store.enforce_transitions.to_string(),
                    );
                    output::print_kv("Worker enabled", &config.worker.enabled.to_string());
                    output::print_kv("Concurrency", &config.worker.concurrency.to_string());
                    output::print_kv(
                        "Claim lease (s)",
                        &config.worker.claim_lease_seconds.to_string(),
                    );
                    output::print_kv("Engine", engine_label(&config.engine.program));
                    output::print_kv("Log level", &config.logging.level);
                }
            }
        }
        ConfigCommand::Validate => match super::load_config(config_path).await {
            Ok(config) => {
                output::print_success(&format!("Configuration '{}' is valid", config_path));
                println!("  Data root: {}", config.storage.data_root);
                println!("  Engine: {}", engine_label(&config.engine.program));
                if !config.engine.is_configured() {
                    output::print_warning("engine.program is empty; workers cannot run jobs");
                }
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
        ConfigCommand::Generate { output: out_path } => {
            let default_config = include_str!("../../../../config/default.toml");

            if let Some(parent) = std::path::Path::new(out_path).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| AppError::internal(format!("Failed to create dir: {}", e)))?;
            }

            tokio::fs::write(out_path, default_config)
                .await
                .map_err(|e| AppError::internal(format!("Failed to write config: {}", e)))?;

            output::print_success(&format!("Default config written to '{}'", out_path));
        }
    }

    Ok(())
}

fn engine_label(program: &str) -> &str {
    if program.trim().is_empty() {
        "(not configured)"
    } else {
        program
    }
}
