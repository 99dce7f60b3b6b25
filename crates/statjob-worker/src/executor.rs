//! Analysis engine boundary.
//!
//! The worker hands each claimed job to an [`AnalysisEngine`]. The engine
//! writes its outputs under `<job_dir>/artifacts/` and returns descriptors
//! for them; the worker records those descriptors in the job record.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing;

use statjob_core::config::engine::EngineConfig;
use statjob_core::error::{AppError, ErrorKind};
use statjob_core::result::AppResult;
use statjob_core::types::{JobId, WorkerId};
use statjob_entity::ArtifactDescriptor;

/// Directory under a job directory where engines place their outputs.
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Bytes of engine stderr kept in a failure message.
const STDERR_TAIL_BYTES: usize = 2048;

/// Everything an engine needs to execute one run of a job.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The job being executed.
    pub job_id: JobId,
    /// Worker executing it.
    pub worker_id: WorkerId,
    /// Identifier of the run attempt opened for this execution.
    pub run_id: String,
    /// The job's directory in the record store.
    pub job_dir: PathBuf,
    /// The user's analysis requirement, if recorded.
    pub requirement: Option<String>,
}

impl ExecutionContext {
    /// Directory where outputs are expected.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.job_dir.join(ARTIFACTS_DIR)
    }
}

/// Trait for statistics engine implementations
#[async_trait]
pub trait AnalysisEngine: Send + Sync + std::fmt::Debug {
    /// Engine name used in logs
    fn name(&self) -> &str;

    /// Execute one run and describe the artifacts it produced
    async fn execute(&self, ctx: &ExecutionContext)
    -> Result<Vec<ArtifactDescriptor>, EngineError>;
}

/// Error from engine execution
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine ran and reported failure
    #[error("Analysis failed: {0}")]
    Failed(String),

    /// The engine exceeded its time budget
    #[error("Analysis timed out after {0}s")]
    Timeout(u64),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Runs an external program once per job.
///
/// The program receives the configured arguments followed by the job
/// directory, with `STATJOB_JOB_ID`, `STATJOB_RUN_ID` and
/// `STATJOB_ARTIFACTS_DIR` set in its environment. Exit status zero is
/// success; every file under `artifacts/` is then indexed.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    /// Program to run
    program: String,
    /// Arguments placed before the job directory
    args: Vec<String>,
    /// Time budget per run
    timeout: Duration,
}

impl CommandEngine {
    /// Create a command engine
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Create a command engine from configuration
    pub fn from_config(config: &EngineConfig) -> AppResult<Self> {
        if !config.is_configured() {
            return Err(AppError::configuration(
                "engine.program must be set to run analysis jobs",
            ));
        }
        Ok(Self::new(
            config.program.clone(),
            config.args.clone(),
            Duration::from_secs(config.timeout_seconds),
        ))
    }
}

#[async_trait]
impl AnalysisEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.program
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
    ) -> Result<Vec<ArtifactDescriptor>, EngineError> {
        let artifacts_dir = ctx.artifacts_dir();
        tokio::fs::create_dir_all(&artifacts_dir)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create {}", artifacts_dir.display()),
                    e,
                )
            })?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&ctx.job_dir)
            .env("STATJOB_JOB_ID", ctx.job_id.as_str())
            .env("STATJOB_RUN_ID", &ctx.run_id)
            .env("STATJOB_ARTIFACTS_DIR", &artifacts_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            job_id = %ctx.job_id,
            program = %self.program,
            "Starting analysis engine"
        );

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(AppError::with_source(
                    ErrorKind::Engine,
                    format!("Failed to start engine '{}'", self.program),
                    e,
                )
                .into());
            }
            Err(_) => return Err(EngineError::Timeout(self.timeout.as_secs())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = tail_chars(stderr.trim(), STDERR_TAIL_BYTES);
            return Err(EngineError::Failed(format!(
                "engine exited with {}: {}",
                output.status, tail
            )));
        }

        let job_dir = ctx.job_dir.clone();
        let artifacts = tokio::task::spawn_blocking(move || index_artifacts(&job_dir))
            .await
            .map_err(|e| AppError::internal(format!("Artifact indexing task failed: {e}")))??;
        Ok(artifacts)
    }
}

/// Describe every file under `<job_dir>/artifacts/`, sorted by path.
///
/// Paths are relative to the job directory and use `/` separators.
pub fn index_artifacts(job_dir: &Path) -> AppResult<Vec<ArtifactDescriptor>> {
    let root = job_dir.join(ARTIFACTS_DIR);
    let mut files = Vec::new();
    if root.is_dir() {
        collect_files(&root, &mut files)?;
    }
    files.sort();

    let mut artifacts = Vec::with_capacity(files.len());
    for file in files {
        let Ok(relative) = file.strip_prefix(job_dir) else {
            continue;
        };
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.clone());
        let size = fs::metadata(&file).ok().map(|m| m.len());
        let kind = ArtifactDescriptor::kind_for_path(&path);
        artifacts.push(ArtifactDescriptor::new(name, path, kind, size));
    }
    Ok(artifacts)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> AppResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to list {}", dir.display()),
            e,
        )
    })?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn tail_chars(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
