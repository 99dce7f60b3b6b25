//! The canonical job record document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use statjob_core::types::{JobId, WorkerId};

use super::status::JobStatus;

/// Schema version written by this software.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// One job's persisted state (`job.json`).
///
/// Fields the store does not model (draft and plan fields written by the
/// HTTP layer) are carried through `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Schema version of this document; equals the last migration step applied.
    pub schema_version: u32,
    /// Legacy-detection counter, set by the first migration of a pre-v2 record.
    pub version: u64,
    /// Job identifier.
    pub job_id: JobId,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Creation time, immutable once set.
    pub created_at: DateTime<Utc>,
    /// Free-text analysis requirement.
    #[serde(default)]
    pub requirement: Option<String>,
    /// Execution attempts, oldest first.
    pub runs: Vec<RunRecord>,
    /// Produced artifacts, in production order.
    pub artifacts_index: Vec<ArtifactDescriptor>,
    /// Unmodelled top-level fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobRecord {
    /// Create a fresh record in `created` status at the current schema.
    pub fn new(job_id: JobId, requirement: Option<String>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            version: 1,
            job_id,
            status: JobStatus::Created,
            created_at: Utc::now(),
            requirement,
            runs: Vec::new(),
            artifacts_index: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Open a new run attempt for `worker_id` and return it.
    pub fn start_run(&mut self, worker_id: WorkerId) -> &RunRecord {
        self.runs.push(RunRecord {
            run_id: Uuid::now_v7().to_string(),
            worker_id,
            started_at: Utc::now(),
            finished_at: None,
            outcome: RunOutcome::Running,
            error: None,
        });
        &self.runs[self.runs.len() - 1]
    }

    /// Close the most recent open run. Returns `false` when none is open.
    pub fn finish_run(&mut self, outcome: RunOutcome, error: Option<String>) -> bool {
        match self
            .runs
            .iter_mut()
            .rev()
            .find(|run| run.outcome == RunOutcome::Running)
        {
            Some(run) => {
                run.finished_at = Some(Utc::now());
                run.outcome = outcome;
                run.error = error;
                true
            }
            None => false,
        }
    }

    /// The most recent run attempt, if any.
    pub fn latest_run(&self) -> Option<&RunRecord> {
        self.runs.last()
    }

    /// Append an artifact descriptor unless its path is already indexed.
    ///
    /// Returns whether the descriptor was appended.
    pub fn add_artifact(&mut self, artifact: ArtifactDescriptor) -> bool {
        if self.artifacts_index.iter().any(|a| a.path == artifact.path) {
            return false;
        }
        self.artifacts_index.push(artifact);
        true
    }
}

/// Outcome of a run attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Still executing (or abandoned by a crashed worker).
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
}

/// One execution attempt of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run identifier.
    pub run_id: String,
    /// Worker that executed the attempt.
    pub worker_id: WorkerId,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// When the attempt finished.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Attempt outcome.
    pub outcome: RunOutcome,
    /// Error message for failed attempts.
    #[serde(default)]
    pub error: Option<String>,
}

/// An output produced by the analysis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Display name (usually the file name).
    pub name: String,
    /// Path relative to the job directory.
    pub path: String,
    /// Artifact kind, e.g. `"table"`, `"figure"`, `"report"`.
    pub kind: String,
    /// Size in bytes, when known.
    #[serde(default)]
    pub size_bytes: Option<u64>,
    /// When the artifact was indexed.
    pub created_at: DateTime<Utc>,
}

impl ArtifactDescriptor {
    /// Describe an artifact produced now.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        kind: impl Into<String>,
        size_bytes: Option<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: kind.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Guess an artifact kind from a file extension.
    pub fn kind_for_path(path: &str) -> &'static str {
        let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
        match ext.as_str() {
            "csv" | "tsv" | "parquet" | "xlsx" => "table",
            "png" | "jpg" | "jpeg" | "svg" | "pdf" => "figure",
            "html" | "md" | "txt" | "docx" => "report",
            "json" => "data",
            "log" => "log",
            _ => "file",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job_id() -> JobId {
        JobId::new("job-1").unwrap()
    }

    #[test]
    fn test_new_record_is_current() {
        let record = JobRecord::new(job_id(), Some("compare group means".into()));
        assert_eq!(record.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(record.version, 1);
        assert_eq!(record.status, JobStatus::Created);
        assert!(record.runs.is_empty());
        assert!(record.artifacts_index.is_empty());
    }

    #[test]
    fn test_run_lifecycle() {
        let mut record = JobRecord::new(job_id(), None);
        let worker = WorkerId::new("w-1").unwrap();
        record.start_run(worker.clone());
        assert_eq!(record.latest_run().unwrap().outcome, RunOutcome::Running);

        assert!(record.finish_run(RunOutcome::Failed, Some("engine exited 2".into())));
        let run = record.latest_run().unwrap();
        assert_eq!(run.outcome, RunOutcome::Failed);
        assert_eq!(run.worker_id, worker);
        assert!(run.finished_at.is_some());

        assert!(!record.finish_run(RunOutcome::Succeeded, None));
    }

    #[test]
    fn test_artifact_paths_indexed_once() {
        let mut record = JobRecord::new(job_id(), None);
        assert!(record.add_artifact(ArtifactDescriptor::new("a.csv", "artifacts/a.csv", "table", Some(1))));
        assert!(record.add_artifact(ArtifactDescriptor::new("b.png", "artifacts/b.png", "figure", None)));
        assert!(!record.add_artifact(ArtifactDescriptor::new("a.csv", "artifacts/a.csv", "table", Some(2))));

        let paths: Vec<_> = record.artifacts_index.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["artifacts/a.csv", "artifacts/b.png"]);
        assert_eq!(record.artifacts_index[0].size_bytes, Some(1));
    }

    #[test]
    fn test_extra_fields_survive_round_trip() {
        let doc = json!({
            "schema_version": 3,
            "version": 1,
            "job_id": "job-1",
            "status": "created",
            "created_at": "2024-01-02T03:04:05Z",
            "requirement": null,
            "runs": [],
            "artifacts_index": [],
            "draft": {"plan": ["t-test"]}
        });
        let record: JobRecord = serde_json::from_value(doc.clone()).unwrap();
        assert_eq!(record.extra.get("draft"), doc.get("draft"));
        assert_eq!(serde_json::to_value(&record).unwrap(), doc);
    }

    #[test]
    fn test_missing_runs_is_rejected() {
        let doc = json!({
            "schema_version": 3,
            "version": 1,
            "job_id": "job-1",
            "status": "created",
            "created_at": "2024-01-02T03:04:05Z",
            "artifacts_index": []
        });
        assert!(serde_json::from_value::<JobRecord>(doc).is_err());
    }

    #[test]
    fn test_artifact_kind_guess() {
        assert_eq!(ArtifactDescriptor::kind_for_path("out/means.csv"), "table");
        assert_eq!(ArtifactDescriptor::kind_for_path("plot.PNG"), "figure");
        assert_eq!(ArtifactDescriptor::kind_for_path("noext"), "file");
    }
}
