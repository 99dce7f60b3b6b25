//! Integration tests for the worker pipeline.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use statjob_core::config::worker::WorkerConfig;
use statjob_core::events::RecordEvent;
use statjob_core::types::{JobId, WorkerId};
use statjob_entity::{ArtifactDescriptor, JobStatus, RunOutcome};
use statjob_worker::{AnalysisEngine, EngineError, ExecutionContext, JobSubmitter, WorkerRunner};

/// Engine that writes one artifact and fails jobs whose requirement says so
#[derive(Debug, Default)]
struct ScriptedEngine {
    executions: AtomicUsize,
}

#[async_trait]
impl AnalysisEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
    ) -> Result<Vec<ArtifactDescriptor>, EngineError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;

        if ctx.requirement.as_deref() == Some("fail") {
            return Err(EngineError::Failed("singular design matrix".to_string()));
        }

        let dir = ctx.artifacts_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("summary.csv"), b"mean,sd\n1.0,0.5\n")
            .await
            .unwrap();
        Ok(statjob_worker::executor::index_artifacts(&ctx.job_dir)?)
    }
}

fn runner(env: &helpers::TestEnv, engine: Arc<ScriptedEngine>, concurrency: usize) -> WorkerRunner {
    WorkerRunner::new(
        Arc::clone(&env.store),
        env.queue.clone(),
        engine,
        WorkerConfig {
            concurrency,
            poll_interval_ms: 10,
            ..WorkerConfig::default()
        },
        WorkerId::new("it-worker").unwrap(),
    )
}

#[tokio::test]
async fn test_pipeline_success_and_failure() {
    let env = helpers::TestEnv::new();
    let submitter = JobSubmitter::new(env.store.clone(), env.queue.clone());
    let (ok, _) = submitter
        .create_and_submit(Some(JobId::new("ok").unwrap()), Some("anova".into()))
        .unwrap();
    let (bad, _) = submitter
        .create_and_submit(Some(JobId::new("bad").unwrap()), Some("fail".into()))
        .unwrap();

    let engine = Arc::new(ScriptedEngine::default());
    let outcomes = runner(&env, engine.clone(), 1).drain().await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(engine.executions.load(Ordering::SeqCst), 2);

    let ok = env.store.load(&ok.job_id).unwrap();
    assert_eq!(ok.status, JobStatus::Succeeded);
    assert_eq!(ok.runs[0].outcome, RunOutcome::Succeeded);
    assert_eq!(ok.artifacts_index[0].path, "artifacts/summary.csv");
    assert_eq!(ok.artifacts_index[0].kind, "table");

    let bad = env.store.load(&bad.job_id).unwrap();
    assert_eq!(bad.status, JobStatus::Failed);
    assert_eq!(
        bad.runs[0].error.as_deref(),
        Some("Analysis failed: singular design matrix")
    );
    assert!(bad.artifacts_index.is_empty());

    assert_eq!(env.entries_in("queued"), 0);
    assert_eq!(env.entries_in("claimed"), 0);
}

#[tokio::test]
async fn test_status_sequence_is_recorded() {
    let env = helpers::TestEnv::new();
    let job_id = env.submit("traced");

    runner(&env, Arc::new(ScriptedEngine::default()), 1)
        .run_once()
        .await
        .unwrap()
        .unwrap();

    let statuses: Vec<String> = env
        .events
        .record_events()
        .into_iter()
        .filter_map(|e| match e {
            RecordEvent::Saved { job_id: id, status } if id == job_id => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec!["queued", "claimed", "running", "succeeded"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pool_processes_every_job_once() {
    let env = helpers::TestEnv::new();
    let ids: Vec<JobId> = (0..20).map(|i| env.submit(&format!("pool-{i:02}"))).collect();

    let engine = Arc::new(ScriptedEngine::default());
    let runner = runner(&env, engine.clone(), 4);
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { runner.run(rx).await });

    for _ in 0..500 {
        let done = ids.iter().all(|id| {
            env.store
                .load(id)
                .map(|r| r.status.is_terminal())
                .unwrap_or(false)
        });
        if done && env.entries_in("claimed") == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(engine.executions.load(Ordering::SeqCst), 20);
    for id in &ids {
        let record = env.store.load(id).unwrap();
        assert_eq!(record.status, JobStatus::Succeeded);
        assert_eq!(record.runs.len(), 1);
    }
    assert_eq!(env.entries_in("queued"), 0);
    assert_eq!(env.entries_in("claimed"), 0);
}

#[tokio::test]
async fn test_abandoned_run_is_reclaimed_with_enforced_transitions() {
    let env = helpers::TestEnv::new();
    let store = Arc::new(env.reopen_store().with_transition_enforcement(true));
    let job_id = JobId::new("crashy").unwrap();
    store.create(Some(job_id.clone()), Some("anova".into())).unwrap();
    store.set_status(&job_id, JobStatus::Queued).unwrap();
    env.queue.enqueue(&job_id).unwrap();

    // A worker claims the job, starts it and dies without acking.
    let crashed = WorkerId::new("crashed-worker").unwrap();
    env.queue.claim(&crashed).unwrap().unwrap();
    store.set_status(&job_id, JobStatus::Claimed).unwrap();
    store
        .update(&job_id, |record| {
            record.start_run(crashed.clone());
            record.status = JobStatus::Running;
            Ok(())
        })
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let requeued = env.queue.requeue_stale(Duration::from_millis(1)).unwrap();
    assert_eq!(requeued, vec![job_id.clone()]);

    let runner = WorkerRunner::new(
        Arc::clone(&store),
        env.queue.clone(),
        Arc::new(ScriptedEngine::default()),
        WorkerConfig::default(),
        WorkerId::new("rescuer").unwrap(),
    );
    let outcome = runner.run_once().await.unwrap().unwrap();
    assert_eq!(outcome.status, JobStatus::Succeeded);

    let record = store.load(&job_id).unwrap();
    assert_eq!(record.status, JobStatus::Succeeded);
    assert_eq!(record.runs.len(), 2);
    assert_eq!(record.runs[0].worker_id, crashed);
    assert_eq!(record.runs[0].outcome, RunOutcome::Failed);
    assert!(record.runs[0].finished_at.is_some());
    assert!(record.runs[0].error.as_deref().unwrap().contains("abandoned"));
    assert_eq!(record.runs[1].worker_id.as_str(), "rescuer");
    assert_eq!(record.runs[1].outcome, RunOutcome::Succeeded);

    assert_eq!(env.entries_in("queued"), 0);
    assert_eq!(env.entries_in("claimed"), 0);
}

#[tokio::test]
async fn test_rerun_does_not_duplicate_artifacts() {
    let env = helpers::TestEnv::new();
    let job_id = env.submit("rerun");
    let runner = runner(&env, Arc::new(ScriptedEngine::default()), 1);

    let first = runner.run_once().await.unwrap().unwrap();
    assert_eq!(first.artifacts, 1);

    env.store.set_status(&job_id, JobStatus::Queued).unwrap();
    env.queue.enqueue(&job_id).unwrap();
    let second = runner.run_once().await.unwrap().unwrap();
    assert_eq!(second.status, JobStatus::Succeeded);
    assert_eq!(second.artifacts, 0);

    let record = env.store.load(&job_id).unwrap();
    assert_eq!(record.runs.len(), 2);
    let paths: Vec<_> = record.artifacts_index.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(paths, vec!["artifacts/summary.csv"]);
}
