//! Integration tests for the job record store.

mod helpers;

use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use serde_json::json;

use statjob_core::error::ErrorKind;
use statjob_core::events::RecordEvent;
use statjob_core::types::JobId;
use statjob_entity::{ArtifactDescriptor, JobStatus};

fn migrated_steps(env: &helpers::TestEnv, id: &str) -> Vec<(u32, u32)> {
    env.events
        .record_events()
        .into_iter()
        .filter_map(|e| match e {
            RecordEvent::Migrated {
                job_id,
                from_version,
                to_version,
            } if job_id.as_str() == id => Some((from_version, to_version)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_legacy_record_migrates_through_every_step_once() {
    let env = helpers::TestEnv::new();
    env.write_raw(
        "legacy",
        &json!({
            "job_id": "legacy",
            "status": "created",
            "created_at": "2023-05-01T10:00:00Z",
            "requirement": "t-test on groups A and B"
        }),
    );

    let record = env.store.load(&JobId::new("legacy").unwrap()).unwrap();
    assert_eq!(record.schema_version, 3);
    assert_eq!(record.version, 1);
    assert!(record.runs.is_empty());
    assert!(record.artifacts_index.is_empty());
    assert_eq!(record.requirement.as_deref(), Some("t-test on groups A and B"));
    assert_eq!(migrated_steps(&env, "legacy"), vec![(1, 2), (2, 3)]);

    let on_disk = env.read_raw("legacy");
    assert_eq!(on_disk["schema_version"], json!(3));
    assert_eq!(on_disk["runs"], json!([]));

    // A second load, from a fresh handle, finds nothing left to do.
    env.reopen_store()
        .load(&JobId::new("legacy").unwrap())
        .unwrap();
    assert_eq!(migrated_steps(&env, "legacy").len(), 2);
}

#[test]
fn test_intermediate_version_applies_remaining_steps_only() {
    let env = helpers::TestEnv::new();
    env.write_raw(
        "v2",
        &json!({
            "schema_version": 2,
            "version": 7,
            "job_id": "v2",
            "status": "succeeded",
            "created_at": "2024-01-01T00:00:00Z"
        }),
    );

    let record = env.store.load(&JobId::new("v2").unwrap()).unwrap();
    assert_eq!(record.version, 7);
    assert_eq!(record.status, JobStatus::Succeeded);
    assert_eq!(migrated_steps(&env, "v2"), vec![(2, 3)]);
}

#[test]
fn test_concurrent_first_loads_migrate_once() {
    let env = helpers::TestEnv::new();
    env.write_raw(
        "race",
        &json!({"job_id": "race", "status": "queued", "created_at": "2023-05-01T10:00:00Z"}),
    );

    let barrier = Arc::new(Barrier::new(6));
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let store = env.reopen_store();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.load(&JobId::new("race").unwrap()).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().schema_version, 3);
    }
    assert_eq!(migrated_steps(&env, "race"), vec![(1, 2), (2, 3)]);
}

#[test]
fn test_round_trip_preserves_document() {
    let env = helpers::TestEnv::new();
    env.write_raw(
        "extras",
        &json!({
            "schema_version": 3,
            "version": 2,
            "job_id": "extras",
            "status": "created",
            "created_at": "2024-03-03T03:03:03Z",
            "requirement": "regression",
            "runs": [],
            "artifacts_index": [],
            "draft": {"plan": ["clean", "fit"], "confirmed": false}
        }),
    );
    let job_id = JobId::new("extras").unwrap();

    let record = env.store.load(&job_id).unwrap();
    env.store.save(&record).unwrap();
    let reloaded = env.store.load(&job_id).unwrap();

    assert_eq!(reloaded, record);
    assert_eq!(
        env.read_raw("extras")["draft"],
        json!({"plan": ["clean", "fit"], "confirmed": false})
    );
}

#[test]
fn test_error_taxonomy() {
    let env = helpers::TestEnv::new();

    let err = env.store.load(&JobId::new("absent").unwrap()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    env.write_raw("future", &json!({"schema_version": 99, "job_id": "future"}));
    let err = env.store.load(&JobId::new("future").unwrap()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CorruptRecord);

    env.write_raw("array", &json!([1, 2, 3]));
    let err = env.store.load(&JobId::new("array").unwrap()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CorruptRecord);

    env.store.create(Some(JobId::new("taken").unwrap()), None).unwrap();
    let err = env
        .store
        .create(Some(JobId::new("taken").unwrap()), None)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[test]
fn test_concurrent_saves_never_expose_torn_documents() {
    let env = helpers::TestEnv::new();
    let job_id = JobId::new("hot").unwrap();
    let base = env.store.create(Some(job_id.clone()), None).unwrap();

    let writers = 6;
    let rounds = 15;
    let barrier = Arc::new(Barrier::new(writers + 1));
    let mut handles = Vec::new();

    for w in 0..writers {
        let store = env.reopen_store();
        let barrier = Arc::clone(&barrier);
        let mut record = base.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            for r in 0..rounds {
                // Large enough that a partial write would be observable.
                record.requirement = Some(format!("w{w}-r{r}-{}", "x".repeat(32 * 1024)));
                store.save(&record).unwrap();
            }
        }));
    }

    let reader = {
        let store = env.reopen_store();
        let job_id = job_id.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..200 {
                let record = store.load(&job_id).unwrap();
                if let Some(req) = record.requirement {
                    assert!(req.ends_with(&"x".repeat(32 * 1024)));
                }
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    let last = env.store.load(&job_id).unwrap();
    let req = last.requirement.unwrap();
    assert!(req.starts_with('w') && req.contains("-r14-"));
}

#[test]
fn test_concurrent_updates_do_not_lose_writes() {
    let env = helpers::TestEnv::new();
    let job_id = JobId::new("counter").unwrap();
    env.store.create(Some(job_id.clone()), None).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = env.reopen_store();
            let job_id = job_id.clone();
            thread::spawn(move || {
                for i in 0..10 {
                    store
                        .update(&job_id, |record| {
                            record.add_artifact(ArtifactDescriptor::new(
                                format!("t{t}-{i}.csv"),
                                format!("artifacts/t{t}-{i}.csv"),
                                "table",
                                None,
                            ));
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(env.store.load(&job_id).unwrap().artifacts_index.len(), 80);
}

#[test]
fn test_locks_are_per_job() {
    let env = helpers::TestEnv::new();
    let a = env.store.create(Some(JobId::new("job-a").unwrap()), None).unwrap();
    let b = env.store.create(Some(JobId::new("job-b").unwrap()), None).unwrap();

    let lock_a = statjob_store::lock_exclusive(&env.store.job_dir(&a.job_id).join(".job.lock"))
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let store = env.reopen_store();
    let writer = thread::spawn(move || {
        store.save(&b).unwrap();
        tx.send(()).unwrap();
    });

    rx.recv_timeout(Duration::from_secs(5))
        .expect("save of job-b blocked behind job-a's lock");
    writer.join().unwrap();
    drop(lock_a);
}
