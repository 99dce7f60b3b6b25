//! Integration tests for the directory work queue.

mod helpers;

use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use statjob_core::error::ErrorKind;
use statjob_core::events::QueueEvent;
use statjob_core::types::{JobId, WorkerId};

#[test]
fn test_thirty_jobs_six_workers_exactly_once() {
    let env = helpers::TestEnv::new();
    let enqueued: HashSet<String> = (0..30)
        .map(|i| env.submit(&format!("job-{i:02}")).to_string())
        .collect();

    let workers = 6;
    let barrier = Arc::new(Barrier::new(workers));
    let acked = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..workers)
        .map(|w| {
            // Each worker gets its own handle, as a separate process would.
            let queue = env.reopen_queue();
            let barrier = Arc::clone(&barrier);
            let acked = Arc::clone(&acked);
            thread::spawn(move || {
                let worker_id = WorkerId::new(format!("worker-{w}")).unwrap();
                barrier.wait();
                while let Some(claim) = queue.claim(&worker_id).unwrap() {
                    queue.ack(&claim).unwrap();
                    acked.lock().unwrap().push(claim.job_id().to_string());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let acked = acked.lock().unwrap();
    assert_eq!(acked.len(), 30);
    let distinct: HashSet<String> = acked.iter().cloned().collect();
    assert_eq!(distinct, enqueued);
    assert_eq!(env.entries_in("queued"), 0);
    assert_eq!(env.entries_in("claimed"), 0);
}

#[test]
fn test_concurrent_enqueue_of_same_job_admits_one() {
    let env = helpers::TestEnv::new();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let queue = env.reopen_queue();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                queue.enqueue(&JobId::new("contended").unwrap())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let admitted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(admitted, 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind == ErrorKind::DuplicateEnqueue)
    );
    assert_eq!(env.entries_in("queued"), 1);
}

#[test]
fn test_concurrent_enqueue_sequences_are_unique() {
    let env = helpers::TestEnv::new();
    let barrier = Arc::new(Barrier::new(5));

    let handles: Vec<_> = (0..5)
        .map(|t| {
            let queue = env.reopen_queue();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..6)
                    .map(|i| {
                        queue
                            .enqueue(&JobId::new(format!("p{t}-{i}")).unwrap())
                            .unwrap()
                            .sequence
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut sequences: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=30).collect::<Vec<u64>>());
}

#[test]
fn test_empty_claim_and_double_ack() {
    let env = helpers::TestEnv::new();
    let worker = WorkerId::new("solo").unwrap();

    assert!(env.queue.claim(&worker).unwrap().is_none());

    env.submit("only");
    let claim = env.queue.claim(&worker).unwrap().unwrap();
    assert_eq!(claim.worker_id(), &worker);
    assert!(env.queue.claim(&worker).unwrap().is_none());

    env.queue.ack(&claim).unwrap();
    let err = env.queue.ack(&claim).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateAck);
}

#[test]
fn test_queue_survives_restart() {
    let env = helpers::TestEnv::new();
    env.submit("first");
    env.submit("second");
    let held = env
        .queue
        .claim(&WorkerId::new("before").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(held.job_id().as_str(), "first");

    let restarted = env.reopen_queue();
    let stats = restarted.stats().unwrap();
    assert_eq!((stats.queued, stats.claimed), (1, 1));

    let next = restarted
        .claim(&WorkerId::new("after").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(next.job_id().as_str(), "second");

    let third = restarted.enqueue(&JobId::new("third").unwrap()).unwrap();
    assert_eq!(third.sequence, 3);
}

#[test]
fn test_stale_claim_requeued_and_reclaimed() {
    let env = helpers::TestEnv::new();
    env.submit("crashy");
    let abandoned = env
        .queue
        .claim(&WorkerId::new("crashed").unwrap())
        .unwrap()
        .unwrap();

    thread::sleep(Duration::from_millis(30));
    let requeued = env.queue.requeue_stale(Duration::from_millis(10)).unwrap();
    assert_eq!(requeued, vec![abandoned.job_id().clone()]);

    let rescue = env
        .queue
        .claim(&WorkerId::new("rescuer").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(rescue.job_id(), abandoned.job_id());

    // The crashed worker's late ack must not remove the rescuer's claim.
    let err = env.queue.ack(&abandoned).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateAck);
    env.queue.ack(&rescue).unwrap();

    let kinds: Vec<&'static str> = env
        .events
        .queue_events()
        .iter()
        .map(|e| match e {
            QueueEvent::Enqueued { .. } => "enqueued",
            QueueEvent::Claimed { .. } => "claimed",
            QueueEvent::Acked { .. } => "acked",
            QueueEvent::Requeued { .. } => "requeued",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["enqueued", "claimed", "requeued", "claimed", "acked"]
    );
}
