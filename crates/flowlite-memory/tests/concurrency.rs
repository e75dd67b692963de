//! Cross-collaborator tests that don't fit as a single-module unit test:
//! the scheduler's in-flight guard under concurrent scheduling, and the
//! persister's CAS staying linearizable under concurrent claim attempts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flowlite_core::{FlowId, InstanceData, InstanceId, Persister, SchedulerConfig, StageStatus, TickScheduler};
use flowlite_memory::{InMemoryPersister, InMemoryTickScheduler};

#[tokio::test]
async fn scheduler_never_runs_the_same_key_twice_at_once() {
    let scheduler = InMemoryTickScheduler::new(SchedulerConfig::new(4, Duration::from_millis(5)));
    let concurrent = Arc::new(AtomicUsize::new(0));
    let max_concurrent = Arc::new(AtomicUsize::new(0));

    let concurrent_clone = concurrent.clone();
    let max_clone = max_concurrent.clone();
    scheduler.set_tick_handler(Arc::new(move |_flow, _instance| {
        let concurrent = concurrent_clone.clone();
        let max_concurrent = max_clone.clone();
        Box::pin(async move {
            let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            max_concurrent.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            concurrent.fetch_sub(1, Ordering::SeqCst);
        })
    }));

    let flow = FlowId::new("dup");
    let instance = InstanceId::new_v4();
    for _ in 0..8 {
        scheduler.schedule_tick(flow.clone(), instance).await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);

    let (tx, rx) = std::sync::mpsc::channel();
    scheduler.stop(Box::new(move || { let _ = tx.send(()); })).await;
    rx.recv_timeout(Duration::from_secs(1)).unwrap();
}

#[tokio::test]
async fn persister_cas_is_linearizable_under_contention() {
    let persister: Arc<InMemoryPersister<&'static str, i32>> = Arc::new(InMemoryPersister::new());
    let id = InstanceId::new_v4();
    persister
        .save(InstanceData {
            flow_instance_id: id,
            state: 0,
            stage: "start",
            stage_status: StageStatus::Pending,
            version: 0,
        })
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let persister = persister.clone();
        handles.push(tokio::spawn(async move {
            persister
                .try_transition_stage_status(id, &"start", StageStatus::Pending, StageStatus::Running)
                .await
                .unwrap()
        }));
    }

    let mut successes = 0;
    for h in handles {
        if h.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
}
