//! Counters driven by the real tokio pool on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use task_backend::counter::CounterEngine;
use task_backend::scheduler::pool::TokioPool;
use task_backend::scheduler::registry::JobRegistry;
use task_backend::task::memory::InMemoryTaskStore;
use task_backend::task::model::{Task, TaskStatus};
use task_backend::task::repository::TaskStore;

const PERIOD: Duration = Duration::from_secs(1);

/// Just past the tick scheduled at `secs`.
async fn settle_until(start: tokio::time::Instant, secs: u64) {
    tokio::time::sleep_until(start + Duration::from_secs(secs) + Duration::from_millis(10)).await;
}

fn setup(workers: usize) -> (Arc<InMemoryTaskStore>, Arc<JobRegistry>, CounterEngine) {
    let store = Arc::new(InMemoryTaskStore::new());
    let registry = Arc::new(JobRegistry::new());
    let engine = CounterEngine::new(
        store.clone(),
        Arc::new(TokioPool::new(workers)),
        registry.clone(),
        PERIOD,
    );
    (store, registry, engine)
}

#[tokio::test(start_paused = true)]
async fn one_step_per_period_until_completed() {
    let (store, registry, engine) = setup(4);
    let id = store.save(Task::new("c")).await.unwrap().id;

    let t0 = tokio::time::Instant::now();
    let snap = engine.start_counter(id, 1, 3).await.unwrap();
    assert_eq!((snap.status, snap.current, snap.progress), (TaskStatus::Running, 1, 0));

    // first tick fires without initial delay
    settle_until(t0, 0).await;
    let s = engine.get_progress(id).await.unwrap();
    assert_eq!((s.status, s.current, s.progress), (TaskStatus::Running, 2, 50));

    settle_until(t0, 1).await;
    let s = engine.get_progress(id).await.unwrap();
    assert_eq!((s.status, s.current, s.progress), (TaskStatus::Running, 3, 100));

    settle_until(t0, 2).await;
    let s = engine.get_progress(id).await.unwrap();
    assert_eq!((s.status, s.current, s.progress), (TaskStatus::Completed, 3, 100));
    assert!(registry.is_empty());

    settle_until(t0, 6).await;
    assert_eq!(engine.get_progress(id).await.unwrap(), s);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_counting() {
    let (store, registry, engine) = setup(4);
    let id = store.save(Task::new("c")).await.unwrap().id;

    let t0 = tokio::time::Instant::now();
    engine.start_counter(id, 0, 100).await.unwrap();

    settle_until(t0, 2).await;
    let snap = engine.cancel_counter(id).await.unwrap();
    assert_eq!((snap.status, snap.current, snap.progress), (TaskStatus::Canceled, 3, 3));
    assert!(registry.is_empty());

    settle_until(t0, 10).await;
    assert_eq!(engine.get_progress(id).await.unwrap(), snap);
}

#[tokio::test(start_paused = true)]
async fn more_counters_than_workers_all_complete() {
    let (store, registry, engine) = setup(2);

    let mut ids = Vec::new();
    for i in 0..10 {
        let id = store.save(Task::new(format!("c{i}"))).await.unwrap().id;
        engine.start_counter(id, 0, 2).await.unwrap();
        ids.push(id);
    }
    assert_eq!(engine.running_jobs(), 10);

    tokio::time::sleep(Duration::from_secs(5)).await;

    for id in ids {
        let s = engine.get_progress(id).await.unwrap();
        assert_eq!((s.status, s.current), (TaskStatus::Completed, 2));
    }
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn deleting_the_record_ends_the_job() {
    let (store, registry, engine) = setup(1);
    let id = store.save(Task::new("c")).await.unwrap().id;

    let t0 = tokio::time::Instant::now();
    engine.start_counter(id, 0, 100).await.unwrap();
    settle_until(t0, 1).await;

    store.delete(&id).await.unwrap();
    settle_until(t0, 2).await;

    assert!(registry.is_empty());
    assert!(store.is_empty());
}
