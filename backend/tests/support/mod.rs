#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

use task_backend::counter::CounterEngine;
use task_backend::scheduler::pool::{Cancellable, Job, JobHandle, SchedulingPool};
use task_backend::scheduler::registry::JobRegistry;
use task_backend::task::memory::InMemoryTaskStore;
use task_backend::task::model::{Task, TaskStatus};
use task_backend::task::repository::TaskStore;

pub const PERIOD: Duration = Duration::from_secs(1);

// -----------------------
// Manual pool
// -----------------------

struct ManualCancel(Arc<AtomicBool>);

impl Cancellable for ManualCancel {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

struct Scheduled {
    job: Job,
    cancelled: Arc<AtomicBool>,
    initial_delay: Duration,
    period: Duration,
}

/// Pool whose ticks are fired by the test, one round at a time.
#[derive(Default)]
pub struct ManualPool {
    jobs: Mutex<Vec<Scheduled>>,
}

impl ManualPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every live job once, in scheduling order.
    pub async fn tick(&self) {
        let live: Vec<Job> = self
            .jobs
            .lock()
            .iter()
            .filter(|s| !s.cancelled.load(Ordering::SeqCst))
            .map(|s| Arc::clone(&s.job))
            .collect();

        for job in live {
            job().await;
        }
    }

    pub async fn tick_n(&self, n: usize) {
        for _ in 0..n {
            self.tick().await;
        }
    }

    pub fn scheduled(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn live_jobs(&self) -> usize {
        self.jobs
            .lock()
            .iter()
            .filter(|s| !s.cancelled.load(Ordering::SeqCst))
            .count()
    }

    pub fn timing(&self, index: usize) -> (Duration, Duration) {
        let jobs = self.jobs.lock();
        (jobs[index].initial_delay, jobs[index].period)
    }
}

impl SchedulingPool for ManualPool {
    fn schedule_periodic(&self, job: Job, initial_delay: Duration, period: Duration) -> JobHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.jobs.lock().push(Scheduled {
            job,
            cancelled: Arc::clone(&cancelled),
            initial_delay,
            period,
        });
        JobHandle::new(ManualCancel(cancelled))
    }
}

// -----------------------
// Flaky store
// -----------------------

type FindGate = (oneshot::Sender<()>, oneshot::Receiver<()>);

/// In-memory store that can be told to fail, panic or pause on upcoming calls for one id.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryTaskStore,
    failing_saves: Mutex<HashMap<Uuid, usize>>,
    panicking_finds: Mutex<HashMap<Uuid, usize>>,
    paused_finds: Mutex<HashMap<Uuid, FindGate>>,
}

/// Test side of a paused `find`.
pub struct PausedFind {
    /// Resolves once the paused call has read the record.
    pub reached: oneshot::Receiver<()>,
    /// Send to let the paused call return what it read.
    pub release: oneshot::Sender<()>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_saves(&self, id: Uuid, n: usize) {
        self.failing_saves.lock().insert(id, n);
    }

    pub fn panic_next_finds(&self, id: Uuid, n: usize) {
        self.panicking_finds.lock().insert(id, n);
    }

    /// The next `find` for `id` reads the record, then waits for `release`.
    pub fn pause_next_find(&self, id: Uuid) -> PausedFind {
        let (reached_tx, reached) = oneshot::channel();
        let (release, release_rx) = oneshot::channel();
        self.paused_finds.lock().insert(id, (reached_tx, release_rx));
        PausedFind { reached, release }
    }

    fn take(map: &Mutex<HashMap<Uuid, usize>>, id: &Uuid) -> bool {
        let mut map = map.lock();
        match map.get_mut(id) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl TaskStore for FlakyStore {
    async fn find(&self, id: &Uuid) -> anyhow::Result<Option<Task>> {
        if Self::take(&self.panicking_finds, id) {
            panic!("store blew up reading {id}");
        }
        let found = self.inner.find(id).await;

        let gate = self.paused_finds.lock().remove(id);
        if let Some((reached, release)) = gate {
            let _ = reached.send(());
            let _ = release.await;
        }

        found
    }

    async fn save(&self, task: Task) -> anyhow::Result<Task> {
        if Self::take(&self.failing_saves, &task.id) {
            anyhow::bail!("Database Offline");
        }
        self.inner.save(task).await
    }

    async fn delete(&self, id: &Uuid) -> anyhow::Result<()> {
        self.inner.delete(id).await
    }

    async fn list(&self) -> anyhow::Result<Vec<Task>> {
        self.inner.list().await
    }

    async fn find_by_status(&self, status: TaskStatus) -> anyhow::Result<Vec<Task>> {
        self.inner.find_by_status(status).await
    }
}

// -----------------------
// Harness
// -----------------------

pub struct Harness<S: TaskStore + 'static> {
    pub store: Arc<S>,
    pub pool: Arc<ManualPool>,
    pub registry: Arc<JobRegistry>,
    pub engine: Arc<CounterEngine>,
}

pub fn harness_with<S: TaskStore + 'static>(store: S) -> Harness<S> {
    let store = Arc::new(store);
    let pool = Arc::new(ManualPool::new());
    let registry = Arc::new(JobRegistry::new());
    let engine = Arc::new(CounterEngine::new(
        store.clone(),
        pool.clone(),
        registry.clone(),
        PERIOD,
    ));

    Harness {
        store,
        pool,
        registry,
        engine,
    }
}

pub fn harness() -> Harness<FlakyStore> {
    harness_with(FlakyStore::new())
}

pub async fn insert_pending<S: TaskStore>(store: &S) -> Uuid {
    store.save(Task::new("counter")).await.unwrap().id
}

pub async fn stored<S: TaskStore>(store: &S, id: Uuid) -> Task {
    store.find(&id).await.unwrap().expect("task present")
}
