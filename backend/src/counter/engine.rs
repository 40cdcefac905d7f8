//! Counter engine.
//!
//! Responsibilities:
//! - Admit a counter start for a task (range validation, single-job gate).
//! - Schedule its ticker on the shared pool and track the handle in the registry.
//! - Serve progress from the store of record.
//! - Cancel a running counter.
//!
//! Admission:
//! - `JobRegistry::try_reserve` is the atomic gate; two concurrent starts for the
//!   same id cannot both pass it.
//! - The stored `RUNNING` status is checked as a second line of defence (a job
//!   started by another process, or one left over from before a restart).
//!
//! Cancellation:
//! - The ticker is unscheduled first, then the task is re-read. A tick that
//!   finished the counter (or failed it) in between wins; its terminal status is
//!   returned and nothing is written over it.
//! - Otherwise `CANCELED` is saved on top of the freshly read values. A tick
//!   already past its status check may still persist one more increment after
//!   `cancel_counter` returns (bounded by one period). `TokioPool` aborts such a
//!   tick at its next await.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::counter::progress::percentage;
use crate::counter::tick::CounterTicker;
use crate::error::{EngineError, EngineResult};
use crate::metrics::counters::Counters;
use crate::scheduler::pool::SchedulingPool;
use crate::scheduler::registry::{JobRegistry, Ticket};
use crate::task::model::{ProgressSnapshot, Task, TaskStatus, TaskType};
use crate::task::repository::TaskStore;

pub struct CounterEngine {
    /// Source of truth for task state.
    store: Arc<dyn TaskStore>,

    /// Shared periodic executor.
    pool: Arc<dyn SchedulingPool>,

    /// Process-local record of which tickers are alive.
    registry: Arc<JobRegistry>,

    /// Time between two increments.
    tick_period: Duration,

    /// Observability counters (does not affect behavior).
    counters: Counters,
}

impl CounterEngine {
    pub fn new(
        store: Arc<dyn TaskStore>,
        pool: Arc<dyn SchedulingPool>,
        registry: Arc<JobRegistry>,
        tick_period: Duration,
    ) -> Self {
        Self {
            store,
            pool,
            registry,
            tick_period,
            counters: Counters::default(),
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn running_jobs(&self) -> usize {
        self.registry.len()
    }

    pub fn is_scheduled(&self, id: &Uuid) -> bool {
        self.registry.contains(id)
    }

    /// Starts counting from `x` to `y` (inclusive), one unit per tick period.
    ///
    /// Returns the freshly persisted `RUNNING` snapshot; the first tick runs
    /// immediately in the background.
    #[instrument(skip(self), target = "counter", fields(task_id = %id))]
    pub async fn start_counter(&self, id: Uuid, x: i64, y: i64) -> EngineResult<ProgressSnapshot> {
        if y < x {
            return Err(EngineError::InvalidRange {
                start: x,
                target: y,
            });
        }

        let mut task = self.load(&id).await?;

        let ticket = self
            .registry
            .try_reserve(id)
            .ok_or(EngineError::AlreadyRunning(id))?;

        if task.is_running() {
            self.registry.release(id, ticket);
            return Err(EngineError::AlreadyRunning(id));
        }

        task.task_type = TaskType::Counter;
        task.start_value = Some(x);
        task.target_value = Some(y);
        task.current_value = Some(x);
        task.progress = percentage(x, x, y);
        task.status = TaskStatus::Running;

        let saved = match self.store.save(task).await {
            Ok(t) => t,
            Err(e) => {
                self.registry.release(id, ticket);
                return Err(e.context("failed to persist RUNNING state").into());
            }
        };

        self.schedule(id, x, y, ticket);
        Counters::incr(&self.counters.counters_started);

        info!(start = x, target = y, "counter started");
        Ok(saved.snapshot())
    }

    /// Pure store read; never consults the registry.
    #[instrument(skip(self), target = "counter", fields(task_id = %id))]
    pub async fn get_progress(&self, id: Uuid) -> EngineResult<ProgressSnapshot> {
        Ok(self.load(&id).await?.snapshot())
    }

    /// Cancels a running counter; a no-op for any other status.
    ///
    /// `current`/`progress` keep the values they had when the cancel landed.
    #[instrument(skip(self), target = "counter", fields(task_id = %id))]
    pub async fn cancel_counter(&self, id: Uuid) -> EngineResult<ProgressSnapshot> {
        let task = self.load(&id).await?;

        if !task.is_running() {
            return Ok(task.snapshot());
        }

        self.registry.remove_and_cancel(id);

        let mut task = self.load(&id).await?;
        if !task.is_running() {
            debug!(status = %task.status, "counter stopped before cancel landed");
            return Ok(task.snapshot());
        }

        task.status = TaskStatus::Canceled;
        let saved = self
            .store
            .save(task)
            .await
            .map_err(|e| e.context("failed to persist CANCELED state"))?;

        Counters::incr(&self.counters.canceled);
        info!(current = saved.current_value, "counter cancelled");
        Ok(saved.snapshot())
    }

    /// Reschedules tasks a previous process left `RUNNING`.
    ///
    /// Each one continues from its persisted `current_value`. A record missing its
    /// range cannot be resumed and is marked `FAILED`. Returns how many resumed.
    #[instrument(skip(self), target = "counter")]
    pub async fn resume_running(&self) -> EngineResult<usize> {
        let running = self.store.find_by_status(TaskStatus::Running).await?;
        let mut resumed = 0usize;

        for mut task in running {
            let (Some(x), Some(y)) = (task.start_value, task.target_value) else {
                warn!(task_id = %task.id, "running task has no counter range; marking FAILED");
                task.status = TaskStatus::Failed;
                task.progress = 0;
                let id = task.id;
                if let Err(e) = self.store.save(task).await {
                    warn!(task_id = %id, error = ?e, "could not mark range-less task FAILED; skipping");
                    continue;
                }
                Counters::incr(&self.counters.failed);
                continue;
            };

            let Some(ticket) = self.registry.try_reserve(task.id) else {
                continue;
            };

            self.schedule(task.id, x, y, ticket);
            Counters::incr(&self.counters.counters_resumed);
            resumed += 1;
        }

        info!(resumed, "resumed orphaned counters");
        Ok(resumed)
    }

    /// Cancels every live ticker. Stored state is left as is, so the counters
    /// can be resumed by the next process.
    pub fn shutdown(&self) -> usize {
        self.registry.cancel_all()
    }

    fn schedule(&self, id: Uuid, x: i64, y: i64, ticket: Ticket) {
        let ticker = CounterTicker {
            id,
            start: x,
            target: y,
            ticket,
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            counters: self.counters.clone(),
        };

        let handle = self
            .pool
            .schedule_periodic(ticker.into_job(), Duration::ZERO, self.tick_period);

        self.registry.attach(id, ticket, handle);
    }

    async fn load(&self, id: &Uuid) -> EngineResult<Task> {
        self.store
            .find(id)
            .await?
            .ok_or(EngineError::NotFound(*id))
    }
}
