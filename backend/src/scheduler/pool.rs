//! Periodic job scheduling shared by every counter in the process.
//!
//! The pool is deliberately ignorant of tasks: it runs an opaque async callback
//! once per period until the returned handle is cancelled.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// A periodic callback. Called once per tick; each call yields a fresh future.
pub type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Anything that can stop a scheduled job.
pub trait Cancellable: Send + Sync + 'static {
    /// Cancels with interrupt: an in-flight run is stopped at its next suspension point.
    fn cancel(&self);
}

impl Cancellable for tokio::task::AbortHandle {
    fn cancel(&self) {
        self.abort();
    }
}

/// Handle returned by [`SchedulingPool::schedule_periodic`].
///
/// Dropping the handle does not cancel the job.
pub struct JobHandle(Box<dyn Cancellable>);

impl JobHandle {
    pub fn new(inner: impl Cancellable) -> Self {
        Self(Box::new(inner))
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JobHandle")
    }
}

pub trait SchedulingPool: Send + Sync {
    fn schedule_periodic(&self, job: Job, initial_delay: Duration, period: Duration) -> JobHandle;
}

/// Fixed-size pool on the tokio runtime.
///
/// Each scheduled job gets its own timer loop, but a tick only runs once it holds
/// one of `workers` permits. When more jobs are due than there are workers, ticks
/// queue on the semaphore: scheduling jitter grows, schedules never fail.
pub struct TokioPool {
    runtime: Handle,
    workers: Arc<Semaphore>,
}

impl TokioPool {
    /// Must be called from within a tokio runtime.
    pub fn new(workers: usize) -> Self {
        Self::with_runtime(Handle::current(), workers)
    }

    pub fn with_runtime(runtime: Handle, workers: usize) -> Self {
        let size = workers.max(1);
        info!(workers = size, "scheduling pool started");
        Self {
            runtime,
            workers: Arc::new(Semaphore::new(size)),
        }
    }

    /// Permits not currently held by a running tick.
    pub fn idle_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// Stops handing out workers; every job loop exits at its next tick.
    pub fn shutdown(&self) {
        self.workers.close();
        info!("scheduling pool shut down");
    }
}

impl SchedulingPool for TokioPool {
    fn schedule_periodic(&self, job: Job, initial_delay: Duration, period: Duration) -> JobHandle {
        let workers = Arc::clone(&self.workers);
        let period = period.max(Duration::from_millis(1));

        let task = self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, period);
            // A late tick runs once and shifts the schedule; ticks never overlap.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Ok(_permit) = workers.acquire().await else {
                    debug!("pool closed; periodic job exiting");
                    break;
                };

                job().await;
            }
        });

        JobHandle::new(task.abort_handle())
    }
}
