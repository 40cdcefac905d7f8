//! One counter job: the body the scheduling pool runs once per period.
//!
//! Every tick re-reads the task from the store, so an external cancel or delete
//! is observed at the next tick boundary. A tick that already passed its
//! `RUNNING` check when a cancel lands may still persist one more increment;
//! the window is bounded by one tick period.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use crate::counter::progress::percentage;
use crate::logger::{tick_span, warn_if_slow};
use crate::metrics::counters::Counters;
use crate::scheduler::pool::Job;
use crate::scheduler::registry::{JobRegistry, Ticket};
use crate::task::model::TaskStatus;
use crate::task::repository::TaskStore;

const SLOW_STORE_OP: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The task record was deleted under the ticker.
    Missing,
    /// Someone else moved the task out of `RUNNING` (cancel, or a previous tick).
    NotRunning(TaskStatus),
    /// This tick reached the target.
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Advanced { current: i64, progress: u8 },
    Stopped(StopReason),
}

pub struct CounterTicker {
    pub(crate) id: Uuid,
    /// Range captured at start; used when the stored fields are missing.
    pub(crate) start: i64,
    pub(crate) target: i64,
    pub(crate) ticket: Ticket,
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) counters: Counters,
}

impl CounterTicker {
    /// Wraps the ticker into a pool job.
    pub fn into_job(self) -> Job {
        let ticker = Arc::new(self);
        Arc::new(move || {
            let ticker = Arc::clone(&ticker);
            async move { ticker.run_once().await }.boxed()
        })
    }

    /// Runs one tick. Never fails and never panics into the pool: any error ends
    /// the job with a best-effort `FAILED` write.
    pub async fn run_once(&self) {
        let span = tick_span(&self.id);

        async {
            Counters::incr(&self.counters.ticks);

            let result = AssertUnwindSafe(self.advance()).catch_unwind().await;

            match result {
                Ok(Ok(TickOutcome::Advanced { current, .. })) => {
                    tracing::Span::current().record("current", current);
                }
                Ok(Ok(TickOutcome::Stopped(reason))) => {
                    tracing::Span::current().record("outcome", tracing::field::debug(reason));
                    self.stop(reason);
                }
                Ok(Err(e)) => {
                    error!(task_id = %self.id, error = ?e, "counter tick failed");
                    self.fail().await;
                }
                Err(_) => {
                    error!(task_id = %self.id, "counter tick panicked");
                    self.fail().await;
                }
            }
        }
        .instrument(span)
        .await
    }

    /// The tick body: read, decide, write back a self-consistent record.
    pub async fn advance(&self) -> anyhow::Result<TickOutcome> {
        let found = warn_if_slow("tick_find", SLOW_STORE_OP, self.store.find(&self.id)).await?;

        let Some(mut task) = found else {
            return Ok(TickOutcome::Stopped(StopReason::Missing));
        };

        if task.status != TaskStatus::Running {
            return Ok(TickOutcome::Stopped(StopReason::NotRunning(task.status)));
        }

        let cur = task.current_value.unwrap_or(self.start);
        let target = task.target_value.unwrap_or(self.target);

        if cur >= target {
            task.current_value = Some(target);
            task.progress = 100;
            task.status = TaskStatus::Completed;
            warn_if_slow("tick_save", SLOW_STORE_OP, self.store.save(task)).await?;
            return Ok(TickOutcome::Stopped(StopReason::Completed));
        }

        let current = cur + 1;
        let progress = percentage(current, self.start, target);
        task.current_value = Some(current);
        task.progress = progress;
        warn_if_slow("tick_save", SLOW_STORE_OP, self.store.save(task)).await?;

        debug!(current, progress, "counter advanced");
        Ok(TickOutcome::Advanced { current, progress })
    }

    fn stop(&self, reason: StopReason) {
        match reason {
            StopReason::Completed => {
                Counters::incr(&self.counters.completed);
                info!(task_id = %self.id, "counter completed");
            }
            StopReason::Missing => {
                Counters::incr(&self.counters.vanished);
                info!(task_id = %self.id, "task deleted; stopping counter");
            }
            StopReason::NotRunning(status) => {
                debug!(task_id = %self.id, %status, "task no longer running; stopping counter");
            }
        }

        self.registry.release(self.id, self.ticket);
    }

    /// Terminal `FAILED` write; progress is reset to 0, unlike other terminal states.
    async fn fail(&self) {
        Counters::incr(&self.counters.failed);

        match self.store.find(&self.id).await {
            Ok(Some(mut task)) => {
                task.status = TaskStatus::Failed;
                task.progress = 0;
                if let Err(e) = self.store.save(task).await {
                    warn!(task_id = %self.id, error = ?e, "could not persist FAILED status");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(task_id = %self.id, error = ?e, "could not reload task to mark it FAILED");
            }
        }

        self.registry.release(self.id, self.ticket);
    }
}
