use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::counter::CounterEngine;
use crate::error::{EngineError, EngineResult};
use crate::task::model::Task;
use crate::task::repository::TaskStore;

/// Task lifecycle operations around the counter engine.
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    engine: Arc<CounterEngine>,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, engine: Arc<CounterEngine>) -> Self {
        Self { store, engine }
    }

    #[instrument(skip(self, name), target = "tasks")]
    pub async fn create(&self, name: impl Into<String> + Send) -> EngineResult<Task> {
        let task = self.store.save(Task::new(name)).await?;
        info!(task_id = %task.id, "task created");
        Ok(task)
    }

    pub async fn get(&self, id: Uuid) -> EngineResult<Task> {
        self.store.find(&id).await?.ok_or(EngineError::NotFound(id))
    }

    pub async fn list(&self) -> EngineResult<Vec<Task>> {
        Ok(self.store.list().await?)
    }

    /// Renames a task. A running counter owns its record, so renaming one is
    /// refused rather than racing its ticks.
    #[instrument(skip(self, name), target = "tasks", fields(task_id = %id))]
    pub async fn update(&self, id: Uuid, name: impl Into<String> + Send) -> EngineResult<Task> {
        let mut task = self.get(id).await?;
        if task.is_running() {
            return Err(EngineError::AlreadyRunning(id));
        }
        task.name = name.into();
        let task = self.store.save(task).await?;
        info!("task renamed");
        Ok(task)
    }

    /// Stops a running counter first, so a deleted task never keeps ticking.
    #[instrument(skip(self), target = "tasks", fields(task_id = %id))]
    pub async fn delete(&self, id: Uuid) -> EngineResult<()> {
        self.engine.cancel_counter(id).await?;
        self.store.delete(&id).await?;
        info!("task deleted");
        Ok(())
    }
}
