use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::task::model::{Task, TaskStatus};
use crate::task::repository::TaskStore;

/// Process-local task store backed by a map.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<Uuid, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find(&self, id: &Uuid) -> anyhow::Result<Option<Task>> {
        Ok(self.tasks.lock().get(id).cloned())
    }

    async fn save(&self, task: Task) -> anyhow::Result<Task> {
        self.tasks.lock().insert(task.id, task.clone());
        Ok(task)
    }

    async fn delete(&self, id: &Uuid) -> anyhow::Result<()> {
        self.tasks.lock().remove(id);
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<Task>> {
        let mut out: Vec<Task> = self.tasks.lock().values().cloned().collect();
        out.sort_by_key(|t| t.created_at);
        Ok(out)
    }

    async fn find_by_status(&self, status: TaskStatus) -> anyhow::Result<Vec<Task>> {
        Ok(self
            .tasks
            .lock()
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect())
    }
}
