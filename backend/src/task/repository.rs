use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::task::model::{Task, TaskStatus};

/// Store of record for tasks.
///
/// Implementations must give last-write-wins and read-your-writes semantics
/// within one process; they are shared between API callers and pool workers.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find(&self, id: &Uuid) -> Result<Option<Task>>;

    /// Full overwrite (insert or replace). Returns the saved value.
    async fn save(&self, task: Task) -> Result<Task>;

    /// Deleting an unknown id is not an error.
    async fn delete(&self, id: &Uuid) -> Result<()>;

    async fn list(&self) -> Result<Vec<Task>>;

    async fn find_by_status(&self, status: TaskStatus) -> Result<Vec<Task>>;
}
