use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::task::model::{Task, TaskStatus, TaskType};
use crate::task::repository::TaskStore;

/// SQLx-backed implementation of TaskStore.
/// Responsible only for persistence and row mapping.
pub struct SqlxTaskRepository {
    pool: AnyPool,
}

impl SqlxTaskRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
SELECT
  id, name, created_at_ms, task_type, status,
  start_value, target_value, current_value,
  progress
FROM tasks
"#;

#[async_trait]
impl TaskStore for SqlxTaskRepository {
    async fn find(&self, id: &Uuid) -> anyhow::Result<Option<Task>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?;");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_task(&r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, task: Task) -> anyhow::Result<Task> {
        sqlx::query(
            r#"
INSERT INTO tasks (
  id, name, created_at_ms, task_type, status,
  start_value, target_value, current_value,
  progress
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(id) DO UPDATE SET
  name = excluded.name,
  created_at_ms = excluded.created_at_ms,
  task_type = excluded.task_type,
  status = excluded.status,
  start_value = excluded.start_value,
  target_value = excluded.target_value,
  current_value = excluded.current_value,
  progress = excluded.progress;
"#,
        )
        .bind(task.id.to_string())
        .bind(task.name.clone())
        .bind(task.created_at.timestamp_millis())
        .bind(task.task_type.as_str())
        .bind(task.status.as_str())
        .bind(task.start_value)
        .bind(task.target_value)
        .bind(task.current_value)
        .bind(i64::from(task.progress))
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save task {}", task.id))?;

        Ok(task)
    }

    async fn delete(&self, id: &Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?;")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<Task>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY created_at_ms;");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(map_rows(&rows))
    }

    async fn find_by_status(&self, status: TaskStatus) -> anyhow::Result<Vec<Task>> {
        let sql = format!("{SELECT_COLUMNS} WHERE status = ?;");
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(map_rows(&rows))
    }
}

/* =========================
Row mapping + conversions
========================= */

fn map_rows(rows: &[sqlx::any::AnyRow]) -> Vec<Task> {
    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        match row_to_task(r) {
            Ok(t) => out.push(t),
            Err(e) => {
                // poison-row resilience: skip but don't fail the listing
                tracing::warn!(error = %e, "skipping malformed task row");
            }
        }
    }
    out
}

fn row_to_task(r: &sqlx::any::AnyRow) -> anyhow::Result<Task> {
    let id_str: String = r.try_get("id")?;
    let id = Uuid::parse_str(&id_str).context("invalid task id")?;

    let task_type: String = r.try_get("task_type")?;
    let status: String = r.try_get("status")?;

    Ok(Task {
        id,
        name: r.try_get::<String, _>("name")?,
        created_at: millis_to_datetime(r.try_get("created_at_ms")?)?,
        task_type: task_type.parse::<TaskType>()?,
        status: status.parse::<TaskStatus>()?,
        start_value: r.try_get::<Option<i64>, _>("start_value")?,
        target_value: r.try_get::<Option<i64>, _>("target_value")?,
        current_value: r.try_get::<Option<i64>, _>("current_value")?,
        progress: i64_to_progress(r.try_get("progress")?)?,
    })
}

/* =========================
Numeric safety helpers
========================= */

fn i64_to_progress(v: i64) -> anyhow::Result<u8> {
    if !(0..=100).contains(&v) {
        return Err(anyhow!("progress out of range [0, 100]: {v}"));
    }
    Ok(v as u8)
}

fn millis_to_datetime(ms: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| anyhow!("invalid timestamp: {ms}"))
}
