use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a task.
///
/// `PENDING -> RUNNING -> {COMPLETED | CANCELED | FAILED}`.
/// The last three are terminal: once reached, no ticker may write counter fields again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Canceled,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Canceled | TaskStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Canceled => "CANCELED",
            TaskStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "RUNNING" => Ok(TaskStatus::Running),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "CANCELED" => Ok(TaskStatus::Canceled),
            "FAILED" => Ok(TaskStatus::Failed),
            other => Err(anyhow!("unknown task status: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    #[default]
    ZipGeneration,
    Counter,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::ZipGeneration => "ZIP_GENERATION",
            TaskType::Counter => "COUNTER",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ZIP_GENERATION" => Ok(TaskType::ZipGeneration),
            "COUNTER" => Ok(TaskType::Counter),
            other => Err(anyhow!("unknown task type: {other}")),
        }
    }
}

/// Persisted task record.
///
/// Only the counter engine writes `start_value`, `target_value`, `current_value`
/// and `progress`, and only while `status == Running`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub task_type: TaskType,
    pub status: TaskStatus,

    /// Counter range `[start_value, target_value]`, fixed once the counter starts.
    pub start_value: Option<i64>,
    pub target_value: Option<i64>,
    pub current_value: Option<i64>,

    /// Percentage in `[0, 100]`.
    pub progress: u8,
}

impl Task {
    /// Builds a fresh `PENDING` task with a new id and no counter state.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: Utc::now(),
            task_type: TaskType::default(),
            status: TaskStatus::Pending,
            start_value: None,
            target_value: None,
            current_value: None,
            progress: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Running
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status,
            progress: self.progress,
            current: self.current_value.unwrap_or(0),
            target: self.target_value.unwrap_or(0),
            message: None,
        }
    }
}

/// Point-in-time view of a counter, served from the store of record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub status: TaskStatus,
    pub progress: u8,
    pub current: i64,
    pub target: i64,
    pub message: Option<String>,
}
