use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced synchronously by the counter engine and task service.
///
/// Failures inside a running tick are never returned here; they end the job and
/// show up only as a `FAILED` task status.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid range: target {target} is below start {start}")]
    InvalidRange { start: i64, target: i64 },

    #[error("task not found: {0}")]
    NotFound(Uuid),

    #[error("task is already running: {0}")]
    AlreadyRunning(Uuid),

    #[error("task store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// Stable error code for an API layer.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidRange { .. } => "BAD_REQUEST",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::AlreadyRunning(_) => "CONFLICT",
            EngineError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
