//! Scheduler-level error types.

use thiserror::Error;

/// Errors produced by the cron scheduler's tick loop and schedule CRUD.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{0}': {1}")]
    CronInvalid(String, String),

    #[error("invalid IANA timezone '{0}'")]
    TzInvalid(String),

    #[error("schedule '{0}' not found")]
    NotFound(String),

    #[error("executor rejected activation for schedule '{schedule_id}' at {run_at}: {message}")]
    EnqueueFailure { schedule_id: String, run_at: chrono::DateTime<chrono::Utc>, message: String },

    #[error("lost leader lease mid-tick")]
    LeaseLost,

    #[error("schedule '{0}' exceeded MAX_CATCHUP_PER_TICK; remaining fire times carried to next tick")]
    CatchupOverflow(String),

    #[error("underlying engine error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("store error: {0}")]
    Store(String),
}
