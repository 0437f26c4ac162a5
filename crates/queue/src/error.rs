//! Queue-level error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job '{0}' not found")]
    NotFound(String),

    #[error("queue storage error: {0}")]
    Store(String),
}
