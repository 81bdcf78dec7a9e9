//! Service-level errors.

use curator_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Malformed request (missing type, invalid purge scope, ...).
    #[error("{0}")]
    InvalidInput(String),

    #[error("Task not found: {0}")]
    NotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}
