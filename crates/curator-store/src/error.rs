//! Unified error type for store operations.

use curator_types::QueueStatus;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("Item not found: {0}")]
    ItemNotFound(i64),

    #[error("Invalid status transition: {current} -> {requested}")]
    InvalidTransition {
        current: QueueStatus,
        requested: QueueStatus,
    },

    #[error("Status is terminal: {0}")]
    TerminalState(QueueStatus),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Migration {name} failed: {message}")]
    Migration { name: String, message: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<curator_types::ParseEnumError> for StoreError {
    fn from(err: curator_types::ParseEnumError) -> Self {
        StoreError::Database(err.to_string())
    }
}
