//! Task and item status values.
//!
//! One status vocabulary covers both tasks and items; `deleted` is only ever
//! applied to tasks (administrative purge). Values persist as lowercase text.

use serde::{Deserialize, Serialize};

use crate::ParseEnumError;

/// Lifecycle status of a queue task or item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Canceled,
    Deleted,
}

impl QueueStatus {
    /// The lowercase text stored in the database and sent over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Queued => "queued",
            QueueStatus::Running => "running",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
            QueueStatus::Canceled => "canceled",
            QueueStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s {
            "queued" => Ok(QueueStatus::Queued),
            "running" => Ok(QueueStatus::Running),
            "completed" => Ok(QueueStatus::Completed),
            "failed" => Ok(QueueStatus::Failed),
            "canceled" => Ok(QueueStatus::Canceled),
            "deleted" => Ok(QueueStatus::Deleted),
            other => Err(ParseEnumError {
                kind: "queue status",
                value: other.to_string(),
            }),
        }
    }

    /// Terminal for a task: no further transitions allowed.
    pub fn is_terminal_task(&self) -> bool {
        matches!(
            self,
            QueueStatus::Completed
                | QueueStatus::Failed
                | QueueStatus::Canceled
                | QueueStatus::Deleted
        )
    }

    /// Terminal for an item.
    pub fn is_terminal_item(&self) -> bool {
        matches!(
            self,
            QueueStatus::Completed | QueueStatus::Failed | QueueStatus::Canceled
        )
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_lowercase() {
        for s in [
            QueueStatus::Queued,
            QueueStatus::Running,
            QueueStatus::Completed,
            QueueStatus::Failed,
            QueueStatus::Canceled,
            QueueStatus::Deleted,
        ] {
            assert_eq!(QueueStatus::parse(s.as_str()).unwrap(), s);
            assert_eq!(s.as_str(), s.as_str().to_lowercase());
        }
    }

    #[test]
    fn rejects_uppercase() {
        assert!(QueueStatus::parse("QUEUED").is_err());
        assert!(QueueStatus::parse("Queued").is_err());
    }

    #[test]
    fn serde_uses_lowercase() {
        assert_eq!(
            serde_json::to_string(&QueueStatus::Running).unwrap(),
            "\"running\""
        );
        let parsed: QueueStatus = serde_json::from_str("\"deleted\"").unwrap();
        assert_eq!(parsed, QueueStatus::Deleted);
    }
}
