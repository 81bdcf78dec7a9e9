//! Persistence models for queue tasks, items, and log rows.
//!
//! Records carry only serializable fields; runtime handles (cancellation,
//! worker state) live in the queue crate. Datetimes are RFC 3339 text as
//! stored.

use serde_json::{Value, json};

use curator_types::{ParseEnumError, QueueStatus, TaskMeta, TaskType};

/// A queue task row, optionally with its items preloaded.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: i64,
    pub task_type: TaskType,
    pub status: QueueStatus,
    pub created_by: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub canceled_at: Option<String>,
    pub total_items: i64,
    pub completed_items: i64,
    pub meta: Option<TaskMeta>,
    /// Sorted by `index` ascending when preloaded; empty for list views.
    pub items: Vec<ItemRecord>,
}

/// A queue item row.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub id: i64,
    pub task_id: i64,
    pub index: i64,
    pub status: QueueStatus,
    pub payload: Option<Value>,
    pub result: Option<Value>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl TaskRecord {
    /// Wire representation used by the HTTP API and the event stream.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "type": self.task_type.as_str(),
            "status": self.status.as_str(),
            "created_by": self.created_by,
            "created_at": self.created_at,
            "started_at": self.started_at,
            "finished_at": self.finished_at,
            "canceled_at": self.canceled_at,
            "total_items": self.total_items,
            "completed_items": self.completed_items,
            "meta": self.meta,
            "items": self.items.iter().map(ItemRecord::to_json).collect::<Vec<_>>(),
        })
    }
}

impl ItemRecord {
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "index": self.index,
            "status": self.status.as_str(),
            "payload": self.payload,
            "result": self.result,
            "started_at": self.started_at,
            "finished_at": self.finished_at,
        })
    }
}

/// Scope selector for the administrative purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeScope {
    /// Soft-delete queued/running tasks; their open items become canceled.
    Current,
    /// Hard-delete tasks already in a terminal state (items cascade).
    History,
    /// Hard-delete everything.
    All,
}

impl PurgeScope {
    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s {
            "current" => Ok(PurgeScope::Current),
            "history" => Ok(PurgeScope::History),
            "all" => Ok(PurgeScope::All),
            other => Err(ParseEnumError {
                kind: "purge scope",
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PurgeScope::Current => "current",
            PurgeScope::History => "history",
            PurgeScope::All => "all",
        }
    }
}

/// Row counts reported back from a purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub tasks_affected: u64,
    pub items_affected: u64,
}

impl PurgeOutcome {
    pub fn to_json(&self) -> Value {
        json!({
            "tasks_affected": self.tasks_affected,
            "items_affected": self.items_affected,
        })
    }
}

/// Severity for operator-visible log rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Stored uppercase, matching conventional log-level spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// A log row to append to `log_entries`.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub level: LogLevel,
    pub logger_name: String,
    pub message: String,
    pub module: Option<String>,
    pub function: Option<String>,
    pub exception: Option<String>,
}

impl NewLogEntry {
    pub fn new(level: LogLevel, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            logger_name: logger_name.into(),
            message: message.into(),
            module: None,
            function: None,
            exception: None,
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }
}
