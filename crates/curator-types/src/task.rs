//! Task type and task-level metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of built-in task types, plus `Other` for forward
/// compatibility: unknown types are accepted at creation time and fail
/// per-item at execution when no handler is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskType {
    Scan,
    Analyze,
    RefreshMetadata,
    SyncWatchHistory,
    Other(String),
}

impl TaskType {
    pub fn as_str(&self) -> &str {
        match self {
            TaskType::Scan => "scan",
            TaskType::Analyze => "analyze",
            TaskType::RefreshMetadata => "refresh_metadata",
            TaskType::SyncWatchHistory => "sync_watch_history",
            TaskType::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "scan" => TaskType::Scan,
            "analyze" => TaskType::Analyze,
            "refresh_metadata" => TaskType::RefreshMetadata,
            "sync_watch_history" => TaskType::SyncWatchHistory,
            other => TaskType::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(TaskType::parse(&s))
    }
}

/// Forced metadata provider carried in task meta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
    Tmdb,
    Omdb,
}

/// Free-form task metadata bag.
///
/// The recognized keys are typed; anything else round-trips verbatim through
/// `extra` so callers can attach audit context without schema changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_ratings: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskMeta {
    pub fn include_ratings(&self) -> bool {
        self.include_ratings.unwrap_or(false)
    }
}
