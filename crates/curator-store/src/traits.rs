//! Store traits consumed by the queue service, the worker, and the handlers.
//!
//! Implementations must be `Send + Sync`. The SQLite backend implements all
//! three on one type; tests inject the same backend on an in-memory database
//! rather than mocking these traits.

use async_trait::async_trait;
use serde_json::Value;

use curator_types::{QueueStatus, TaskMeta, TaskType};

use crate::error::StoreError;
use crate::library::{EpisodeRecord, MovieRecord, ShowRecord};
use crate::records::{NewLogEntry, PurgeOutcome, PurgeScope, TaskRecord};

/// Task/item lifecycle operations.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert a task and its items in one transaction. Items are stored in
    /// the caller's order with status `queued`; `total_items` is fixed at
    /// insertion. Returns the task with items preloaded.
    async fn create_task(
        &self,
        task_type: &TaskType,
        payloads: &[Value],
        meta: Option<&TaskMeta>,
        created_by: Option<&str>,
    ) -> Result<TaskRecord, StoreError>;

    /// Atomically claim the oldest `queued` task: set `started_at`,
    /// transition to `running`, return it with items preloaded. Returns
    /// `None` when the queue is empty. Concurrent callers receive disjoint
    /// tasks.
    async fn claim_next_queued(&self) -> Result<Option<TaskRecord>, StoreError>;

    /// Fetch one task with its items (sorted by index ascending).
    async fn get_task(&self, task_id: i64) -> Result<Option<TaskRecord>, StoreError>;

    /// Current status only; the worker re-reads this between items so
    /// cancellation is observed at item boundaries.
    async fn task_status(&self, task_id: i64) -> Result<Option<QueueStatus>, StoreError>;

    /// List tasks ordered by `created_at` descending, items omitted.
    async fn list_tasks(&self, limit: u32) -> Result<Vec<TaskRecord>, StoreError>;

    /// Transition an item to `running` and stamp `started_at`.
    ///
    /// Guarded: succeeds only while the item is `queued` and its task is
    /// `running`, so a committed cancel can never be followed by an item
    /// entering `running`. Returns whether the transition was applied.
    async fn mark_item_running(&self, item_id: i64) -> Result<bool, StoreError>;

    /// Record an item's terminal outcome (status, result, `finished_at`).
    ///
    /// Guarded: applies only while the item is still `running`; an item
    /// already marked `canceled` keeps that status and the late outcome is
    /// dropped. Returns whether the update was applied.
    async fn record_item_outcome(
        &self,
        item_id: i64,
        status: QueueStatus,
        result: &Value,
    ) -> Result<bool, StoreError>;

    /// Bump `completed_items` by one.
    async fn increment_completed_items(&self, task_id: i64) -> Result<(), StoreError>;

    /// Set a task's status with state-machine validation, stamping
    /// `finished_at` when the new status is terminal.
    async fn set_task_status(
        &self,
        task_id: i64,
        status: QueueStatus,
    ) -> Result<(), StoreError>;

    /// Cancel a task: status becomes `deleted`, `canceled_at` is stamped,
    /// queued/running items become `canceled`. Accepted silently for tasks
    /// already terminal. Returns `None` if the task does not exist.
    async fn cancel_task(&self, task_id: i64) -> Result<Option<TaskRecord>, StoreError>;

    /// Scoped purge; see [`PurgeScope`]. `older_than_seconds` narrows the
    /// `current` scope to tasks whose `started_at` (or `created_at` when
    /// never started) is older than the cutoff.
    async fn purge_tasks(
        &self,
        scope: PurgeScope,
        older_than_seconds: Option<i64>,
    ) -> Result<PurgeOutcome, StoreError>;
}

/// The media-library slice the handlers read and write, plus settings.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    async fn get_movie(&self, id: i64) -> Result<Option<MovieRecord>, StoreError>;
    async fn update_movie(&self, movie: &MovieRecord) -> Result<(), StoreError>;
    async fn insert_movie(&self, movie: &MovieRecord) -> Result<i64, StoreError>;

    async fn get_show(&self, id: i64) -> Result<Option<ShowRecord>, StoreError>;
    async fn update_show(&self, show: &ShowRecord) -> Result<(), StoreError>;
    async fn insert_show(&self, show: &ShowRecord) -> Result<i64, StoreError>;

    async fn get_episode(&self, id: i64) -> Result<Option<EpisodeRecord>, StoreError>;
    async fn update_episode(&self, episode: &EpisodeRecord) -> Result<(), StoreError>;
    async fn insert_episode(&self, episode: &EpisodeRecord) -> Result<i64, StoreError>;

    /// Read one `app_settings` value.
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Upsert one `app_settings` value.
    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Operator-visible log sink backed by the `log_entries` table.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append_log(&self, entry: &NewLogEntry) -> Result<(), StoreError>;
}
