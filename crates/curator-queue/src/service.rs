//! Queue service: the store + event-bus composition the HTTP surface calls.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use curator_event_bus::{EventBus, EventFrame, Subscription};
use curator_store::{PurgeOutcome, PurgeScope, QueueStore, TaskRecord};
use curator_types::{TaskMeta, TaskType};

use crate::error::QueueError;

pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// Create/list/get/cancel/purge over the store; every change is published to
/// the event bus.
#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn QueueStore>,
    bus: EventBus,
}

impl QueueService {
    pub fn new(store: Arc<dyn QueueStore>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Create a task with its items. Unknown task types are accepted; they
    /// stay forward-compatible and fail per-item at execution time.
    pub async fn create_task(
        &self,
        task_type: &str,
        items: Vec<Value>,
        meta: Option<TaskMeta>,
        created_by: Option<String>,
    ) -> Result<TaskRecord, QueueError> {
        if task_type.is_empty() {
            return Err(QueueError::InvalidInput("type is required".to_string()));
        }
        let task_type = TaskType::parse(task_type);
        let task = self
            .store
            .create_task(&task_type, &items, meta.as_ref(), created_by.as_deref())
            .await?;
        self.publish_task_update(task.id).await;
        Ok(task)
    }

    pub async fn list_tasks(&self, limit: Option<u32>) -> Result<Vec<TaskRecord>, QueueError> {
        Ok(self
            .store
            .list_tasks(limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .await?)
    }

    pub async fn get_task(&self, task_id: i64) -> Result<TaskRecord, QueueError> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or(QueueError::NotFound(task_id))
    }

    pub async fn cancel_task(&self, task_id: i64) -> Result<TaskRecord, QueueError> {
        let task = self
            .store
            .cancel_task(task_id)
            .await?
            .ok_or(QueueError::NotFound(task_id))?;
        self.publish_task_update(task_id).await;
        Ok(task)
    }

    /// Scoped purge. Scope validation happens here; the debug-mode gate is
    /// the HTTP layer's concern.
    pub async fn purge_tasks(
        &self,
        scope: &str,
        older_than_seconds: Option<i64>,
    ) -> Result<PurgeOutcome, QueueError> {
        let scope = PurgeScope::parse(scope)
            .map_err(|e| QueueError::InvalidInput(e.to_string()))?;
        let outcome = self.store.purge_tasks(scope, older_than_seconds).await?;
        info!(
            scope = scope.as_str(),
            tasks = outcome.tasks_affected,
            items = outcome.items_affected,
            "purge finished"
        );
        self.publish_task_list().await;
        Ok(outcome)
    }

    /// Register an event-stream subscriber.
    pub fn subscribe_events(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Serialize the task's current snapshot and fan it out. Publish
    /// failures only log; producers never fail on the bus.
    pub async fn publish_task_update(&self, task_id: i64) {
        match self.store.get_task(task_id).await {
            Ok(Some(task)) => self.bus.publish(&EventFrame::TaskUpdate(task.to_json())),
            Ok(None) => {}
            Err(err) => error!(task_id, %err, "failed to publish task update"),
        }
    }

    /// Serialize the current list snapshot and fan it out.
    pub async fn publish_task_list(&self) {
        match self.store.list_tasks(DEFAULT_LIST_LIMIT).await {
            Ok(tasks) => {
                let list: Vec<Value> = tasks.iter().map(TaskRecord::to_json).collect();
                self.bus.publish(&EventFrame::Tasks(Value::Array(list)));
            }
            Err(err) => error!(%err, "failed to publish task list"),
        }
    }
}
