//! Handler contract and registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use curator_providers::ProviderError;
use curator_store::StoreError;
use curator_types::{ItemOutcome, TaskMeta, TaskType};

use crate::cancellation::CancellationHandle;

/// Per-invocation context handed to handlers.
#[derive(Clone)]
pub struct HandlerContext {
    pub task_id: i64,
    pub item_id: i64,
    pub item_index: i64,
    /// The owning task's metadata bag.
    pub meta: TaskMeta,
    /// Canceled when the task is canceled or deleted; observe at suspension
    /// points.
    pub cancellation: CancellationHandle,
}

/// Unexpected handler failure. Reaches the worker, which records it as the
/// item's `Failed` outcome and keeps going; it never aborts the task loop.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("invalid payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Per-task-type work: map one item payload to an outcome.
///
/// Handlers are expected to be idempotent against their external effects -
/// they re-query provider state and rewrite database columns, so re-running
/// an item converges.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: &HandlerContext,
        payload: &Value,
    ) -> Result<ItemOutcome, HandlerError>;
}

/// Maps task types to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(task_type.into(), handler);
    }

    pub fn get(&self, task_type: &TaskType) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type.as_str()).cloned()
    }

    pub fn contains(&self, task_type: &TaskType) -> bool {
        self.handlers.contains_key(task_type.as_str())
    }

    /// Registered type names, for diagnostics.
    pub fn registered_types(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}
