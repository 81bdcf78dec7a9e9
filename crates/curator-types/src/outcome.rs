//! Handler outcomes.

use serde_json::{Value, json};

use crate::QueueStatus;

/// What a handler reports for one item.
///
/// `NoOp` is a successful termination that applied no external changes (for
/// example, no provider returned metadata). It counts as completed for the
/// task's aggregate counters; the distinction survives only in the stored
/// result JSON and in the operator log.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Completed(Value),
    NoOp(Value),
    Failed { error: String, result: Value },
}

impl ItemOutcome {
    /// Convenience constructor for failures where the result body is just
    /// the error message.
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        let result = json!({ "error": error });
        ItemOutcome::Failed { error, result }
    }

    /// The terminal item status this outcome maps to.
    pub fn status(&self) -> QueueStatus {
        match self {
            ItemOutcome::Completed(_) | ItemOutcome::NoOp(_) => QueueStatus::Completed,
            ItemOutcome::Failed { .. } => QueueStatus::Failed,
        }
    }

    /// Whether this outcome increments the task's `completed_items` counter.
    pub fn counts_completed(&self) -> bool {
        !matches!(self, ItemOutcome::Failed { .. })
    }

    /// The result JSON persisted on the item.
    pub fn result(&self) -> &Value {
        match self {
            ItemOutcome::Completed(v) | ItemOutcome::NoOp(v) => v,
            ItemOutcome::Failed { result, .. } => result,
        }
    }
}
