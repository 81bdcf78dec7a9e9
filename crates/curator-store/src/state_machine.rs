//! Status transition rules.
//!
//! ```text
//! task:  queued -> running -> completed | failed
//!        queued | running -> canceled | deleted (cancel/purge)
//!        completed/failed/canceled/deleted are terminal
//!
//! item:  queued -> running -> completed | failed
//!        queued | running -> canceled
//!        completed/failed/canceled are terminal
//! ```

use curator_types::QueueStatus;

use crate::error::StoreError;

/// Validate a task status transition.
pub fn validate_task_transition(
    from: QueueStatus,
    to: QueueStatus,
) -> Result<(), StoreError> {
    if from.is_terminal_task() {
        return Err(StoreError::TerminalState(from));
    }
    let ok = match from {
        QueueStatus::Queued => matches!(
            to,
            QueueStatus::Running | QueueStatus::Canceled | QueueStatus::Deleted
        ),
        QueueStatus::Running => matches!(
            to,
            QueueStatus::Completed
                | QueueStatus::Failed
                | QueueStatus::Canceled
                | QueueStatus::Deleted
        ),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            current: from,
            requested: to,
        })
    }
}

/// Validate an item status transition. Items never become `deleted`.
pub fn validate_item_transition(
    from: QueueStatus,
    to: QueueStatus,
) -> Result<(), StoreError> {
    if from.is_terminal_item() {
        return Err(StoreError::TerminalState(from));
    }
    let ok = match from {
        QueueStatus::Queued => matches!(to, QueueStatus::Running | QueueStatus::Canceled),
        QueueStatus::Running => matches!(
            to,
            QueueStatus::Completed | QueueStatus::Failed | QueueStatus::Canceled
        ),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            current: from,
            requested: to,
        })
    }
}
