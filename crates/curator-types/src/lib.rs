//! # Shared Domain Types
//!
//! Common vocabulary for the curator task queue: task types, statuses, typed
//! item payloads, and handler outcomes.
//!
//! Payloads and results travel as JSON text through the store; the typed
//! variants here are the in-process representation, converted at the
//! persistence seam. Deserialization is contextual; the payload shape is
//! determined by the owning task's type, not by a tag field in the JSON.

pub mod outcome;
pub mod payload;
pub mod status;
pub mod task;

pub use outcome::ItemOutcome;
pub use payload::{
    AnalyzePayload, MediaType, RefreshPayload, RefreshTarget, ScanPayload, WatchHistoryPayload,
};
pub use status::QueueStatus;
pub use task::{ProviderChoice, TaskMeta, TaskType};

/// Error for string conversions of the closed enums in this crate.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}
