//! # Queue Service and Worker
//!
//! The executable heart of the task queue:
//!
//! - [`QueueService`]: create/list/get/cancel/purge over the store,
//!   publishing every change to the event bus
//! - [`QueueWorker`]: the single background consumer: claims one queued
//!   task at a time, runs its items in order through the registered handler,
//!   observes cancellation at item boundaries (and propagates it into
//!   in-flight handler calls), and finalizes the task
//! - [`HandlerRegistry`]: task type → [`TaskHandler`]; the four built-in
//!   handlers cover directory scans, media analysis, metadata refresh, and
//!   watch-history sync
//!
//! Handler failures never escape the worker loop: each item's outcome is
//! recorded on the item and the loop moves on.

pub mod cancellation;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod matching;
pub mod service;
pub mod worker;

pub use cancellation::CancellationHandle;
pub use error::QueueError;
pub use handler::{HandlerContext, HandlerError, HandlerRegistry, TaskHandler};
pub use service::QueueService;
pub use worker::{QueueWorker, WorkerDebugInfo};
