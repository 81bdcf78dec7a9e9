//! # HTTP Surface
//!
//! Thin adapter over [`curator_queue::QueueService`] and
//! [`curator_queue::QueueWorker`]: JSON endpoints for task CRUD, worker
//! control, administrative purge, and a `text/event-stream` endpoint
//! bridging the event bus to clients.
//!
//! Failure bodies follow the `{"detail": ...}` convention. Destructive and
//! worker-control operations are gated behind debug mode (403 otherwise);
//! the service itself performs them regardless; the gate is purely an HTTP
//! concern.

pub mod cors;
pub mod error;
pub mod router;
pub mod server;
pub mod sse;

pub use error::ApiError;
pub use router::{AppState, route};
pub use server::{QueueHttpServer, ServerConfig};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};

/// Response body type shared across the crate: supports both buffered JSON
/// responses and the streaming SSE body.
pub type BoxBody = http_body_util::combinators::UnsyncBoxBody<Bytes, hyper::Error>;

/// A buffered body.
pub fn full_body(bytes: impl Into<Bytes>) -> BoxBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}
