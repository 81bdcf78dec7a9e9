//! The `text/event-stream` bridge.
//!
//! On connect the client receives `event: init` with the current task list,
//! then every bus frame as it arrives, with `event: ping` after 15 s of
//! idle. The pump stops (and the bus subscription drops, unsubscribing)
//! as soon as the client goes away.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, StreamBody};
use hyper::Response;
use serde_json::Value;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use curator_event_bus::EventFrame;
use curator_queue::QueueService;
use curator_store::TaskRecord;

use crate::BoxBody;

const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Build the streaming response and spawn its pump task.
pub fn stream_response(service: QueueService) -> Response<BoxBody> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Result<Bytes, hyper::Error>>();
    let body_stream =
        UnboundedReceiverStream::new(rx).map(|item| item.map(http_body::Frame::data));
    let body = StreamBody::new(body_stream).boxed_unsync();

    tokio::spawn(async move {
        let subscription = service.subscribe_events();
        debug!(subscriber = subscription.id(), "event-stream client connected");

        let initial = match service.list_tasks(None).await {
            Ok(tasks) => {
                let list: Vec<Value> = tasks.iter().map(TaskRecord::to_json).collect();
                EventFrame::Init(Value::Array(list)).format()
            }
            Err(err) => {
                debug!(%err, "failed to build init snapshot");
                EventFrame::Init(Value::Array(Vec::new())).format()
            }
        };
        if tx.send(Ok(Bytes::from(initial))).is_err() {
            return;
        }

        loop {
            let message = tokio::select! {
                message = subscription.recv() => message,
                _ = tokio::time::sleep(PING_INTERVAL) => EventFrame::Ping.format(),
            };
            if tx.send(Ok(Bytes::from(message))).is_err() {
                // Client disconnected; dropping the subscription
                // unsubscribes it from the bus.
                debug!(subscriber = subscription.id(), "event-stream client disconnected");
                return;
            }
        }
    });

    Response::builder()
        .header(hyper::header::CONTENT_TYPE, "text/event-stream")
        .header(hyper::header::CACHE_CONTROL, "no-cache")
        .header(hyper::header::CONNECTION, "keep-alive")
        .body(body)
        .unwrap_or_else(|_| Response::new(crate::full_body("")))
}
