//! # Event Bus
//!
//! In-process pub/sub delivering task-change notifications to streaming
//! clients. Each subscriber owns an independent bounded buffer (capacity 10);
//! when a publish finds a full buffer the oldest message is dropped to make
//! room, so producers never block and a stalled reader only hurts itself.
//! Subscribers whose reader has gone away are removed at the next publish.
//!
//! Messages are pre-rendered SSE text blocks (`event:` + `data:` lines) so
//! the HTTP layer can forward them verbatim.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::debug;

/// Per-subscriber buffer capacity.
pub const SUBSCRIBER_BUFFER_SIZE: usize = 10;

/// A frame on the event stream.
#[derive(Debug, Clone)]
pub enum EventFrame {
    /// Initial snapshot: the current task list.
    Init(Value),
    /// Full task-list snapshot.
    Tasks(Value),
    /// One task changed; payload is the task snapshot with items.
    TaskUpdate(Value),
    /// Idle keep-alive.
    Ping,
}

impl EventFrame {
    pub fn event_name(&self) -> &'static str {
        match self {
            EventFrame::Init(_) => "init",
            EventFrame::Tasks(_) => "tasks",
            EventFrame::TaskUpdate(_) => "task_update",
            EventFrame::Ping => "ping",
        }
    }

    /// Render as an SSE message.
    pub fn format(&self) -> String {
        let data = match self {
            EventFrame::Init(v) | EventFrame::Tasks(v) | EventFrame::TaskUpdate(v) => {
                serde_json::to_string(v).unwrap_or_else(|_| "{}".to_string())
            }
            EventFrame::Ping => "{}".to_string(),
        };
        format!("event: {}\ndata: {}\n\n", self.event_name(), data)
    }
}

struct SubscriberQueue {
    buffer: Mutex<VecDeque<String>>,
    notify: Notify,
    closed: AtomicBool,
}

impl SubscriberQueue {
    fn new() -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(SUBSCRIBER_BUFFER_SIZE)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Drop-oldest enqueue.
    fn push(&self, message: String) {
        let mut buffer = self.buffer.lock();
        if buffer.len() >= SUBSCRIBER_BUFFER_SIZE {
            buffer.pop_front();
        }
        buffer.push_back(message);
        drop(buffer);
        self.notify.notify_one();
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }
}

struct BusInner {
    subscribers: Mutex<HashMap<u64, Arc<SubscriberQueue>>>,
    next_id: AtomicU64,
}

/// Handle to the shared bus. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a new subscriber. Dropping the returned subscription
    /// unsubscribes it.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(SubscriberQueue::new());
        self.inner.subscribers.lock().insert(id, Arc::clone(&queue));
        debug!(subscriber = id, "event subscriber registered");
        Subscription {
            id,
            queue,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscriber by id. Idempotent.
    pub fn unsubscribe(&self, id: u64) {
        if self.inner.subscribers.lock().remove(&id).is_some() {
            debug!(subscriber = id, "event subscriber removed");
        }
    }

    /// Fan a frame out to every live subscriber. Never blocks: full buffers
    /// drop their oldest message, dead subscribers are swept.
    pub fn publish(&self, frame: &EventFrame) {
        let message = frame.format();
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|id, queue| {
            if queue.closed.load(Ordering::Acquire) {
                debug!(subscriber = id, "dropping dead event subscriber");
                return false;
            }
            queue.push(message.clone());
            true
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscriber's receiving end.
pub struct Subscription {
    id: u64,
    queue: Arc<SubscriberQueue>,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pop the oldest buffered message without waiting.
    pub fn try_recv(&self) -> Option<String> {
        self.queue.buffer.lock().pop_front()
    }

    /// Wait for the next message.
    pub async fn recv(&self) -> String {
        loop {
            if let Some(message) = self.try_recv() {
                return message;
            }
            self.queue.notified().await;
        }
    }

    /// Number of currently buffered messages.
    pub fn buffered(&self) -> usize {
        self.queue.buffer.lock().len()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.closed.store(true, Ordering::Release);
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers.lock().remove(&self.id);
        }
    }
}
