//! The single background consumer.
//!
//! One worker drains the queue: claim the oldest queued task, walk its items
//! in index order, dispatch each to the registered handler, commit progress
//! after every step, and finalize. Cancellation is observed between items by
//! re-reading the task's status, and mid-item by a watcher that cancels the
//! handler's context; a canceled item's late outcome is dropped by the
//! store's guarded update.
//!
//! `Stop()` finishes the current item and exits before finalization; an
//! abrupt shutdown can leave a task in `running`. Nothing re-claims such a
//! task on restart; operators purge the `current` scope to recover.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use curator_store::{LogLevel, LogStore, NewLogEntry, QueueStore, TaskRecord, now_iso};
use curator_types::{ItemOutcome, QueueStatus};

use crate::cancellation::CancellationHandle;
use crate::error::QueueError;
use crate::handler::{HandlerContext, HandlerRegistry};
use crate::handlers::WORKER_LOGGER;
use crate::service::QueueService;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// How often the mid-item watcher re-reads the task status.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Diagnostics exposed on the worker debug endpoint.
#[derive(Debug, Clone, Default)]
pub struct WorkerDebugInfo {
    pub running: bool,
    pub last_processed_at: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct WorkerState {
    running: bool,
    last_processed_at: Option<String>,
    last_error: Option<String>,
}

struct WorkerInner {
    store: Arc<dyn QueueStore>,
    logs: Arc<dyn LogStore>,
    service: QueueService,
    registry: Arc<HandlerRegistry>,
    poll_interval: Duration,
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    state: Mutex<WorkerState>,
}

/// The queue's single consumer. Cheap to clone; all clones share one loop.
#[derive(Clone)]
pub struct QueueWorker {
    inner: Arc<WorkerInner>,
}

impl QueueWorker {
    pub fn new(
        store: Arc<dyn QueueStore>,
        logs: Arc<dyn LogStore>,
        service: QueueService,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(WorkerInner {
                store,
                logs,
                service,
                registry,
                poll_interval: DEFAULT_POLL_INTERVAL,
                stop_tx,
                handle: Mutex::new(None),
                state: Mutex::new(WorkerState::default()),
            }),
        }
    }

    /// Replace the poll interval. Call before `start()`.
    pub fn with_poll_interval(self, poll_interval: Duration) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(WorkerInner {
                store: Arc::clone(&self.inner.store),
                logs: Arc::clone(&self.inner.logs),
                service: self.inner.service.clone(),
                registry: Arc::clone(&self.inner.registry),
                poll_interval,
                stop_tx,
                handle: Mutex::new(None),
                state: Mutex::new(WorkerState::default()),
            }),
        }
    }

    /// Begin the polling loop. Idempotent while already running.
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        if state.running {
            debug!("queue worker already running");
            return;
        }
        state.running = true;
        drop(state);

        let _ = self.inner.stop_tx.send(false);
        let inner = Arc::clone(&self.inner);
        let stop_rx = self.inner.stop_tx.subscribe();
        let handle = tokio::spawn(async move {
            info!("queue worker started");
            run_loop(inner, stop_rx).await;
            info!("queue worker stopped");
        });
        *self.inner.handle.lock() = Some(handle);
    }

    /// Signal stop and wait for the loop to wind down. Idempotent.
    pub async fn stop(&self) {
        let handle = {
            let mut state = self.inner.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
            self.inner.handle.lock().take()
        };
        let _ = self.inner.stop_tx.send(true);
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(%err, "queue worker task join failed");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    pub fn debug_info(&self) -> WorkerDebugInfo {
        let state = self.inner.state.lock();
        WorkerDebugInfo {
            running: state.running,
            last_processed_at: state.last_processed_at.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Execute one loop iteration synchronously. Returns whether a task was
    /// processed. Exposed for tests and the debug run-once endpoint.
    pub async fn process_one(&self) -> Result<bool, QueueError> {
        process_one(&self.inner, None).await
    }
}

async fn run_loop(inner: Arc<WorkerInner>, mut stop_rx: watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow() {
            break;
        }
        match process_one(&inner, Some(&stop_rx)).await {
            Ok(true) => {}
            Ok(false) => sleep_or_stop(inner.poll_interval, &mut stop_rx).await,
            Err(err) => {
                error!(%err, "queue worker iteration failed");
                inner.state.lock().last_error = Some(err.to_string());
                sleep_or_stop(inner.poll_interval, &mut stop_rx).await;
            }
        }
    }
}

async fn sleep_or_stop(poll_interval: Duration, stop_rx: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(poll_interval) => {}
        _ = stop_rx.changed() => {}
    }
}

fn stop_requested(stop_rx: Option<&watch::Receiver<bool>>) -> bool {
    stop_rx.map(|rx| *rx.borrow()).unwrap_or(false)
}

/// One full claim-process-finalize cycle. Returns false when the queue was
/// empty.
async fn process_one(
    inner: &WorkerInner,
    stop_rx: Option<&watch::Receiver<bool>>,
) -> Result<bool, QueueError> {
    let Some(task) = inner.store.claim_next_queued().await? else {
        debug!("no queued tasks found");
        return Ok(false);
    };
    info!(
        task_id = task.id,
        task_type = %task.task_type,
        items = task.items.len(),
        "processing queue task"
    );
    inner.service.publish_task_update(task.id).await;

    let mut stopped_early = false;
    for item in &task.items {
        if stop_requested(stop_rx) {
            info!(task_id = task.id, "stop requested, leaving task mid-run");
            stopped_early = true;
            break;
        }

        // Re-read the task so a committed cancel is observed at the item
        // boundary.
        match inner.store.task_status(task.id).await? {
            Some(QueueStatus::Canceled) | Some(QueueStatus::Deleted) => {
                info!(task_id = task.id, item_id = item.id, "task canceled, stopping items");
                break;
            }
            Some(_) => {}
            None => break,
        }

        if item.status != QueueStatus::Queued {
            debug!(item_id = item.id, status = %item.status, "skipping non-queued item");
            continue;
        }
        if !inner.store.mark_item_running(item.id).await? {
            debug!(item_id = item.id, "item no longer claimable");
            continue;
        }
        inner.service.publish_task_update(task.id).await;

        let outcome = dispatch_item(inner, &task, item.id, item.index, item.payload.clone()).await;

        if let Some(outcome) = outcome {
            let applied = inner
                .store
                .record_item_outcome(item.id, outcome.status(), outcome.result())
                .await?;
            if applied {
                if outcome.counts_completed() {
                    inner.store.increment_completed_items(task.id).await?;
                } else {
                    record_item_failure(inner, task.id, item.id, &outcome).await;
                }
            }
        }
        inner.service.publish_task_update(task.id).await;
    }

    if !stopped_early {
        finalize_task(inner, task.id).await?;
    }
    inner.state.lock().last_processed_at = Some(now_iso());
    Ok(true)
}

/// Run the handler for one item, with mid-item cancellation. `None` means
/// the item was canceled while the handler was in flight; its outcome is
/// ignored.
async fn dispatch_item(
    inner: &WorkerInner,
    task: &TaskRecord,
    item_id: i64,
    item_index: i64,
    payload: Option<serde_json::Value>,
) -> Option<ItemOutcome> {
    let Some(handler) = inner.registry.get(&task.task_type) else {
        return Some(ItemOutcome::failed("unknown task type"));
    };

    let cancellation = CancellationHandle::new();
    let ctx = HandlerContext {
        task_id: task.id,
        item_id,
        item_index,
        meta: task.meta.clone().unwrap_or_default(),
        cancellation: cancellation.clone(),
    };
    let payload = payload.unwrap_or_else(|| json!({}));

    let watcher = spawn_cancel_watcher(
        Arc::clone(&inner.store),
        task.id,
        cancellation.clone(),
    );
    let result = tokio::select! {
        res = handler.handle(&ctx, &payload) => Some(res),
        _ = cancellation.cancelled() => None,
    };
    watcher.abort();

    match result {
        Some(Ok(outcome)) => Some(outcome),
        Some(Err(err)) => {
            error!(task_id = task.id, item_id, %err, "handler error");
            inner.state.lock().last_error = Some(err.to_string());
            Some(ItemOutcome::failed(err.to_string()))
        }
        None => {
            info!(task_id = task.id, item_id, "item canceled mid-flight");
            None
        }
    }
}

/// Cancels the handle once the task leaves the running state.
fn spawn_cancel_watcher(
    store: Arc<dyn QueueStore>,
    task_id: i64,
    cancellation: CancellationHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
            match store.task_status(task_id).await {
                Ok(Some(QueueStatus::Canceled)) | Ok(Some(QueueStatus::Deleted)) => {
                    cancellation.cancel();
                    return;
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => return,
            }
        }
    })
}

async fn record_item_failure(
    inner: &WorkerInner,
    task_id: i64,
    item_id: i64,
    outcome: &ItemOutcome,
) {
    if let ItemOutcome::Failed { error, .. } = outcome {
        inner.state.lock().last_error = Some(error.clone());
    }
    let message = format!(
        "Queue item {item_id} for task {task_id} failed: {}",
        outcome.result()
    );
    tracing::warn!("{message}");
    if let Err(err) = inner
        .logs
        .append_log(
            &NewLogEntry::new(LogLevel::Error, WORKER_LOGGER, message)
                .module("queue")
                .function("process_one"),
        )
        .await
    {
        error!(%err, "failed to persist item-failure log entry");
    }
}

/// Compute and commit the terminal task status. A task canceled or deleted
/// mid-run keeps that status.
async fn finalize_task(inner: &WorkerInner, task_id: i64) -> Result<(), QueueError> {
    match inner.store.task_status(task_id).await? {
        Some(QueueStatus::Running) => {}
        _ => return Ok(()),
    }

    let task = inner
        .store
        .get_task(task_id)
        .await?
        .ok_or(QueueError::NotFound(task_id))?;
    let failed_items: Vec<_> = task
        .items
        .iter()
        .filter(|i| i.status == QueueStatus::Failed)
        .collect();
    let final_status = if failed_items.is_empty() {
        QueueStatus::Completed
    } else {
        QueueStatus::Failed
    };
    inner.store.set_task_status(task_id, final_status).await?;
    info!(task_id, status = %final_status, "task finished");

    if !failed_items.is_empty() {
        let details = failed_items
            .iter()
            .map(|i| format!("item={} result={}", i.id, i.result.clone().unwrap_or(json!(null))))
            .collect::<Vec<_>>()
            .join(", ");
        let message = format!("Task {task_id} completed with FAILED items: {details}");
        tracing::warn!("{message}");
        if let Err(err) = inner
            .logs
            .append_log(
                &NewLogEntry::new(LogLevel::Error, WORKER_LOGGER, message)
                    .module("queue")
                    .function("process_one"),
            )
            .await
        {
            error!(%err, "failed to persist task-failure log entry");
        }
    }

    inner.service.publish_task_update(task_id).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use curator_event_bus::EventBus;
    use curator_store::SqliteStore;
    use curator_types::TaskMeta;
    use serde_json::{Value, json};

    use crate::handler::{HandlerError, TaskHandler};

    struct OkHandler;

    #[async_trait]
    impl TaskHandler for OkHandler {
        async fn handle(
            &self,
            _ctx: &HandlerContext,
            payload: &Value,
        ) -> Result<ItemOutcome, HandlerError> {
            Ok(ItemOutcome::Completed(json!({"echo": payload.clone()})))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl TaskHandler for FailingHandler {
        async fn handle(
            &self,
            _ctx: &HandlerContext,
            _payload: &Value,
        ) -> Result<ItemOutcome, HandlerError> {
            Ok(ItemOutcome::failed("boom"))
        }
    }

    struct SlowHandler(Duration);

    #[async_trait]
    impl TaskHandler for SlowHandler {
        async fn handle(
            &self,
            ctx: &HandlerContext,
            _payload: &Value,
        ) -> Result<ItemOutcome, HandlerError> {
            tokio::select! {
                _ = tokio::time::sleep(self.0) => {}
                _ = ctx.cancellation.cancelled() => {}
            }
            Ok(ItemOutcome::Completed(json!({"slept": true})))
        }
    }

    async fn fixture(registry: HandlerRegistry) -> (Arc<SqliteStore>, QueueService, QueueWorker) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let service = QueueService::new(
            Arc::clone(&store) as Arc<dyn QueueStore>,
            EventBus::new(),
        );
        let worker = QueueWorker::new(
            Arc::clone(&store) as Arc<dyn QueueStore>,
            Arc::clone(&store) as Arc<dyn LogStore>,
            service.clone(),
            Arc::new(registry),
        );
        (store, service, worker)
    }

    #[tokio::test]
    async fn empty_queue_processes_nothing() {
        let (_, _, worker) = fixture(HandlerRegistry::new()).await;
        assert!(!worker.process_one().await.unwrap());
    }

    #[tokio::test]
    async fn processes_items_in_order_and_completes() {
        let mut registry = HandlerRegistry::new();
        registry.register("scan", Arc::new(OkHandler));
        let (_, service, worker) = fixture(registry).await;

        let task = service
            .create_task(
                "scan",
                vec![json!({"path": "/a"}), json!({"path": "/b"}), json!({"path": "/c"})],
                None,
                None,
            )
            .await
            .unwrap();

        assert!(worker.process_one().await.unwrap());
        let task = service.get_task(task.id).await.unwrap();
        assert_eq!(task.status, QueueStatus::Completed);
        assert_eq!(task.completed_items, 3);
        assert!(task.finished_at.is_some());
        for window in task.items.windows(2) {
            // Items processed in ascending index order.
            assert!(window[0].started_at <= window[1].started_at);
            assert_eq!(window[0].status, QueueStatus::Completed);
        }
        let info = worker.debug_info();
        assert!(info.last_processed_at.is_some());
        assert!(info.last_error.is_none());
    }

    #[tokio::test]
    async fn mixed_failures_finalize_as_failed() {
        let mut registry = HandlerRegistry::new();
        registry.register("scan", Arc::new(OkHandler));
        registry.register("analyze", Arc::new(FailingHandler));
        let (store, service, worker) = fixture(registry).await;

        let ok_task = service
            .create_task("scan", vec![json!({})], None, None)
            .await
            .unwrap();
        let failing = service
            .create_task("analyze", vec![json!({}), json!({})], None, None)
            .await
            .unwrap();

        assert!(worker.process_one().await.unwrap());
        assert!(worker.process_one().await.unwrap());

        let ok_task = service.get_task(ok_task.id).await.unwrap();
        assert_eq!(ok_task.status, QueueStatus::Completed);

        let failing = service.get_task(failing.id).await.unwrap();
        assert_eq!(failing.status, QueueStatus::Failed);
        assert_eq!(failing.completed_items, 0);
        assert!(failing.items.iter().all(|i| i.status == QueueStatus::Failed));
        assert_eq!(worker.debug_info().last_error.as_deref(), Some("boom"));

        // Item failures are mirrored to the logs table.
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM log_entries WHERE level = 'ERROR' AND logger_name = 'QueueWorker'",
        )
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert!(count >= 3, "two item failures plus the task summary, got {count}");
    }

    #[tokio::test]
    async fn unknown_task_type_fails_per_item() {
        let (_, service, worker) = fixture(HandlerRegistry::new()).await;
        let task = service
            .create_task("defragment", vec![json!({})], None, None)
            .await
            .unwrap();
        assert!(worker.process_one().await.unwrap());
        let task = service.get_task(task.id).await.unwrap();
        assert_eq!(task.status, QueueStatus::Failed);
        assert_eq!(
            task.items[0].result,
            Some(json!({"error": "unknown task type"}))
        );
    }

    #[tokio::test]
    async fn cancel_mid_run_stops_remaining_items() {
        let mut registry = HandlerRegistry::new();
        registry.register("scan", Arc::new(SlowHandler(Duration::from_millis(500))));
        let (_, service, worker) = fixture(registry).await;

        let task = service
            .create_task(
                "scan",
                vec![json!({"path": "/one"}), json!({"path": "/two"})],
                None,
                None,
            )
            .await
            .unwrap();

        let runner = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.process_one().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        service.cancel_task(task.id).await.unwrap();
        runner.await.unwrap().unwrap();

        let task = service.get_task(task.id).await.unwrap();
        assert_eq!(task.status, QueueStatus::Deleted);
        // First item was in flight when the cancel landed; second never ran.
        assert!(matches!(
            task.items[0].status,
            QueueStatus::Canceled | QueueStatus::Completed
        ));
        assert_eq!(task.items[1].status, QueueStatus::Canceled);
        assert!(task.items[1].started_at.is_none());
    }

    #[tokio::test]
    async fn start_and_stop_lifecycle() {
        let mut registry = HandlerRegistry::new();
        registry.register("scan", Arc::new(OkHandler));
        let (_, service, worker) = fixture(registry).await;
        let worker = worker.with_poll_interval(Duration::from_millis(20));

        assert!(!worker.is_running());
        worker.start();
        worker.start(); // idempotent
        assert!(worker.is_running());

        let task = service
            .create_task("scan", vec![json!({})], None, None)
            .await
            .unwrap();
        // The loop should pick it up within a few poll intervals.
        let mut finished = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let task = service.get_task(task.id).await.unwrap();
            if task.status == QueueStatus::Completed {
                finished = true;
                break;
            }
        }
        assert!(finished, "worker loop did not process the task");

        worker.stop().await;
        worker.stop().await; // idempotent
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn meta_reaches_the_handler() {
        struct MetaProbe;

        #[async_trait]
        impl TaskHandler for MetaProbe {
            async fn handle(
                &self,
                ctx: &HandlerContext,
                _payload: &Value,
            ) -> Result<ItemOutcome, HandlerError> {
                Ok(ItemOutcome::Completed(
                    json!({"trigger": ctx.meta.trigger.clone()}),
                ))
            }
        }

        let mut registry = HandlerRegistry::new();
        registry.register("scan", Arc::new(MetaProbe));
        let (_, service, worker) = fixture(registry).await;

        let meta: TaskMeta =
            serde_json::from_value(json!({"trigger": "nightly"})).unwrap();
        let task = service
            .create_task("scan", vec![json!({})], Some(meta), None)
            .await
            .unwrap();
        worker.process_one().await.unwrap();
        let task = service.get_task(task.id).await.unwrap();
        assert_eq!(task.items[0].result, Some(json!({"trigger": "nightly"})));
    }
}
