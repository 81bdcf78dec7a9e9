//! Built-in task handlers.

pub mod analyze;
pub mod refresh;
pub mod scan;
pub mod watch_history;

use std::sync::Arc;

use curator_providers::ProviderFactory;
use curator_store::{LogStore, MediaLibrary};

use crate::handler::HandlerRegistry;

pub use analyze::AnalyzeHandler;
pub use refresh::RefreshMetadataHandler;
pub use scan::ScanHandler;
pub use watch_history::WatchHistoryHandler;

/// Logger name used for operator-visible rows written by the worker and its
/// handlers.
pub const WORKER_LOGGER: &str = "QueueWorker";

/// Registry with the four built-in handlers registered.
pub fn builtin_registry(
    library: Arc<dyn MediaLibrary>,
    logs: Arc<dyn LogStore>,
    providers: Arc<dyn ProviderFactory>,
) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register("scan", Arc::new(ScanHandler::new(Arc::clone(&providers))));
    registry.register(
        "analyze",
        Arc::new(AnalyzeHandler::new(
            Arc::clone(&library),
            Arc::clone(&logs),
            Arc::clone(&providers),
        )),
    );
    registry.register(
        "refresh_metadata",
        Arc::new(RefreshMetadataHandler::new(
            Arc::clone(&library),
            Arc::clone(&logs),
            Arc::clone(&providers),
        )),
    );
    registry.register(
        "sync_watch_history",
        Arc::new(WatchHistoryHandler::new(library, logs, providers)),
    );
    registry
}
