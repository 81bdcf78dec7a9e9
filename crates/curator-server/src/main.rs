//! Curator server binary: wire the store, event bus, providers, worker, and
//! HTTP surface together, then run until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use curator_event_bus::EventBus;
use curator_http::{AppState, QueueHttpServer, ServerConfig};
use curator_providers::{ProviderFallbacks, SettingsProviderFactory};
use curator_queue::handlers::builtin_registry;
use curator_queue::{QueueService, QueueWorker};
use curator_store::{LogStore, MediaLibrary, QueueStore, SqliteStore, SqliteStoreConfig};

#[derive(Parser, Debug)]
#[command(name = "curator-server", about = "Media-library task-queue server")]
struct Args {
    /// Address to bind the HTTP API to.
    #[arg(long, default_value = "127.0.0.1:8000", env = "CURATOR_BIND")]
    bind: SocketAddr,

    /// SQLite database path.
    #[arg(long, default_value = "data/curator.db", env = "CURATOR_DATABASE")]
    database: PathBuf,

    /// Worker poll interval in seconds.
    #[arg(long, default_value_t = 2.0, env = "CURATOR_POLL_INTERVAL")]
    poll_interval: f64,

    /// Enable debug-only endpoints (purge, worker control, run-once).
    #[arg(long, env = "CURATOR_DEBUG")]
    debug: bool,

    /// Disable CORS headers.
    #[arg(long)]
    no_cors: bool,

    /// Do not start the worker automatically.
    #[arg(long)]
    no_worker: bool,

    // Provider fallbacks. The app_settings table takes precedence; these
    // cover fresh databases and containerized deployments.
    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
    tmdb_api_key: Option<String>,
    #[arg(long, env = "OMDB_API_KEY", hide_env_values = true)]
    omdb_api_key: Option<String>,
    #[arg(long, env = "PLEX_HOST")]
    plex_host: Option<String>,
    #[arg(long, env = "PLEX_TOKEN", hide_env_values = true)]
    plex_token: Option<String>,
    #[arg(long, env = "TAUTULLI_HOST")]
    tautulli_host: Option<String>,
    #[arg(long, env = "TAUTULLI_API_KEY", hide_env_values = true)]
    tautulli_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let store = Arc::new(
        SqliteStore::with_config(SqliteStoreConfig {
            database_path: args.database.clone(),
            ..SqliteStoreConfig::default()
        })
        .await
        .with_context(|| format!("opening database at {}", args.database.display()))?,
    );

    let bus = EventBus::new();
    let service = QueueService::new(
        Arc::clone(&store) as Arc<dyn QueueStore>,
        bus,
    );

    let factory = Arc::new(SettingsProviderFactory::new(
        Arc::clone(&store) as Arc<dyn MediaLibrary>,
        ProviderFallbacks {
            tmdb_api_key: args.tmdb_api_key.clone(),
            omdb_api_key: args.omdb_api_key.clone(),
            plex_host: args.plex_host.clone(),
            plex_token: args.plex_token.clone(),
            tautulli_host: args.tautulli_host.clone(),
            tautulli_api_key: args.tautulli_api_key.clone(),
        },
    ));
    let registry = builtin_registry(
        Arc::clone(&store) as Arc<dyn MediaLibrary>,
        Arc::clone(&store) as Arc<dyn LogStore>,
        factory,
    );

    let worker = QueueWorker::new(
        Arc::clone(&store) as Arc<dyn QueueStore>,
        Arc::clone(&store) as Arc<dyn LogStore>,
        service.clone(),
        Arc::new(registry),
    )
    .with_poll_interval(Duration::from_secs_f64(args.poll_interval));

    if args.no_worker {
        info!("worker autostart disabled");
    } else {
        worker.start();
    }

    let server = QueueHttpServer::new(
        ServerConfig {
            bind_address: args.bind,
            enable_cors: !args.no_cors,
            ..ServerConfig::default()
        },
        AppState {
            service,
            worker: worker.clone(),
            debug: args.debug,
        },
    );

    tokio::select! {
        result = server.run() => {
            result.context("HTTP server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
    }

    // Let the worker finish its current item before exiting.
    worker.stop().await;
    Ok(())
}
