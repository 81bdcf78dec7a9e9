//! End-to-end worker scenarios with stubbed providers: enqueue over a real
//! (in-memory) store, drive the worker, assert row/event outcomes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use curator_event_bus::EventBus;
use curator_providers::{
    DirectoryScanner, EpisodeMetadata, HistoryEntry, HistoryProvider, MediaProbe, MediaServer,
    MetadataSource, MovieMetadata, OmdbShow, PlexItem, ProbeReport, ProviderError,
    ProviderFactory, RatingsBundle, RatingsSource, ScannedEntry, SearchHit, ShowMetadata,
    TautulliHit,
};
use curator_queue::handlers::builtin_registry;
use curator_queue::{QueueService, QueueWorker};
use curator_store::{LogStore, MediaLibrary, MovieRecord, QueueStore, ShowRecord, SqliteStore};
use curator_types::{QueueStatus, TaskMeta};

// === Stub providers ===

#[derive(Default)]
struct StubMetadata {
    movie_hits: Vec<SearchHit>,
    movie_details: HashMap<i64, MovieMetadata>,
    show_hits: Vec<SearchHit>,
    show_details: HashMap<i64, ShowMetadata>,
    episodes: Vec<EpisodeMetadata>,
    calls: AtomicUsize,
}

impl StubMetadata {
    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for StubMetadata {
    async fn search_movies(
        &self,
        _query: &str,
        _year: Option<i32>,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.movie_hits.clone())
    }

    async fn movie_details(&self, id: i64) -> Result<Option<MovieMetadata>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.movie_details.get(&id).cloned())
    }

    async fn movie_by_imdb(&self, _imdb_id: &str) -> Result<Option<MovieMetadata>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn search_shows(
        &self,
        _query: &str,
        _year: Option<i32>,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.show_hits.clone())
    }

    async fn show_details(&self, id: i64) -> Result<Option<ShowMetadata>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.show_details.get(&id).cloned())
    }

    async fn season_episodes(
        &self,
        _show_id: i64,
        _season_number: i64,
    ) -> Result<Vec<EpisodeMetadata>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.episodes.clone())
    }
}

#[derive(Default)]
struct StubRatings {
    by_title: Option<RatingsBundle>,
    by_imdb: Option<RatingsBundle>,
}

#[async_trait]
impl RatingsSource for StubRatings {
    async fn ratings_by_imdb(
        &self,
        _imdb_id: &str,
    ) -> Result<Option<RatingsBundle>, ProviderError> {
        Ok(self.by_imdb)
    }

    async fn ratings_by_title(
        &self,
        _title: &str,
        _year: Option<i32>,
    ) -> Result<Option<RatingsBundle>, ProviderError> {
        Ok(self.by_title)
    }

    async fn show_by_imdb(&self, _imdb_id: &str) -> Result<Option<OmdbShow>, ProviderError> {
        Ok(None)
    }

    async fn search_show(
        &self,
        _title: &str,
        _year: Option<i32>,
    ) -> Result<Option<OmdbShow>, ProviderError> {
        Ok(None)
    }
}

#[derive(Default)]
struct StubPlex {
    imdb_key: Option<i64>,
    calls: AtomicUsize,
}

#[async_trait]
impl MediaServer for StubPlex {
    async fn search(&self, _query: &str) -> Result<Vec<PlexItem>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn rating_key_by_imdb(&self, _imdb_id: &str) -> Result<Option<i64>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.imdb_key)
    }
}

#[derive(Default)]
struct StubTautulli {
    history: Vec<HistoryEntry>,
}

#[async_trait]
impl HistoryProvider for StubTautulli {
    async fn history_for_key(
        &self,
        _rating_key: i64,
    ) -> Result<Vec<HistoryEntry>, ProviderError> {
        Ok(self.history.clone())
    }

    async fn search(&self, _query: &str) -> Result<Vec<TautulliHit>, ProviderError> {
        Ok(Vec::new())
    }

    async fn recent_history(&self, _length: u32) -> Result<Vec<HistoryEntry>, ProviderError> {
        Ok(Vec::new())
    }
}

struct StubProbe {
    result: Result<ProbeReport, String>,
}

#[async_trait]
impl MediaProbe for StubProbe {
    async fn probe(&self, _path: &Path) -> Result<ProbeReport, ProviderError> {
        self.result
            .clone()
            .map_err(ProviderError::Probe)
    }
}

struct StubScanner {
    found: usize,
    delay: Duration,
}

#[async_trait]
impl DirectoryScanner for StubScanner {
    async fn scan(
        &self,
        path: &Path,
        _media_type: curator_types::MediaType,
    ) -> Result<Vec<ScannedEntry>, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok((0..self.found)
            .map(|i| ScannedEntry {
                path: format!("{}/file-{i}.mkv", path.display()),
                title: format!("file-{i}"),
                year: None,
            })
            .collect())
    }
}

#[derive(Default)]
struct StubFactory {
    metadata: Option<Arc<StubMetadata>>,
    ratings: Option<Arc<StubRatings>>,
    plex: Option<Arc<StubPlex>>,
    tautulli: Option<Arc<StubTautulli>>,
    probe: Option<Arc<StubProbe>>,
    scanner: Option<Arc<StubScanner>>,
}

#[async_trait]
impl ProviderFactory for StubFactory {
    async fn metadata_source(
        &self,
    ) -> Result<Option<Arc<dyn MetadataSource>>, ProviderError> {
        Ok(self
            .metadata
            .clone()
            .map(|m| m as Arc<dyn MetadataSource>))
    }

    async fn ratings_source(&self) -> Result<Option<Arc<dyn RatingsSource>>, ProviderError> {
        Ok(self.ratings.clone().map(|r| r as Arc<dyn RatingsSource>))
    }

    async fn media_server(&self) -> Result<Option<Arc<dyn MediaServer>>, ProviderError> {
        Ok(self.plex.clone().map(|p| p as Arc<dyn MediaServer>))
    }

    async fn history_provider(
        &self,
    ) -> Result<Option<Arc<dyn HistoryProvider>>, ProviderError> {
        Ok(self
            .tautulli
            .clone()
            .map(|t| t as Arc<dyn HistoryProvider>))
    }

    fn media_probe(&self) -> Arc<dyn MediaProbe> {
        self.probe
            .clone()
            .map(|p| p as Arc<dyn MediaProbe>)
            .unwrap_or_else(|| {
                Arc::new(StubProbe {
                    result: Err("no probe stubbed".to_string()),
                })
            })
    }

    fn directory_scanner(&self) -> Arc<dyn DirectoryScanner> {
        self.scanner
            .clone()
            .map(|s| s as Arc<dyn DirectoryScanner>)
            .unwrap_or_else(|| {
                Arc::new(StubScanner {
                    found: 0,
                    delay: Duration::ZERO,
                })
            })
    }
}

async fn fixture(factory: StubFactory) -> (Arc<SqliteStore>, QueueService, QueueWorker) {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let service = QueueService::new(Arc::clone(&store) as Arc<dyn QueueStore>, EventBus::new());
    let registry = builtin_registry(
        Arc::clone(&store) as Arc<dyn MediaLibrary>,
        Arc::clone(&store) as Arc<dyn LogStore>,
        Arc::new(factory),
    );
    let worker = QueueWorker::new(
        Arc::clone(&store) as Arc<dyn QueueStore>,
        Arc::clone(&store) as Arc<dyn LogStore>,
        service.clone(),
        Arc::new(registry),
    );
    (store, service, worker)
}

async fn log_messages(store: &SqliteStore, level: &str) -> Vec<String> {
    sqlx::query_scalar("SELECT message FROM log_entries WHERE level = ? ORDER BY id")
        .bind(level)
        .fetch_all(store.pool())
        .await
        .unwrap()
}

// === Scenarios ===

#[tokio::test]
async fn scan_task_completes_with_found_count() {
    let (_, service, worker) = fixture(StubFactory {
        scanner: Some(Arc::new(StubScanner {
            found: 3,
            delay: Duration::ZERO,
        })),
        ..StubFactory::default()
    })
    .await;

    let task = service
        .create_task(
            "scan",
            vec![json!({"path": "/tmp/a", "media_type": "movie"})],
            None,
            None,
        )
        .await
        .unwrap();

    assert!(worker.process_one().await.unwrap());
    let task = service.get_task(task.id).await.unwrap();
    assert_eq!(task.status, QueueStatus::Completed);
    assert_eq!(task.completed_items, 1);
    assert_eq!(task.items[0].result, Some(json!({"found": 3})));
}

#[tokio::test]
async fn cancel_mid_scan_leaves_second_item_canceled() {
    let (_, service, worker) = fixture(StubFactory {
        scanner: Some(Arc::new(StubScanner {
            found: 0,
            delay: Duration::from_millis(500),
        })),
        ..StubFactory::default()
    })
    .await;

    let task = service
        .create_task(
            "scan",
            vec![
                json!({"path": "/tmp/one", "media_type": "movie"}),
                json!({"path": "/tmp/two", "media_type": "movie"}),
            ],
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
    assert!(matches!(
        task.items[0].status,
        QueueStatus::Completed | QueueStatus::Canceled
    ));
    assert_eq!(task.items[1].status, QueueStatus::Canceled);
}

#[tokio::test]
async fn refresh_movie_applies_tmdb_hit() {
    let metadata = Arc::new(StubMetadata {
        movie_hits: vec![SearchHit {
            id: 12345,
            title: "Test Movie".to_string(),
            year: Some(2023),
        }],
        movie_details: HashMap::from([(
            12345,
            MovieMetadata {
                tmdb_id: 12345,
                title: "Updated Title".to_string(),
                ..MovieMetadata::default()
            },
        )]),
        ..StubMetadata::default()
    });
    let (store, service, worker) = fixture(StubFactory {
        metadata: Some(metadata),
        ..StubFactory::default()
    })
    .await;

    let movie_id = store
        .insert_movie(&MovieRecord {
            title: Some("Test Movie".to_string()),
            year: Some(2023),
            ..MovieRecord::default()
        })
        .await
        .unwrap();

    let task = service
        .create_task(
            "refresh_metadata",
            vec![json!({"movie_id": movie_id})],
            None,
            None,
        )
        .await
        .unwrap();
    assert!(worker.process_one().await.unwrap());

    let task = service.get_task(task.id).await.unwrap();
    assert_eq!(task.status, QueueStatus::Completed);
    assert_eq!(task.items[0].result, Some(json!({"updated_from": "tmdb"})));

    let movie = store.get_movie(movie_id).await.unwrap().unwrap();
    assert_eq!(movie.tmdb_id, Some(12345));
    assert_eq!(movie.title.as_deref(), Some("Updated Title"));
    assert!(movie.scraped);
}

#[tokio::test]
async fn refresh_show_without_results_is_a_logged_noop() {
    let (store, service, worker) = fixture(StubFactory {
        metadata: Some(Arc::new(StubMetadata::default())),
        ..StubFactory::default()
    })
    .await;

    let show_id = store
        .insert_show(&ShowRecord {
            title: Some("Dummy Show".to_string()),
            ..ShowRecord::default()
        })
        .await
        .unwrap();

    let task = service
        .create_task(
            "refresh_metadata",
            vec![json!({"show_id": show_id})],
            None,
            None,
        )
        .await
        .unwrap();
    assert!(worker.process_one().await.unwrap());

    let task = service.get_task(task.id).await.unwrap();
    assert_eq!(task.status, QueueStatus::Completed);
    assert_eq!(task.items[0].status, QueueStatus::Completed);
    let result = task.items[0].result.clone().unwrap();
    assert!(
        result["note"]
            .as_str()
            .unwrap()
            .contains("no metadata found"),
        "result: {result}"
    );

    let info_logs = log_messages(&store, "INFO").await;
    assert!(
        info_logs.iter().any(|m| m.contains("Dummy Show")),
        "expected a no-result log naming the show, got: {info_logs:?}"
    );
}

#[tokio::test]
async fn refresh_movie_no_result_logs_queries_tried() {
    let (store, service, worker) = fixture(StubFactory {
        metadata: Some(Arc::new(StubMetadata::default())),
        ..StubFactory::default()
    })
    .await;

    let movie_id = store
        .insert_movie(&MovieRecord {
            title: Some("The Obscurity: A Film".to_string()),
            year: Some(1999),
            ..MovieRecord::default()
        })
        .await
        .unwrap();
    let task = service
        .create_task(
            "refresh_metadata",
            vec![json!({"movie_id": movie_id})],
            None,
            None,
        )
        .await
        .unwrap();
    worker.process_one().await.unwrap();

    let task = service.get_task(task.id).await.unwrap();
    assert_eq!(task.status, QueueStatus::Completed);
    // No provider had anything; still a successful no-op item.
    assert_eq!(task.completed_items, 1);

    let info_logs = log_messages(&store, "INFO").await;
    let log = info_logs
        .iter()
        .find(|m| m.contains("The Obscurity"))
        .expect("no-result log entry");
    assert!(log.contains("Tried:"), "log should name the queries: {log}");
}

#[tokio::test]
async fn forced_omdb_provider_never_touches_tmdb() {
    let metadata = Arc::new(StubMetadata::default());
    let (store, service, worker) = fixture(StubFactory {
        metadata: Some(Arc::clone(&metadata)),
        ratings: Some(Arc::new(StubRatings {
            by_title: Some(RatingsBundle {
                imdb_rating: Some(7.1),
                imdb_votes: Some(1000),
                rotten_tomatoes_score: Some(80),
                metacritic_score: None,
            }),
            by_imdb: None,
        })),
        ..StubFactory::default()
    })
    .await;

    let movie_id = store
        .insert_movie(&MovieRecord {
            title: Some("Side Channel".to_string()),
            year: Some(2020),
            ..MovieRecord::default()
        })
        .await
        .unwrap();

    let meta: TaskMeta = serde_json::from_value(json!({"provider": "omdb"})).unwrap();
    let task = service
        .create_task(
            "refresh_metadata",
            vec![json!({"movie_id": movie_id})],
            Some(meta),
            None,
        )
        .await
        .unwrap();
    worker.process_one().await.unwrap();

    assert_eq!(metadata.call_count(), 0, "TMDB must not be consulted");
    let task = service.get_task(task.id).await.unwrap();
    assert_eq!(task.items[0].result, Some(json!({"updated_from": "omdb"})));
    let movie = store.get_movie(movie_id).await.unwrap().unwrap();
    assert_eq!(movie.imdb_rating, Some(7.1));
    assert!(movie.scraped);
}

#[tokio::test]
async fn analyze_writes_probe_fields_and_flags() {
    let report = ProbeReport {
        container: Some("matroska".to_string()),
        video_codec: Some("HEVC".to_string()),
        video_width: Some(1920),
        video_height: Some(1080),
        video_resolution: Some("1920x1080".to_string()),
        audio_codec: Some("EAC3".to_string()),
        audio_channels: Some("5.1".to_string()),
        subtitle_count: 2,
        subtitle_languages: vec!["eng".to_string(), "ger".to_string()],
        ..ProbeReport::default()
    };
    let (store, service, worker) = fixture(StubFactory {
        probe: Some(Arc::new(StubProbe { result: Ok(report) })),
        ..StubFactory::default()
    })
    .await;

    let movie_id = store
        .insert_movie(&MovieRecord {
            title: Some("Probe Me".to_string()),
            file_path: Some("/media/films/probe-me.mkv".to_string()),
            ..MovieRecord::default()
        })
        .await
        .unwrap();

    let task = service
        .create_task("analyze", vec![json!({"movie_id": movie_id})], None, None)
        .await
        .unwrap();
    worker.process_one().await.unwrap();

    let task = service.get_task(task.id).await.unwrap();
    assert_eq!(task.status, QueueStatus::Completed);
    assert_eq!(task.items[0].result, Some(json!({"found": true})));

    let movie = store.get_movie(movie_id).await.unwrap().unwrap();
    assert!(movie.media_info_scanned);
    assert!(!movie.media_info_failed);
    assert_eq!(movie.video_codec.as_deref(), Some("HEVC"));
    assert_eq!(movie.subtitle_count, Some(2));
}

#[tokio::test]
async fn analyze_probe_failure_fails_item_and_logs_warning() {
    let (store, service, worker) = fixture(StubFactory {
        probe: Some(Arc::new(StubProbe {
            result: Err("moov atom not found".to_string()),
        })),
        ..StubFactory::default()
    })
    .await;

    let movie_id = store
        .insert_movie(&MovieRecord {
            title: Some("Corrupt".to_string()),
            file_path: Some("/media/films/corrupt.mkv".to_string()),
            ..MovieRecord::default()
        })
        .await
        .unwrap();

    let task = service
        .create_task("analyze", vec![json!({"movie_id": movie_id})], None, None)
        .await
        .unwrap();
    worker.process_one().await.unwrap();

    let task = service.get_task(task.id).await.unwrap();
    assert_eq!(task.status, QueueStatus::Failed);
    assert_eq!(task.completed_items, 0);

    let movie = store.get_movie(movie_id).await.unwrap().unwrap();
    assert!(movie.media_info_failed);

    let warnings = log_messages(&store, "WARNING").await;
    assert!(
        warnings
            .iter()
            .any(|m| m.contains(&format!("movie_id={movie_id}"))),
        "expected analyze warning, got: {warnings:?}"
    );
}

#[tokio::test]
async fn analyze_missing_file_path_fails_cleanly() {
    let (store, service, worker) = fixture(StubFactory::default()).await;
    let movie_id = store
        .insert_movie(&MovieRecord {
            title: Some("No File".to_string()),
            ..MovieRecord::default()
        })
        .await
        .unwrap();
    let task = service
        .create_task("analyze", vec![json!({"movie_id": movie_id})], None, None)
        .await
        .unwrap();
    worker.process_one().await.unwrap();
    let task = service.get_task(task.id).await.unwrap();
    assert_eq!(task.status, QueueStatus::Failed);
    let result = task.items[0].result.clone().unwrap();
    assert!(result["error"].as_str().unwrap().contains("file_path"));
}

#[tokio::test]
async fn watch_history_resolves_key_once_then_reuses_it() {
    let plex = Arc::new(StubPlex {
        imdb_key: Some(77),
        calls: AtomicUsize::new(0),
    });
    let tautulli = Arc::new(StubTautulli {
        history: vec![
            HistoryEntry {
                date: 1_700_000_000,
                user: Some("alice".to_string()),
                rating_key: Some(77),
                raw: json!({}),
            },
            HistoryEntry {
                date: 1_650_000_000,
                user: Some("bob".to_string()),
                rating_key: Some(77),
                raw: json!({}),
            },
        ],
    });
    let (store, service, worker) = fixture(StubFactory {
        plex: Some(Arc::clone(&plex)),
        tautulli: Some(tautulli),
        ..StubFactory::default()
    })
    .await;

    let movie_id = store
        .insert_movie(&MovieRecord {
            title: Some("Watched Often".to_string()),
            imdb_id: Some("tt0011223".to_string()),
            ..MovieRecord::default()
        })
        .await
        .unwrap();

    let task = service
        .create_task(
            "sync_watch_history",
            vec![json!({"movie_id": movie_id})],
            None,
            None,
        )
        .await
        .unwrap();
    worker.process_one().await.unwrap();

    let task = service.get_task(task.id).await.unwrap();
    assert_eq!(task.status, QueueStatus::Completed);
    assert_eq!(
        task.items[0].result,
        Some(json!({"watched": true, "watch_count": 2}))
    );

    let movie = store.get_movie(movie_id).await.unwrap().unwrap();
    assert_eq!(movie.rating_key, Some(77));
    assert!(movie.watched);
    assert_eq!(movie.watch_count, 2);
    assert_eq!(movie.last_watched_user.as_deref(), Some("alice"));
    assert!(movie.last_watched_date.as_deref().unwrap().starts_with("2023-11-14"));
    let first_run_calls = plex.calls.load(Ordering::SeqCst);
    assert!(first_run_calls >= 1);

    // Second run: the stored rating key skips the lookup chain entirely.
    service
        .create_task(
            "sync_watch_history",
            vec![json!({"movie_id": movie_id})],
            None,
            None,
        )
        .await
        .unwrap();
    worker.process_one().await.unwrap();
    assert_eq!(plex.calls.load(Ordering::SeqCst), first_run_calls);
}

#[tokio::test]
async fn watch_history_empty_clears_fields() {
    let (store, service, worker) = fixture(StubFactory {
        plex: Some(Arc::new(StubPlex {
            imdb_key: Some(5),
            calls: AtomicUsize::new(0),
        })),
        tautulli: Some(Arc::new(StubTautulli { history: vec![] })),
        ..StubFactory::default()
    })
    .await;

    let movie_id = store
        .insert_movie(&MovieRecord {
            title: Some("Never Watched".to_string()),
            imdb_id: Some("tt0099999".to_string()),
            watched: true,
            watch_count: 4,
            ..MovieRecord::default()
        })
        .await
        .unwrap();

    let task = service
        .create_task(
            "sync_watch_history",
            vec![json!({"movie_id": movie_id})],
            None,
            None,
        )
        .await
        .unwrap();
    worker.process_one().await.unwrap();

    let task = service.get_task(task.id).await.unwrap();
    assert_eq!(task.items[0].result, Some(json!({"watched": false})));
    let movie = store.get_movie(movie_id).await.unwrap().unwrap();
    assert!(!movie.watched);
    assert_eq!(movie.watch_count, 0);
    assert_eq!(movie.last_watched_date, None);
}

#[tokio::test]
async fn watch_history_without_tautulli_fails_item() {
    let (store, service, worker) = fixture(StubFactory::default()).await;
    let movie_id = store
        .insert_movie(&MovieRecord {
            title: Some("Lonely".to_string()),
            ..MovieRecord::default()
        })
        .await
        .unwrap();
    let task = service
        .create_task(
            "sync_watch_history",
            vec![json!({"movie_id": movie_id})],
            None,
            None,
        )
        .await
        .unwrap();
    worker.process_one().await.unwrap();
    let task = service.get_task(task.id).await.unwrap();
    assert_eq!(task.status, QueueStatus::Failed);
    assert_eq!(
        task.items[0].result,
        Some(json!({"error": "tautulli not configured"}))
    );
}

#[tokio::test]
async fn events_stream_task_updates_and_bound_slow_subscribers() {
    let (_, service, worker) = fixture(StubFactory {
        scanner: Some(Arc::new(StubScanner {
            found: 1,
            delay: Duration::ZERO,
        })),
        ..StubFactory::default()
    })
    .await;

    let live = service.subscribe_events();
    let stalled = service.subscribe_events();

    let task = service
        .create_task("scan", vec![json!({"path": "/tmp/x"})], None, None)
        .await
        .unwrap();
    let first = live.recv().await;
    assert!(first.starts_with("event: task_update\n"));
    assert!(first.contains(&format!("\"id\":{}", task.id)));

    // Drive plenty of updates; the stalled subscriber keeps only the ten
    // most recent messages.
    worker.process_one().await.unwrap();
    for _ in 0..20 {
        service.publish_task_update(task.id).await;
    }
    assert_eq!(stalled.buffered(), 10);
}

#[tokio::test]
async fn purge_all_removes_seeded_queued_and_completed_tasks() {
    let (_, service, worker) = fixture(StubFactory {
        scanner: Some(Arc::new(StubScanner {
            found: 0,
            delay: Duration::ZERO,
        })),
        ..StubFactory::default()
    })
    .await;

    let done = service
        .create_task("scan", vec![json!({"path": "/tmp/a"})], None, None)
        .await
        .unwrap();
    worker.process_one().await.unwrap();
    service
        .create_task("scan", vec![json!({"path": "/tmp/b"})], None, None)
        .await
        .unwrap();

    let done = service.get_task(done.id).await.unwrap();
    assert_eq!(done.status, QueueStatus::Completed);

    let outcome = service.purge_tasks("all", None).await.unwrap();
    assert_eq!(outcome.tasks_affected, 2);
    assert_eq!(outcome.items_affected, 2);
    assert!(service.list_tasks(None).await.unwrap().is_empty());
}
