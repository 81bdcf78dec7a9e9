//! SQLite store backend.
//!
//! Single-writer friendly: all mutations are short transactions or single
//! guarded statements, so HTTP handlers and the worker can share the pool
//! without application-level locking.

use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use curator_types::{QueueStatus, TaskMeta, TaskType};

use crate::error::StoreError;
use crate::library::{EpisodeRecord, MovieRecord, ShowRecord};
use crate::migrate::MigrationRunner;
use crate::now_iso;
use crate::records::{ItemRecord, NewLogEntry, PurgeOutcome, PurgeScope, TaskRecord};
use crate::state_machine;
use crate::traits::{LogStore, MediaLibrary, QueueStore};

/// Configuration for the SQLite store.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Database file path (`:memory:` for a private in-memory database).
    pub database_path: PathBuf,
    /// Maximum number of pool connections.
    pub max_connections: u32,
    /// Create the database file if it does not exist.
    pub create_if_missing: bool,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/curator.db"),
            max_connections: 10,
            create_if_missing: true,
        }
    }
}

/// SQLite-backed implementation of [`QueueStore`], [`MediaLibrary`], and
/// [`LogStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

fn row_to_task(row: &SqliteRow) -> Result<TaskRecord, StoreError> {
    let status_str: String = row.get("status");
    let type_str: String = row.get("type");
    let meta: Option<TaskMeta> = match row.get::<Option<String>, _>("meta") {
        Some(raw) => Some(serde_json::from_str(&raw)?),
        None => None,
    };
    Ok(TaskRecord {
        id: row.get("id"),
        task_type: TaskType::parse(&type_str),
        status: QueueStatus::parse(&status_str)?,
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
        canceled_at: row.get("canceled_at"),
        total_items: row.get("total_items"),
        completed_items: row.get("completed_items"),
        meta,
        items: Vec::new(),
    })
}

fn row_to_item(row: &SqliteRow) -> Result<ItemRecord, StoreError> {
    let status_str: String = row.get("status");
    let payload: Option<Value> = match row.get::<Option<String>, _>("payload") {
        Some(raw) => Some(serde_json::from_str(&raw)?),
        None => None,
    };
    let result: Option<Value> = match row.get::<Option<String>, _>("result") {
        Some(raw) => Some(serde_json::from_str(&raw)?),
        None => None,
    };
    Ok(ItemRecord {
        id: row.get("id"),
        task_id: row.get("task_id"),
        index: row.get("index"),
        status: QueueStatus::parse(&status_str)?,
        payload,
        result,
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
    })
}

const TASK_COLUMNS: &str = "id, type, status, created_by, created_at, started_at, \
                            finished_at, canceled_at, total_items, completed_items, meta";
const ITEM_COLUMNS: &str = "id, task_id, \"index\", status, payload, result, started_at, \
                            finished_at";

impl SqliteStore {
    /// Open (or create) the configured database and run migrations.
    pub async fn with_config(config: SqliteStoreConfig) -> Result<Self, StoreError> {
        info!("opening sqlite store at {:?}", config.database_path);

        let db_path_str = config.database_path.to_string_lossy();
        let is_memory = db_path_str == ":memory:";

        if !is_memory {
            if let Some(parent) = config.database_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!("failed to create database directory: {e}"))
                })?;
            }
        }

        let options = if is_memory {
            // Unique name + shared cache so every pool connection sees the
            // same in-memory database instance.
            let uri = format!("file:{}?mode=memory&cache=shared", uuid::Uuid::now_v7());
            SqliteConnectOptions::from_str(&uri)
                .map_err(|e| StoreError::Database(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(config.create_if_missing)
        }
        .foreign_keys(true);

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        MigrationRunner::new(&store.pool).run().await?;
        Ok(store)
    }

    /// A fresh private in-memory store; used by tests and `run-once` demos.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::with_config(SqliteStoreConfig {
            database_path: ":memory:".into(),
            ..SqliteStoreConfig::default()
        })
        .await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn items_for_task(&self, task_id: i64) -> Result<Vec<ItemRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM queue_items WHERE task_id = ? ORDER BY \"index\" ASC"
        ))
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_item).collect()
    }
}

#[async_trait]
impl QueueStore for SqliteStore {
    async fn create_task(
        &self,
        task_type: &TaskType,
        payloads: &[Value],
        meta: Option<&TaskMeta>,
        created_by: Option<&str>,
    ) -> Result<TaskRecord, StoreError> {
        let now = now_iso();
        let meta_json = meta.map(serde_json::to_string).transpose()?;

        let mut tx = self.pool.begin().await?;
        let task_id = sqlx::query(
            r#"
            INSERT INTO queue_tasks (type, status, created_by, created_at,
                                     total_items, completed_items, meta)
            VALUES (?, 'queued', ?, ?, ?, 0, ?)
            "#,
        )
        .bind(task_type.as_str())
        .bind(created_by)
        .bind(&now)
        .bind(payloads.len() as i64)
        .bind(&meta_json)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (index, payload) in payloads.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO queue_items (task_id, "index", status, payload)
                VALUES (?, ?, 'queued', ?)
                "#,
            )
            .bind(task_id)
            .bind(index as i64)
            .bind(serde_json::to_string(payload)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(task_id, task_type = %task_type, items = payloads.len(), "created queue task");
        self.get_task(task_id)
            .await?
            .ok_or(StoreError::TaskNotFound(task_id))
    }

    async fn claim_next_queued(&self) -> Result<Option<TaskRecord>, StoreError> {
        let now = now_iso();
        let claimed: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE queue_tasks
            SET status = 'running', started_at = ?
            WHERE id = (
                SELECT id FROM queue_tasks
                WHERE status = 'queued'
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING id
            "#,
        )
        .bind(&now)
        .fetch_optional(&self.pool)
        .await?;

        match claimed {
            Some(task_id) => {
                debug!(task_id, "claimed queued task");
                self.get_task(task_id).await
            }
            None => Ok(None),
        }
    }

    async fn get_task(&self, task_id: i64) -> Result<Option<TaskRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM queue_tasks WHERE id = ?"
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut task = row_to_task(&row)?;
                task.items = self.items_for_task(task_id).await?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn task_status(&self, task_id: i64) -> Result<Option<QueueStatus>, StoreError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM queue_tasks WHERE id = ?")
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await?;
        status.map(|s| QueueStatus::parse(&s).map_err(Into::into)).transpose()
    }

    async fn list_tasks(&self, limit: u32) -> Result<Vec<TaskRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM queue_tasks ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_task).collect()
    }

    async fn mark_item_running(&self, item_id: i64) -> Result<bool, StoreError> {
        // The task-status subquery makes the cancellation boundary atomic: a
        // committed cancel flips the task out of 'running', after which no
        // item can enter 'running'.
        let affected = sqlx::query(
            r#"
            UPDATE queue_items
            SET status = 'running', started_at = ?
            WHERE id = ?
              AND status = 'queued'
              AND (SELECT status FROM queue_tasks WHERE id = queue_items.task_id) = 'running'
            "#,
        )
        .bind(now_iso())
        .bind(item_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn record_item_outcome(
        &self,
        item_id: i64,
        status: QueueStatus,
        result: &Value,
    ) -> Result<bool, StoreError> {
        state_machine::validate_item_transition(QueueStatus::Running, status)?;
        let affected = sqlx::query(
            r#"
            UPDATE queue_items
            SET status = ?, result = ?, finished_at = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(status.as_str())
        .bind(serde_json::to_string(result)?)
        .bind(now_iso())
        .bind(item_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn increment_completed_items(&self, task_id: i64) -> Result<(), StoreError> {
        let affected =
            sqlx::query("UPDATE queue_tasks SET completed_items = completed_items + 1 WHERE id = ?")
                .bind(task_id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        if affected == 0 {
            return Err(StoreError::TaskNotFound(task_id));
        }
        Ok(())
    }

    async fn set_task_status(
        &self,
        task_id: i64,
        status: QueueStatus,
    ) -> Result<(), StoreError> {
        let current = self
            .task_status(task_id)
            .await?
            .ok_or(StoreError::TaskNotFound(task_id))?;
        state_machine::validate_task_transition(current, status)?;

        if status.is_terminal_task() {
            sqlx::query("UPDATE queue_tasks SET status = ?, finished_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(now_iso())
                .bind(task_id)
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query("UPDATE queue_tasks SET status = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(task_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn cancel_task(&self, task_id: i64) -> Result<Option<TaskRecord>, StoreError> {
        let Some(current) = self.task_status(task_id).await? else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        // Canceling an already-terminal task is accepted silently; the
        // status is left alone and no items can still be open.
        if !current.is_terminal_task() {
            sqlx::query(
                "UPDATE queue_tasks SET status = 'deleted', canceled_at = ? WHERE id = ?",
            )
            .bind(now_iso())
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        }
        let items_canceled = sqlx::query(
            r#"
            UPDATE queue_items SET status = 'canceled'
            WHERE task_id = ? AND status IN ('queued', 'running')
            "#,
        )
        .bind(task_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tx.commit().await?;

        info!(task_id, items_canceled, "canceled task");
        self.get_task(task_id).await
    }

    async fn purge_tasks(
        &self,
        scope: PurgeScope,
        older_than_seconds: Option<i64>,
    ) -> Result<PurgeOutcome, StoreError> {
        let mut outcome = PurgeOutcome::default();

        if matches!(scope, PurgeScope::Current) {
            // Soft-delete open tasks, cancel their open items.
            let mut where_clause =
                String::from("status IN ('queued', 'running')");
            if older_than_seconds.is_some() {
                // Compare started_at when the task ran, created_at otherwise.
                where_clause.push_str(
                    " AND ((started_at IS NOT NULL AND julianday(?1) - julianday(started_at) > ?2 / 86400.0) \
                     OR (started_at IS NULL AND julianday(?1) - julianday(created_at) > ?2 / 86400.0))",
                );
            }

            let select = format!("SELECT id FROM queue_tasks WHERE {where_clause}");
            let ids: Vec<i64> = if let Some(secs) = older_than_seconds {
                sqlx::query_scalar(&select)
                    .bind(now_iso())
                    .bind(secs as f64)
                    .fetch_all(&self.pool)
                    .await?
            } else {
                sqlx::query_scalar(&select).fetch_all(&self.pool).await?
            };

            if ids.is_empty() {
                return Ok(outcome);
            }

            let mut tx = self.pool.begin().await?;
            for id in &ids {
                sqlx::query(
                    "UPDATE queue_tasks SET status = 'deleted', canceled_at = ? WHERE id = ?",
                )
                .bind(now_iso())
                .bind(*id)
                .execute(&mut *tx)
                .await?;
                outcome.items_affected += sqlx::query(
                    r#"
                    UPDATE queue_items SET status = 'canceled'
                    WHERE task_id = ? AND status IN ('queued', 'running')
                    "#,
                )
                .bind(*id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            }
            tx.commit().await?;
            outcome.tasks_affected = ids.len() as u64;
            info!(scope = scope.as_str(), tasks = outcome.tasks_affected, "purged tasks");
            return Ok(outcome);
        }

        // history / all: hard delete, items cascade via the FK.
        let task_filter = match scope {
            PurgeScope::History => {
                "WHERE status IN ('completed', 'failed', 'canceled', 'deleted')"
            }
            PurgeScope::All => "",
            PurgeScope::Current => unreachable!(),
        };

        let mut tx = self.pool.begin().await?;
        let items: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM queue_items WHERE task_id IN \
             (SELECT id FROM queue_tasks {task_filter})"
        ))
        .fetch_one(&mut *tx)
        .await?;
        let tasks = sqlx::query(&format!("DELETE FROM queue_tasks {task_filter}"))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        outcome.tasks_affected = tasks;
        outcome.items_affected = items as u64;
        info!(scope = scope.as_str(), tasks, items, "purged tasks");
        Ok(outcome)
    }
}

#[async_trait]
impl LogStore for SqliteStore {
    async fn append_log(&self, entry: &NewLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO log_entries (timestamp, level, logger_name, message,
                                     module, function, exception)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(now_iso())
        .bind(entry.level.as_str())
        .bind(&entry.logger_name)
        .bind(&entry.message)
        .bind(&entry.module)
        .bind(&entry.function)
        .bind(&entry.exception)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_movie(row: &SqliteRow) -> MovieRecord {
    MovieRecord {
        id: row.get("id"),
        file_path: row.get("file_path"),
        title: row.get("title"),
        original_title: row.get("original_title"),
        year: row.get("year"),
        release_date: row.get("release_date"),
        runtime: row.get("runtime"),
        overview: row.get("overview"),
        genres: row.get("genres"),
        poster_path: row.get("poster_path"),
        backdrop_path: row.get("backdrop_path"),
        tmdb_id: row.get("tmdb_id"),
        imdb_id: row.get("imdb_id"),
        rating: row.get("rating"),
        votes: row.get("votes"),
        imdb_rating: row.get("imdb_rating"),
        imdb_votes: row.get("imdb_votes"),
        rotten_tomatoes_score: row.get("rotten_tomatoes_score"),
        metacritic_score: row.get("metacritic_score"),
        duration: row.get("duration"),
        video_codec: row.get("video_codec"),
        video_profile: row.get("video_profile"),
        video_resolution: row.get("video_resolution"),
        video_width: row.get("video_width"),
        video_height: row.get("video_height"),
        video_aspect_ratio: row.get("video_aspect_ratio"),
        video_bitrate: row.get("video_bitrate"),
        video_framerate: row.get("video_framerate"),
        video_hdr: row.get("video_hdr"),
        audio_codec: row.get("audio_codec"),
        audio_channels: row.get("audio_channels"),
        audio_bitrate: row.get("audio_bitrate"),
        audio_language: row.get("audio_language"),
        subtitle_languages: row.get("subtitle_languages"),
        subtitle_count: row.get("subtitle_count"),
        container: row.get("container"),
        scraped: row.get("scraped"),
        media_info_scanned: row.get("media_info_scanned"),
        media_info_failed: row.get("media_info_failed"),
        watched: row.get("watched"),
        watch_count: row.get("watch_count"),
        last_watched_date: row.get("last_watched_date"),
        last_watched_user: row.get("last_watched_user"),
        rating_key: row.get("rating_key"),
    }
}

fn row_to_show(row: &SqliteRow) -> ShowRecord {
    ShowRecord {
        id: row.get("id"),
        title: row.get("title"),
        original_title: row.get("original_title"),
        overview: row.get("overview"),
        first_air_date: row.get("first_air_date"),
        last_air_date: row.get("last_air_date"),
        airing_status: row.get("airing_status"),
        genres: row.get("genres"),
        poster_path: row.get("poster_path"),
        backdrop_path: row.get("backdrop_path"),
        tmdb_id: row.get("tmdb_id"),
        imdb_id: row.get("imdb_id"),
        rating: row.get("rating"),
        votes: row.get("votes"),
        season_count: row.get("season_count"),
        episode_count: row.get("episode_count"),
        year: row.get("year"),
        scraped: row.get("scraped"),
    }
}

fn row_to_episode(row: &SqliteRow) -> EpisodeRecord {
    EpisodeRecord {
        id: row.get("id"),
        show_id: row.get("show_id"),
        season_number: row.get("season_number"),
        episode_number: row.get("episode_number"),
        title: row.get("title"),
        overview: row.get("overview"),
        air_date: row.get("air_date"),
        runtime: row.get("runtime"),
        still_path: row.get("still_path"),
        file_path: row.get("file_path"),
        video_codec: row.get("video_codec"),
        video_resolution: row.get("video_resolution"),
        video_width: row.get("video_width"),
        video_height: row.get("video_height"),
        audio_codec: row.get("audio_codec"),
        audio_channels: row.get("audio_channels"),
        media_info_scanned: row.get("media_info_scanned"),
        media_info_failed: row.get("media_info_failed"),
    }
}

#[async_trait]
impl MediaLibrary for SqliteStore {
    async fn get_movie(&self, id: i64) -> Result<Option<MovieRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM movies WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_movie))
    }

    async fn update_movie(&self, movie: &MovieRecord) -> Result<(), StoreError> {
        let affected = sqlx::query(
            r#"
            UPDATE movies SET
                file_path = ?, title = ?, original_title = ?, year = ?,
                release_date = ?, runtime = ?, overview = ?, genres = ?,
                poster_path = ?, backdrop_path = ?, tmdb_id = ?, imdb_id = ?,
                rating = ?, votes = ?, imdb_rating = ?, imdb_votes = ?,
                rotten_tomatoes_score = ?, metacritic_score = ?, duration = ?,
                video_codec = ?, video_profile = ?, video_resolution = ?,
                video_width = ?, video_height = ?, video_aspect_ratio = ?,
                video_bitrate = ?, video_framerate = ?, video_hdr = ?,
                audio_codec = ?, audio_channels = ?, audio_bitrate = ?,
                audio_language = ?, subtitle_languages = ?, subtitle_count = ?,
                container = ?, scraped = ?, media_info_scanned = ?,
                media_info_failed = ?, watched = ?, watch_count = ?,
                last_watched_date = ?, last_watched_user = ?, rating_key = ?
            WHERE id = ?
            "#,
        )
        .bind(&movie.file_path)
        .bind(&movie.title)
        .bind(&movie.original_title)
        .bind(movie.year)
        .bind(&movie.release_date)
        .bind(movie.runtime)
        .bind(&movie.overview)
        .bind(&movie.genres)
        .bind(&movie.poster_path)
        .bind(&movie.backdrop_path)
        .bind(movie.tmdb_id)
        .bind(&movie.imdb_id)
        .bind(movie.rating)
        .bind(movie.votes)
        .bind(movie.imdb_rating)
        .bind(movie.imdb_votes)
        .bind(movie.rotten_tomatoes_score)
        .bind(movie.metacritic_score)
        .bind(movie.duration)
        .bind(&movie.video_codec)
        .bind(&movie.video_profile)
        .bind(&movie.video_resolution)
        .bind(movie.video_width)
        .bind(movie.video_height)
        .bind(&movie.video_aspect_ratio)
        .bind(movie.video_bitrate)
        .bind(&movie.video_framerate)
        .bind(&movie.video_hdr)
        .bind(&movie.audio_codec)
        .bind(&movie.audio_channels)
        .bind(movie.audio_bitrate)
        .bind(&movie.audio_language)
        .bind(&movie.subtitle_languages)
        .bind(movie.subtitle_count)
        .bind(&movie.container)
        .bind(movie.scraped)
        .bind(movie.media_info_scanned)
        .bind(movie.media_info_failed)
        .bind(movie.watched)
        .bind(movie.watch_count)
        .bind(&movie.last_watched_date)
        .bind(&movie.last_watched_user)
        .bind(movie.rating_key)
        .bind(movie.id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(StoreError::Database(format!("movie {} not found", movie.id)));
        }
        Ok(())
    }

    async fn insert_movie(&self, movie: &MovieRecord) -> Result<i64, StoreError> {
        let id = sqlx::query(
            r#"
            INSERT INTO movies (file_path, title, original_title, year, tmdb_id,
                                imdb_id, scraped, watched, watch_count, rating_key)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&movie.file_path)
        .bind(&movie.title)
        .bind(&movie.original_title)
        .bind(movie.year)
        .bind(movie.tmdb_id)
        .bind(&movie.imdb_id)
        .bind(movie.scraped)
        .bind(movie.watched)
        .bind(movie.watch_count)
        .bind(movie.rating_key)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    async fn get_show(&self, id: i64) -> Result<Option<ShowRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM tvshows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_show))
    }

    async fn update_show(&self, show: &ShowRecord) -> Result<(), StoreError> {
        let affected = sqlx::query(
            r#"
            UPDATE tvshows SET
                title = ?, original_title = ?, overview = ?, first_air_date = ?,
                last_air_date = ?, airing_status = ?, genres = ?, poster_path = ?,
                backdrop_path = ?, tmdb_id = ?, imdb_id = ?, rating = ?,
                votes = ?, season_count = ?, episode_count = ?, year = ?,
                scraped = ?
            WHERE id = ?
            "#,
        )
        .bind(&show.title)
        .bind(&show.original_title)
        .bind(&show.overview)
        .bind(&show.first_air_date)
        .bind(&show.last_air_date)
        .bind(&show.airing_status)
        .bind(&show.genres)
        .bind(&show.poster_path)
        .bind(&show.backdrop_path)
        .bind(show.tmdb_id)
        .bind(&show.imdb_id)
        .bind(show.rating)
        .bind(show.votes)
        .bind(show.season_count)
        .bind(show.episode_count)
        .bind(show.year)
        .bind(show.scraped)
        .bind(show.id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(StoreError::Database(format!("show {} not found", show.id)));
        }
        Ok(())
    }

    async fn insert_show(&self, show: &ShowRecord) -> Result<i64, StoreError> {
        let id = sqlx::query(
            r#"
            INSERT INTO tvshows (title, original_title, year, tmdb_id, imdb_id, scraped)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&show.title)
        .bind(&show.original_title)
        .bind(show.year)
        .bind(show.tmdb_id)
        .bind(&show.imdb_id)
        .bind(show.scraped)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    async fn get_episode(&self, id: i64) -> Result<Option<EpisodeRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM episodes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_episode))
    }

    async fn update_episode(&self, episode: &EpisodeRecord) -> Result<(), StoreError> {
        let affected = sqlx::query(
            r#"
            UPDATE episodes SET
                show_id = ?, season_number = ?, episode_number = ?, title = ?,
                overview = ?, air_date = ?, runtime = ?, still_path = ?,
                file_path = ?, video_codec = ?, video_resolution = ?,
                video_width = ?, video_height = ?, audio_codec = ?,
                audio_channels = ?, media_info_scanned = ?, media_info_failed = ?
            WHERE id = ?
            "#,
        )
        .bind(episode.show_id)
        .bind(episode.season_number)
        .bind(episode.episode_number)
        .bind(&episode.title)
        .bind(&episode.overview)
        .bind(&episode.air_date)
        .bind(episode.runtime)
        .bind(&episode.still_path)
        .bind(&episode.file_path)
        .bind(&episode.video_codec)
        .bind(&episode.video_resolution)
        .bind(episode.video_width)
        .bind(episode.video_height)
        .bind(&episode.audio_codec)
        .bind(&episode.audio_channels)
        .bind(episode.media_info_scanned)
        .bind(episode.media_info_failed)
        .bind(episode.id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(StoreError::Database(format!(
                "episode {} not found",
                episode.id
            )));
        }
        Ok(())
    }

    async fn insert_episode(&self, episode: &EpisodeRecord) -> Result<i64, StoreError> {
        let id = sqlx::query(
            r#"
            INSERT INTO episodes (show_id, season_number, episode_number, title, file_path)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(episode.show_id)
        .bind(episode.season_number)
        .bind(episode.episode_number)
        .bind(&episode.title)
        .bind(&episode.file_path)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM app_settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.flatten())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                           updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now_iso())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

    fn scan_payloads(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"path": format!("/media/films/{i}"), "media_type": "movie"}))
            .collect()
    }

    #[tokio::test]
    async fn create_and_get_task() {
        let store = store().await;
        let task = store
            .create_task(&TaskType::Scan, &scan_payloads(2), None, Some("tests"))
            .await
            .unwrap();

        assert_eq!(task.status, QueueStatus::Queued);
        assert_eq!(task.total_items, 2);
        assert_eq!(task.completed_items, 0);
        assert_eq!(task.items.len(), 2);
        assert_eq!(task.items[0].index, 0);
        assert_eq!(task.items[1].index, 1);
        assert_eq!(task.created_by.as_deref(), Some("tests"));

        assert!(store.get_task(task.id + 1000).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_follows_created_at_order() {
        let store = store().await;
        let first = store
            .create_task(&TaskType::Scan, &scan_payloads(1), None, None)
            .await
            .unwrap();
        let second = store
            .create_task(&TaskType::Analyze, &[json!({"movie_id": 1})], None, None)
            .await
            .unwrap();

        let claimed = store.claim_next_queued().await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, QueueStatus::Running);
        assert!(claimed.started_at.is_some());

        let claimed = store.claim_next_queued().await.unwrap().unwrap();
        assert_eq!(claimed.id, second.id);

        assert!(store.claim_next_queued().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn item_transitions_are_guarded() {
        let store = store().await;
        let task = store
            .create_task(&TaskType::Scan, &scan_payloads(1), None, None)
            .await
            .unwrap();
        let item_id = task.items[0].id;

        // Not claimable while the task is still queued.
        assert!(!store.mark_item_running(item_id).await.unwrap());

        store.claim_next_queued().await.unwrap().unwrap();
        assert!(store.mark_item_running(item_id).await.unwrap());
        // Second transition attempt is a no-op.
        assert!(!store.mark_item_running(item_id).await.unwrap());

        assert!(
            store
                .record_item_outcome(item_id, QueueStatus::Completed, &json!({"found": 3}))
                .await
                .unwrap()
        );
        let task = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.items[0].status, QueueStatus::Completed);
        assert_eq!(task.items[0].result, Some(json!({"found": 3})));
        assert!(task.items[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn canceled_item_is_not_overwritten_by_late_outcome() {
        let store = store().await;
        let task = store
            .create_task(&TaskType::Scan, &scan_payloads(2), None, None)
            .await
            .unwrap();
        store.claim_next_queued().await.unwrap().unwrap();
        let item_id = task.items[0].id;
        assert!(store.mark_item_running(item_id).await.unwrap());

        store.cancel_task(task.id).await.unwrap().unwrap();

        // Late handler outcome for the canceled item is dropped.
        assert!(
            !store
                .record_item_outcome(item_id, QueueStatus::Completed, &json!({"found": 1}))
                .await
                .unwrap()
        );
        let task = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, QueueStatus::Deleted);
        assert!(task.canceled_at.is_some());
        assert_eq!(task.items[0].status, QueueStatus::Canceled);
        assert_eq!(task.items[1].status, QueueStatus::Canceled);

        // No item of a canceled task can enter running afterwards.
        assert!(!store.mark_item_running(task.items[1].id).await.unwrap());
    }

    #[tokio::test]
    async fn cancel_terminal_task_is_silent() {
        let store = store().await;
        let task = store
            .create_task(&TaskType::Scan, &scan_payloads(1), None, None)
            .await
            .unwrap();
        store.claim_next_queued().await.unwrap().unwrap();
        store.set_task_status(task.id, QueueStatus::Completed).await.unwrap();

        let canceled = store.cancel_task(task.id).await.unwrap().unwrap();
        assert_eq!(canceled.status, QueueStatus::Completed);

        assert!(store.cancel_task(99999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_task_status_enforces_state_machine() {
        let store = store().await;
        let task = store
            .create_task(&TaskType::Scan, &scan_payloads(1), None, None)
            .await
            .unwrap();

        // queued -> completed is not a valid worker transition
        let err = store
            .set_task_status(task.id, QueueStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        store.claim_next_queued().await.unwrap().unwrap();
        store.set_task_status(task.id, QueueStatus::Failed).await.unwrap();
        let task = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, QueueStatus::Failed);
        assert!(task.finished_at.is_some());

        let err = store
            .set_task_status(task.id, QueueStatus::Running)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TerminalState(QueueStatus::Failed)));
    }

    #[tokio::test]
    async fn list_tasks_newest_first() {
        let store = store().await;
        for _ in 0..3 {
            store
                .create_task(&TaskType::Scan, &scan_payloads(1), None, None)
                .await
                .unwrap();
        }
        let tasks = store.list_tasks(2).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].id > tasks[1].id);
        assert!(tasks[0].items.is_empty());
    }

    #[tokio::test]
    async fn purge_all_hard_deletes_everything() {
        let store = store().await;
        // First task is driven to completed; second stays queued.
        let completed = store
            .create_task(&TaskType::Scan, &scan_payloads(1), None, None)
            .await
            .unwrap();
        let queued = store
            .create_task(&TaskType::Scan, &scan_payloads(1), None, None)
            .await
            .unwrap();
        store.claim_next_queued().await.unwrap();
        store
            .set_task_status(completed.id, QueueStatus::Completed)
            .await
            .unwrap();

        let outcome = store.purge_tasks(PurgeScope::All, None).await.unwrap();
        assert_eq!(outcome.tasks_affected, 2);
        assert_eq!(outcome.items_affected, 2);

        assert!(store.get_task(completed.id).await.unwrap().is_none());
        assert!(store.get_task(queued.id).await.unwrap().is_none());
        // Items cascaded.
        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue_items")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn purge_history_keeps_open_tasks() {
        let store = store().await;
        // First task is claimed and completed; second stays queued.
        let completed = store
            .create_task(&TaskType::Scan, &scan_payloads(1), None, None)
            .await
            .unwrap();
        let queued = store
            .create_task(&TaskType::Scan, &scan_payloads(1), None, None)
            .await
            .unwrap();
        store.claim_next_queued().await.unwrap();
        store
            .set_task_status(completed.id, QueueStatus::Completed)
            .await
            .unwrap();

        let outcome = store.purge_tasks(PurgeScope::History, None).await.unwrap();
        assert_eq!(outcome.tasks_affected, 1);
        assert!(store.get_task(completed.id).await.unwrap().is_none());
        assert!(store.get_task(queued.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn purge_current_soft_deletes_and_honors_cutoff() {
        let store = store().await;
        let task = store
            .create_task(&TaskType::Scan, &scan_payloads(2), None, None)
            .await
            .unwrap();

        // Fresh task survives an old-age cutoff.
        let outcome = store
            .purge_tasks(PurgeScope::Current, Some(3600))
            .await
            .unwrap();
        assert_eq!(outcome.tasks_affected, 0);

        // Without a cutoff the queued task is swept.
        let outcome = store.purge_tasks(PurgeScope::Current, None).await.unwrap();
        assert_eq!(outcome.tasks_affected, 1);
        assert_eq!(outcome.items_affected, 2);
        let task = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, QueueStatus::Deleted);
        assert_eq!(task.items[0].status, QueueStatus::Canceled);
    }

    #[tokio::test]
    async fn migration_normalizes_legacy_uppercase_and_is_idempotent() {
        let store = store().await;
        let task = store
            .create_task(&TaskType::Scan, &scan_payloads(1), None, None)
            .await
            .unwrap();
        sqlx::query("UPDATE queue_tasks SET status = 'QUEUED' WHERE id = ?")
            .bind(task.id)
            .execute(store.pool())
            .await
            .unwrap();
        sqlx::query("UPDATE queue_items SET status = 'Queued'")
            .execute(store.pool())
            .await
            .unwrap();

        MigrationRunner::new(store.pool()).run().await.unwrap();
        let task = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, QueueStatus::Queued);
        assert_eq!(task.items[0].status, QueueStatus::Queued);

        // Second run: still lowercase, ledger unchanged.
        MigrationRunner::new(store.pool()).run().await.unwrap();
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM migrations ORDER BY name")
            .fetch_all(store.pool())
            .await
            .unwrap();
        assert_eq!(names, vec!["001_normalize_status_case.sql".to_string()]);
    }

    #[tokio::test]
    async fn meta_round_trips_with_unknown_keys() {
        let store = store().await;
        let meta: TaskMeta = serde_json::from_value(json!({
            "trigger": "library_refresh",
            "provider": "tmdb",
            "fleet": "alpha"
        }))
        .unwrap();
        let task = store
            .create_task(
                &TaskType::RefreshMetadata,
                &[json!({"movie_id": 1})],
                Some(&meta),
                None,
            )
            .await
            .unwrap();
        let fetched = store.get_task(task.id).await.unwrap().unwrap();
        let fetched_meta = fetched.meta.unwrap();
        assert_eq!(fetched_meta.trigger.as_deref(), Some("library_refresh"));
        assert_eq!(fetched_meta.extra["fleet"], json!("alpha"));
    }

    #[tokio::test]
    async fn settings_and_logs() {
        let store = store().await;
        assert!(store.get_setting("tmdb_api_key").await.unwrap().is_none());
        store.set_setting("tmdb_api_key", "abc123").await.unwrap();
        store.set_setting("tmdb_api_key", "def456").await.unwrap();
        assert_eq!(
            store.get_setting("tmdb_api_key").await.unwrap().as_deref(),
            Some("def456")
        );

        store
            .append_log(
                &NewLogEntry::new(crate::records::LogLevel::Error, "QueueWorker", "item 9 failed")
                    .module("queue")
                    .function("process_one"),
            )
            .await
            .unwrap();
        let (level, message): (String, String) =
            sqlx::query_as("SELECT level, message FROM log_entries LIMIT 1")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(level, "ERROR");
        assert_eq!(message, "item 9 failed");
    }

    #[tokio::test]
    async fn movie_round_trip() {
        let store = store().await;
        let id = store
            .insert_movie(&MovieRecord {
                title: Some("Test Movie".to_string()),
                year: Some(2023),
                file_path: Some("/media/films/Test.Movie.2023.mkv".to_string()),
                ..MovieRecord::default()
            })
            .await
            .unwrap();

        let mut movie = store.get_movie(id).await.unwrap().unwrap();
        assert!(!movie.scraped);
        movie.tmdb_id = Some(12345);
        movie.title = Some("Updated Title".to_string());
        movie.scraped = true;
        store.update_movie(&movie).await.unwrap();

        let movie = store.get_movie(id).await.unwrap().unwrap();
        assert_eq!(movie.tmdb_id, Some(12345));
        assert_eq!(movie.title.as_deref(), Some("Updated Title"));
        assert!(movie.scraped);
    }
}
