//! Startup schema management.
//!
//! The runner is idempotent and executes four passes in order:
//!
//! 1. `CREATE TABLE IF NOT EXISTS` / `CREATE INDEX IF NOT EXISTS` for the
//!    current model
//! 2. additive `ALTER TABLE ... ADD COLUMN` for columns introduced after a
//!    table first shipped ("duplicate column" errors are ignored)
//! 3. ledger-applied SQL migration files, in lexicographic order; each
//!    ledger insert commits atomically with its file's statements
//! 4. lowercase normalization of any legacy uppercase status values

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::StoreError;

/// Ordered migration files compiled into the binary. Names are recorded in
/// the `migrations` ledger so each file applies exactly once.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_normalize_status_case.sql",
    include_str!("migrations/001_normalize_status_case.sql"),
)];

/// Columns added after their table first shipped. Kept additive-only so the
/// pass is safe against any historical schema.
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("queue_tasks", "canceled_at", "TEXT"),
    ("queue_tasks", "created_by", "TEXT"),
    ("queue_tasks", "meta", "TEXT"),
    ("movies", "imdb_rating", "REAL"),
    ("movies", "imdb_votes", "INTEGER"),
    ("movies", "rotten_tomatoes_score", "INTEGER"),
    ("movies", "metacritic_score", "INTEGER"),
    ("movies", "rating_key", "INTEGER"),
    ("episodes", "media_info_failed", "INTEGER DEFAULT 0"),
];

/// Runs the schema pass. Construct once at startup with the shared pool.
pub struct MigrationRunner<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Execute all four passes. Safe to call repeatedly.
    pub async fn run(&self) -> Result<(), StoreError> {
        debug!("running store migrations");
        self.create_tables().await?;
        self.add_missing_columns().await?;
        self.apply_migration_files().await?;
        self.normalize_status_case().await?;
        debug!("store migrations completed");
        Ok(())
    }

    async fn create_tables(&self) -> Result<(), StoreError> {
        for ddl in [
            r#"
            CREATE TABLE IF NOT EXISTS queue_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued',
                created_by TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                finished_at TEXT,
                canceled_at TEXT,
                total_items INTEGER NOT NULL DEFAULT 0,
                completed_items INTEGER NOT NULL DEFAULT 0,
                meta TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_queue_tasks_status ON queue_tasks (status)",
            "CREATE INDEX IF NOT EXISTS idx_queue_tasks_created ON queue_tasks (created_at, id)",
            r#"
            CREATE TABLE IF NOT EXISTS queue_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL REFERENCES queue_tasks(id) ON DELETE CASCADE,
                "index" INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'queued',
                payload TEXT,
                result TEXT,
                started_at TEXT,
                finished_at TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_queue_items_task ON queue_items (task_id)",
            r#"
            CREATE TABLE IF NOT EXISTS log_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                level TEXT NOT NULL,
                logger_name TEXT NOT NULL,
                message TEXT NOT NULL,
                module TEXT,
                function TEXT,
                exception TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_log_entries_level ON log_entries (level)",
            "CREATE INDEX IF NOT EXISTS idx_log_entries_timestamp ON log_entries (timestamp)",
            r#"
            CREATE TABLE IF NOT EXISTS app_settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                value TEXT,
                updated_at TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS movies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path TEXT,
                title TEXT,
                original_title TEXT,
                year INTEGER,
                release_date TEXT,
                runtime INTEGER,
                overview TEXT,
                genres TEXT,
                poster_path TEXT,
                backdrop_path TEXT,
                tmdb_id INTEGER,
                imdb_id TEXT,
                rating REAL,
                votes INTEGER,
                imdb_rating REAL,
                imdb_votes INTEGER,
                rotten_tomatoes_score INTEGER,
                metacritic_score INTEGER,
                duration INTEGER,
                video_codec TEXT,
                video_profile TEXT,
                video_resolution TEXT,
                video_width INTEGER,
                video_height INTEGER,
                video_aspect_ratio TEXT,
                video_bitrate INTEGER,
                video_framerate TEXT,
                video_hdr TEXT,
                audio_codec TEXT,
                audio_channels TEXT,
                audio_bitrate INTEGER,
                audio_language TEXT,
                subtitle_languages TEXT,
                subtitle_count INTEGER,
                container TEXT,
                scraped INTEGER NOT NULL DEFAULT 0,
                media_info_scanned INTEGER NOT NULL DEFAULT 0,
                media_info_failed INTEGER NOT NULL DEFAULT 0,
                watched INTEGER NOT NULL DEFAULT 0,
                watch_count INTEGER NOT NULL DEFAULT 0,
                last_watched_date TEXT,
                last_watched_user TEXT,
                rating_key INTEGER
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_movies_imdb ON movies (imdb_id)",
            r#"
            CREATE TABLE IF NOT EXISTS tvshows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                original_title TEXT,
                overview TEXT,
                first_air_date TEXT,
                last_air_date TEXT,
                airing_status TEXT,
                genres TEXT,
                poster_path TEXT,
                backdrop_path TEXT,
                tmdb_id INTEGER,
                imdb_id TEXT,
                rating REAL,
                votes INTEGER,
                season_count INTEGER,
                episode_count INTEGER,
                year INTEGER,
                scraped INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS episodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                show_id INTEGER NOT NULL REFERENCES tvshows(id) ON DELETE CASCADE,
                season_number INTEGER NOT NULL,
                episode_number INTEGER NOT NULL,
                title TEXT,
                overview TEXT,
                air_date TEXT,
                runtime INTEGER,
                still_path TEXT,
                file_path TEXT,
                video_codec TEXT,
                video_resolution TEXT,
                video_width INTEGER,
                video_height INTEGER,
                audio_codec TEXT,
                audio_channels TEXT,
                media_info_scanned INTEGER NOT NULL DEFAULT 0,
                media_info_failed INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            )
            "#,
        ] {
            sqlx::query(ddl).execute(self.pool).await?;
        }
        Ok(())
    }

    async fn add_missing_columns(&self) -> Result<(), StoreError> {
        for (table, column, ddl) in ADDITIVE_COLUMNS {
            let stmt = format!("ALTER TABLE {table} ADD COLUMN {column} {ddl}");
            if let Err(err) = sqlx::query(&stmt).execute(self.pool).await {
                let message = err.to_string();
                if message.contains("duplicate column") {
                    continue;
                }
                return Err(StoreError::Database(message));
            }
            debug!(table, column, "added column");
        }
        Ok(())
    }

    async fn apply_migration_files(&self) -> Result<(), StoreError> {
        for (name, sql) in MIGRATIONS {
            let applied: Option<String> =
                sqlx::query_scalar("SELECT name FROM migrations WHERE name = ?")
                    .bind(*name)
                    .fetch_optional(self.pool)
                    .await?;
            if applied.is_some() {
                continue;
            }

            let mut tx = self.pool.begin().await?;
            for stmt in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                sqlx::query(stmt)
                    .execute(&mut *tx)
                    .await
                    .map_err(|err| StoreError::Migration {
                        name: name.to_string(),
                        message: err.to_string(),
                    })?;
            }
            sqlx::query("INSERT INTO migrations (name, applied_at) VALUES (?, ?)")
                .bind(*name)
                .bind(crate::now_iso())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            info!(migration = name, "applied migration");
        }
        Ok(())
    }

    /// Repair legacy uppercase status values. Runs every startup; a no-op on
    /// healthy data.
    async fn normalize_status_case(&self) -> Result<(), StoreError> {
        for table in ["queue_tasks", "queue_items"] {
            let stmt =
                format!("UPDATE {table} SET status = lower(status) WHERE status <> lower(status)");
            let repaired = sqlx::query(&stmt).execute(self.pool).await?.rows_affected();
            if repaired > 0 {
                info!(table, repaired, "normalized legacy status values");
            }
        }
        Ok(())
    }
}
