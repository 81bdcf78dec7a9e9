//! # Curator Store
//!
//! Durable persistence for the task queue and the slice of the media library
//! the queue handlers read and write.
//!
//! ## Architecture
//!
//! - **`QueueStore` trait**: task/item lifecycle: create, claim, guarded
//!   item transitions, cancel, scoped purge
//! - **`MediaLibrary` trait**: the movie/show/episode columns handlers touch,
//!   plus the settings table provider factories consult
//! - **`LogStore` trait**: operator-visible log rows (`log_entries`)
//! - **`SqliteStore`**: the sqlx/SQLite implementation of all three
//! - **`MigrationRunner`**: idempotent startup schema management: additive
//!   columns, a `migrations` ledger of applied SQL files, and lowercase
//!   status normalization
//!
//! All mutations run in short transactions; on commit failure nothing is
//! visible to readers. Status text persists lowercase (legacy uppercase rows
//! are repaired at startup).

pub mod error;
pub mod library;
pub mod migrate;
pub mod records;
pub mod sqlite;
pub mod state_machine;
pub mod traits;

pub use error::StoreError;
pub use library::{EpisodeRecord, MovieRecord, ShowRecord};
pub use migrate::MigrationRunner;
pub use records::{ItemRecord, LogLevel, NewLogEntry, PurgeOutcome, PurgeScope, TaskRecord};
pub use sqlite::{SqliteStore, SqliteStoreConfig};
pub use state_machine::{validate_item_transition, validate_task_transition};
pub use traits::{LogStore, MediaLibrary, QueueStore};

/// Current UTC time as the fixed-width RFC 3339 text stored in every
/// datetime column. Microsecond precision with a `Z` suffix keeps
/// lexicographic ordering consistent with chronological ordering.
pub fn now_iso() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
