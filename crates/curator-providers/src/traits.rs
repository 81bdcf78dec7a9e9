//! The capability ports the queue handlers consume.
//!
//! Tests inject stub implementations; production wiring goes through
//! [`crate::SettingsProviderFactory`].

use std::path::Path;

use async_trait::async_trait;

use curator_types::MediaType;

use crate::error::ProviderError;
use crate::types::{
    EpisodeMetadata, HistoryEntry, MovieMetadata, OmdbShow, PlexItem, ProbeReport, RatingsBundle,
    ScannedEntry, SearchHit, ShowMetadata,
};

/// Primary metadata provider (TMDB).
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn search_movies(
        &self,
        query: &str,
        year: Option<i32>,
    ) -> Result<Vec<SearchHit>, ProviderError>;

    async fn movie_details(&self, id: i64) -> Result<Option<MovieMetadata>, ProviderError>;

    async fn movie_by_imdb(&self, imdb_id: &str) -> Result<Option<MovieMetadata>, ProviderError>;

    async fn search_shows(
        &self,
        query: &str,
        year: Option<i32>,
    ) -> Result<Vec<SearchHit>, ProviderError>;

    async fn show_details(&self, id: i64) -> Result<Option<ShowMetadata>, ProviderError>;

    async fn season_episodes(
        &self,
        show_id: i64,
        season_number: i64,
    ) -> Result<Vec<EpisodeMetadata>, ProviderError>;
}

/// Secondary ratings provider (OMDb).
#[async_trait]
pub trait RatingsSource: Send + Sync {
    async fn ratings_by_imdb(&self, imdb_id: &str)
    -> Result<Option<RatingsBundle>, ProviderError>;

    async fn ratings_by_title(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<RatingsBundle>, ProviderError>;

    async fn show_by_imdb(&self, imdb_id: &str) -> Result<Option<OmdbShow>, ProviderError>;

    async fn search_show(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<OmdbShow>, ProviderError>;
}

/// Media server (Plex) used to resolve rating keys.
#[async_trait]
pub trait MediaServer: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<PlexItem>, ProviderError>;

    async fn rating_key_by_imdb(&self, imdb_id: &str) -> Result<Option<i64>, ProviderError>;
}

/// Watch-history provider (Tautulli).
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// History for a specific rating key, most recent first.
    async fn history_for_key(&self, rating_key: i64)
    -> Result<Vec<HistoryEntry>, ProviderError>;

    async fn search(&self, query: &str) -> Result<Vec<crate::types::TautulliHit>, ProviderError>;

    /// A window of recent history across the whole server, for guid
    /// substring scans when search comes back empty.
    async fn recent_history(&self, length: u32) -> Result<Vec<HistoryEntry>, ProviderError>;
}

/// Technical analyzer for a single media file.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeReport, ProviderError>;
}

/// Library directory scanner.
#[async_trait]
pub trait DirectoryScanner: Send + Sync {
    async fn scan(
        &self,
        path: &Path,
        media_type: MediaType,
    ) -> Result<Vec<ScannedEntry>, ProviderError>;
}
