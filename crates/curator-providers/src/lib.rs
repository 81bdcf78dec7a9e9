//! # External Capability Ports
//!
//! Narrow interfaces the queue handlers consume, with production clients for
//! the services a media library talks to:
//!
//! - **TMDB** (`MetadataSource`): movie/show/episode metadata
//! - **OMDb** (`RatingsSource`): IMDB / Rotten Tomatoes / Metacritic ratings
//! - **Plex** (`MediaServer`): rating-key resolution
//! - **Tautulli** (`HistoryProvider`): watch history
//! - **ffprobe** (`MediaProbe`): technical media analysis
//! - **filesystem** (`DirectoryScanner`): library directory scans
//!
//! Clients are constructed through [`SettingsProviderFactory`], which reads
//! API keys and hosts from the `app_settings` table first and falls back to
//! process configuration, so keys can be rotated at runtime without a
//! restart. Handlers treat an unconfigured provider as "no result", not as a
//! failure.

pub mod error;
pub mod factory;
pub mod omdb;
pub mod plex;
pub mod probe;
pub mod scanner;
pub mod tautulli;
pub mod tmdb;
pub mod traits;
pub mod types;

pub use error::ProviderError;
pub use factory::{ProviderFactory, ProviderFallbacks, SettingsProviderFactory};
pub use omdb::OmdbClient;
pub use plex::PlexClient;
pub use probe::FfprobeMediaProbe;
pub use scanner::WalkdirScanner;
pub use tautulli::TautulliClient;
pub use tmdb::TmdbClient;
pub use traits::{
    DirectoryScanner, HistoryProvider, MediaProbe, MediaServer, MetadataSource, RatingsSource,
};
pub use types::{
    EpisodeMetadata, HistoryEntry, MovieMetadata, OmdbShow, PlexItem, ProbeReport, RatingsBundle,
    ScannedEntry, SearchHit, ShowMetadata, TautulliHit,
};
