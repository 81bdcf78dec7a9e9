//! Data carried across the provider ports.

use serde_json::Value;

/// One raw search result from the metadata provider. Enough to score a match
/// and fetch details.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: i64,
    pub title: String,
    /// Release year (movies) or first-air year (shows), when present.
    pub year: Option<i32>,
}

/// Movie metadata as supplied by the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieMetadata {
    pub tmdb_id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i64>,
    pub genres: Vec<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub imdb_id: Option<String>,
    pub rating: Option<f64>,
    pub votes: Option<i64>,
}

/// TV show metadata as supplied by the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShowMetadata {
    pub tmdb_id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
    pub last_air_date: Option<String>,
    pub airing_status: Option<String>,
    pub genres: Vec<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub imdb_id: Option<String>,
    pub rating: Option<f64>,
    pub votes: Option<i64>,
    pub season_count: Option<i64>,
    pub episode_count: Option<i64>,
}

/// One episode of a season listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeMetadata {
    pub season_number: i64,
    pub episode_number: i64,
    pub title: String,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub runtime: Option<i64>,
    pub still_path: Option<String>,
}

/// Ratings bundle from OMDb. `None` means the source had no value; callers
/// must never overwrite a stored rating with `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingsBundle {
    pub imdb_rating: Option<f64>,
    pub imdb_votes: Option<i64>,
    pub rotten_tomatoes_score: Option<i64>,
    pub metacritic_score: Option<i64>,
}

impl RatingsBundle {
    pub fn is_empty(&self) -> bool {
        self.imdb_rating.is_none()
            && self.imdb_votes.is_none()
            && self.rotten_tomatoes_score.is_none()
            && self.metacritic_score.is_none()
    }
}

/// TV show record from OMDb, used when an IMDB override is supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OmdbShow {
    pub title: String,
    pub year: Option<String>,
    pub imdb_id: Option<String>,
    pub plot: Option<String>,
    pub poster: Option<String>,
    pub genre: Option<String>,
    pub total_seasons: Option<i64>,
    pub imdb_rating: Option<f64>,
    pub imdb_votes: Option<i64>,
}

impl OmdbShow {
    /// The start year parsed from OMDb's `Year` field (`"2008–2013"` keeps
    /// the leading year).
    pub fn start_year(&self) -> Option<i32> {
        let year = self.year.as_deref()?;
        let digits: String = year.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}

/// One Plex search result.
#[derive(Debug, Clone)]
pub struct PlexItem {
    pub rating_key: Option<i64>,
    /// The raw metadata object, retained for guid substring matching.
    pub raw: Value,
}

/// One Tautulli watch-history entry.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Watch time as a unix epoch.
    pub date: i64,
    pub user: Option<String>,
    pub rating_key: Option<i64>,
    pub raw: Value,
}

/// One Tautulli search result.
#[derive(Debug, Clone)]
pub struct TautulliHit {
    pub rating_key: Option<i64>,
    pub media_type: Option<String>,
    pub year: Option<i32>,
    pub raw: Value,
}

/// Technical metadata extracted by the media probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    pub container: Option<String>,
    pub duration: Option<i64>,
    pub overall_bitrate: Option<i64>,

    pub video_codec: Option<String>,
    pub video_profile: Option<String>,
    pub video_width: Option<i64>,
    pub video_height: Option<i64>,
    pub video_resolution: Option<String>,
    pub video_aspect_ratio: Option<String>,
    pub video_bitrate: Option<i64>,
    pub video_framerate: Option<String>,
    pub video_hdr: Option<String>,

    pub audio_codec: Option<String>,
    pub audio_channels: Option<String>,
    pub audio_bitrate: Option<i64>,
    pub audio_language: Option<String>,

    pub subtitle_languages: Vec<String>,
    pub subtitle_count: i64,
}

/// One file or folder found by a directory scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedEntry {
    pub path: String,
    pub title: String,
    pub year: Option<i32>,
}
