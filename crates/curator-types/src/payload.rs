//! Typed item payloads.
//!
//! Each task type owns a payload shape (see the handler contracts). The JSON
//! stored in `queue_items.payload` is the plain object form; no tag field -
//! so deserialization happens in the context of the owning task's type.

use serde::{Deserialize, Serialize};

/// Kind of library entry a scan targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl Default for MediaType {
    fn default() -> Self {
        MediaType::Movie
    }
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

/// Payload for `scan` items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPayload {
    pub path: String,
    #[serde(default)]
    pub media_type: MediaType,
}

/// Payload for `analyze` items: exactly one of a movie or an episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalyzePayload {
    Movie { movie_id: i64 },
    Episode { episode_id: i64 },
}

/// Payload for `refresh_metadata` items.
///
/// One of `movie_id` / `show_id` / `episode_id` selects the target; the
/// remaining fields are optional resolution overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movie_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

/// The entity a refresh payload addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTarget {
    Movie(i64),
    Show(i64),
    Episode(i64),
}

impl RefreshPayload {
    /// Resolve the target entity. Precedence follows the original payload
    /// handling: movie, then show, then episode.
    pub fn target(&self) -> Option<RefreshTarget> {
        if let Some(id) = self.movie_id {
            Some(RefreshTarget::Movie(id))
        } else if let Some(id) = self.show_id {
            Some(RefreshTarget::Show(id))
        } else {
            self.episode_id.map(RefreshTarget::Episode)
        }
    }
}

/// Payload for `sync_watch_history` items.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WatchHistoryPayload {
    pub movie_id: i64,
}
