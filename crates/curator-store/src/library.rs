//! Media-library records.
//!
//! Only the columns the queue handlers read or write are modeled here; the
//! wider library schema (paths, NFO/trailer flags, renamer fields) belongs to
//! the rest of the server and is out of this subsystem's scope.

/// A movie row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieRecord {
    pub id: i64,
    pub file_path: Option<String>,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub release_date: Option<String>,
    pub runtime: Option<i64>,
    pub overview: Option<String>,
    pub genres: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub tmdb_id: Option<i64>,
    pub imdb_id: Option<String>,
    pub rating: Option<f64>,
    pub votes: Option<i64>,

    // Ratings merged from OMDb
    pub imdb_rating: Option<f64>,
    pub imdb_votes: Option<i64>,
    pub rotten_tomatoes_score: Option<i64>,
    pub metacritic_score: Option<i64>,

    // Technical fields written by analyze
    pub duration: Option<i64>,
    pub video_codec: Option<String>,
    pub video_profile: Option<String>,
    pub video_resolution: Option<String>,
    pub video_width: Option<i64>,
    pub video_height: Option<i64>,
    pub video_aspect_ratio: Option<String>,
    pub video_bitrate: Option<i64>,
    pub video_framerate: Option<String>,
    pub video_hdr: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_channels: Option<String>,
    pub audio_bitrate: Option<i64>,
    pub audio_language: Option<String>,
    pub subtitle_languages: Option<String>,
    pub subtitle_count: Option<i64>,
    pub container: Option<String>,

    pub scraped: bool,
    pub media_info_scanned: bool,
    pub media_info_failed: bool,

    // Watch history from Tautulli
    pub watched: bool,
    pub watch_count: i64,
    pub last_watched_date: Option<String>,
    pub last_watched_user: Option<String>,
    pub rating_key: Option<i64>,
}

/// A TV show row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShowRecord {
    pub id: i64,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
    pub last_air_date: Option<String>,
    pub airing_status: Option<String>,
    pub genres: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub tmdb_id: Option<i64>,
    pub imdb_id: Option<String>,
    pub rating: Option<f64>,
    pub votes: Option<i64>,
    pub season_count: Option<i64>,
    pub episode_count: Option<i64>,
    pub year: Option<i32>,
    pub scraped: bool,
}

/// An episode row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeRecord {
    pub id: i64,
    pub show_id: i64,
    pub season_number: i64,
    pub episode_number: i64,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub runtime: Option<i64>,
    pub still_path: Option<String>,
    pub file_path: Option<String>,

    pub video_codec: Option<String>,
    pub video_resolution: Option<String>,
    pub video_width: Option<i64>,
    pub video_height: Option<i64>,
    pub audio_codec: Option<String>,
    pub audio_channels: Option<String>,

    pub media_info_scanned: bool,
    pub media_info_failed: bool,
}
