//! `sync_watch_history` handler.
//!
//! Resolves the movie's Plex rating key (stored key → Plex IMDB lookup →
//! Plex title search → Tautulli search → recent-history scan), persists the
//! key on first resolution, then mirrors the watch history onto the movie
//! row. An empty history clears the watch fields.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, TimeZone, Utc};
use serde_json::{Value, json};
use tracing::{debug, warn};

use curator_providers::{HistoryEntry, HistoryProvider, MediaServer, ProviderFactory};
use curator_store::{LogStore, MediaLibrary, MovieRecord};
use curator_types::{ItemOutcome, WatchHistoryPayload};

use crate::handler::{HandlerContext, HandlerError, TaskHandler};

/// Window scanned when Tautulli search does not index guids.
const HISTORY_SCAN_LENGTH: u32 = 2000;

pub struct WatchHistoryHandler {
    library: Arc<dyn MediaLibrary>,
    #[allow(dead_code)]
    logs: Arc<dyn LogStore>,
    providers: Arc<dyn ProviderFactory>,
}

impl WatchHistoryHandler {
    pub fn new(
        library: Arc<dyn MediaLibrary>,
        logs: Arc<dyn LogStore>,
        providers: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            library,
            logs,
            providers,
        }
    }

    /// Steps 2–3 of the resolution chain: ask Plex. Failures here only mean
    /// we fall through to Tautulli.
    async fn resolve_via_plex(&self, movie: &MovieRecord) -> Option<i64> {
        let plex: Arc<dyn MediaServer> = match self.providers.media_server().await {
            Ok(Some(plex)) => plex,
            Ok(None) => return None,
            Err(err) => {
                debug!(%err, "plex unavailable for rating-key resolution");
                return None;
            }
        };

        if let Some(imdb_id) = &movie.imdb_id {
            match plex.rating_key_by_imdb(imdb_id).await {
                Ok(Some(rating_key)) => return Some(rating_key),
                Ok(None) => {}
                Err(err) => debug!(%err, "plex imdb lookup failed"),
            }
        }
        if let Some(title) = &movie.title {
            match plex.search(title).await {
                Ok(results) => {
                    if let Some(rating_key) = results.iter().find_map(|r| r.rating_key) {
                        return Some(rating_key);
                    }
                }
                Err(err) => debug!(%err, "plex title search failed"),
            }
        }
        None
    }

    /// Steps 4–5: Tautulli search by imdb id / title / year, then a
    /// substring scan over recent history. Returns resolved history and,
    /// when known, the rating key it came from.
    async fn resolve_via_tautulli(
        &self,
        tautulli: &Arc<dyn HistoryProvider>,
        movie: &MovieRecord,
    ) -> Result<(Vec<HistoryEntry>, Option<i64>), HandlerError> {
        let mut queries: Vec<String> = Vec::new();
        if let Some(imdb_id) = &movie.imdb_id {
            queries.push(imdb_id.clone());
        }
        if let Some(title) = &movie.title {
            if !queries.contains(title) {
                queries.push(title.clone());
            }
        }

        for query in &queries {
            let hits = tautulli.search(query).await?;
            if hits.is_empty() {
                continue;
            }
            let mut movies: Vec<_> = hits
                .iter()
                .filter(|h| h.media_type.as_deref() == Some("movie"))
                .collect();
            if let Some(year) = movie.year {
                let year_matched: Vec<_> = movies
                    .iter()
                    .copied()
                    .filter(|h| h.year == Some(year))
                    .collect();
                if !year_matched.is_empty() {
                    movies = year_matched;
                }
            }

            // Prefer a hit that carries our IMDB guid anywhere in its raw
            // metadata; guid shapes vary too much for field-exact matching.
            let matched = if let Some(imdb_id) = &movie.imdb_id {
                hits.iter()
                    .find(|h| h.raw.to_string().contains(imdb_id.as_str()))
                    .or_else(|| movies.first().copied())
            } else {
                movies.first().copied()
            };

            if let Some(rating_key) = matched.and_then(|h| h.rating_key) {
                let history = tautulli.history_for_key(rating_key).await?;
                return Ok((history, Some(rating_key)));
            }
        }

        // Search came back with nothing usable; scan recent history for the
        // guid directly.
        if let Some(imdb_id) = &movie.imdb_id {
            let recent = tautulli.recent_history(HISTORY_SCAN_LENGTH).await?;
            let matches: Vec<HistoryEntry> = recent
                .into_iter()
                .filter(|entry| entry.raw.to_string().contains(imdb_id.as_str()))
                .collect();
            if !matches.is_empty() {
                let rating_key = matches.iter().find_map(|e| e.rating_key);
                return Ok((matches, rating_key));
            }
        }

        Ok((Vec::new(), None))
    }
}

fn epoch_to_iso(epoch: i64) -> Option<String> {
    Utc.timestamp_opt(epoch, 0)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, true))
}

#[async_trait]
impl TaskHandler for WatchHistoryHandler {
    async fn handle(
        &self,
        _ctx: &HandlerContext,
        payload: &Value,
    ) -> Result<ItemOutcome, HandlerError> {
        let payload: WatchHistoryPayload = match serde_json::from_value(payload.clone()) {
            Ok(p) => p,
            Err(_) => return Ok(ItemOutcome::failed("no movie_id provided")),
        };
        let Some(mut movie) = self.library.get_movie(payload.movie_id).await? else {
            return Ok(ItemOutcome::failed("movie not found"));
        };

        let tautulli = match self.providers.history_provider().await {
            Ok(Some(tautulli)) => tautulli,
            Ok(None) => return Ok(ItemOutcome::failed("tautulli not configured")),
            Err(err) => return Ok(ItemOutcome::failed(err.to_string())),
        };

        // Fast path: a previously persisted rating key skips the whole
        // lookup chain.
        let mut rating_key = movie.rating_key;
        if rating_key.is_none() {
            rating_key = self.resolve_via_plex(&movie).await;
        }

        let history = if let Some(rating_key) = rating_key {
            match tautulli.history_for_key(rating_key).await {
                Ok(history) => {
                    movie.rating_key = Some(rating_key);
                    history
                }
                Err(err) => return Ok(ItemOutcome::failed(err.to_string())),
            }
        } else {
            match self.resolve_via_tautulli(&tautulli, &movie).await {
                Ok((history, resolved_key)) => {
                    if movie.rating_key.is_none() {
                        movie.rating_key = resolved_key;
                    }
                    history
                }
                Err(HandlerError::Provider(err)) => {
                    return Ok(ItemOutcome::failed(err.to_string()));
                }
                Err(err) => return Err(err),
            }
        };

        if history.is_empty() {
            movie.watched = false;
            movie.watch_count = 0;
            movie.last_watched_date = None;
            movie.last_watched_user = None;
            self.library.update_movie(&movie).await?;
            return Ok(ItemOutcome::Completed(json!({ "watched": false })));
        }

        movie.watched = true;
        movie.watch_count = history.len() as i64;
        let most_recent = &history[0];
        movie.last_watched_date = epoch_to_iso(most_recent.date);
        movie.last_watched_user = Some(
            most_recent
                .user
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
        );
        if let Err(err) = self.library.update_movie(&movie).await {
            warn!(%err, "failed to persist watch history");
            return Err(err.into());
        }

        Ok(ItemOutcome::Completed(json!({
            "watched": true,
            "watch_count": movie.watch_count,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epochs_render_as_rfc3339() {
        let iso = epoch_to_iso(1_700_000_000).unwrap();
        assert!(iso.starts_with("2023-11-14T"));
        assert!(iso.ends_with('Z'));
    }
}
