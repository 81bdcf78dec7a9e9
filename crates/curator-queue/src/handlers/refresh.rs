//! `refresh_metadata` handler.
//!
//! Resolution order for a movie: payload overrides, TMDB variant/fuzzy
//! search, OMDb fallback. A run where no provider has anything is a
//! successful no-op, recorded with the queries that were tried so operators
//! can see what was asked. Task meta can force a provider (`provider`) and
//! request ratings enrichment (`include_ratings`).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use curator_providers::{
    MetadataSource, MovieMetadata, ProviderFactory, RatingsBundle, RatingsSource, ShowMetadata,
};
use curator_store::{LogLevel, LogStore, MediaLibrary, MovieRecord, NewLogEntry, ShowRecord};
use curator_types::{ItemOutcome, ProviderChoice, RefreshPayload, RefreshTarget};

use crate::handler::{HandlerContext, HandlerError, TaskHandler};
use crate::handlers::WORKER_LOGGER;
use crate::matching::{TriedQuery, format_tried, resolve_via_search};

const NO_METADATA_NOTE: &str = "no metadata found from TMDB or OMDb";

pub struct RefreshMetadataHandler {
    library: Arc<dyn MediaLibrary>,
    logs: Arc<dyn LogStore>,
    providers: Arc<dyn ProviderFactory>,
}

impl RefreshMetadataHandler {
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

    async fn info_log(&self, message: String) {
        info!("{message}");
        if let Err(err) = self
            .logs
            .append_log(
                &NewLogEntry::new(LogLevel::Info, WORKER_LOGGER, message)
                    .module("queue")
                    .function("refresh_metadata"),
            )
            .await
        {
            warn!(%err, "failed to persist refresh log entry");
        }
    }

    /// TMDB, unless the task meta forces OMDb.
    async fn metadata_source(
        &self,
        forced: Option<ProviderChoice>,
    ) -> Result<Option<Arc<dyn MetadataSource>>, HandlerError> {
        if forced == Some(ProviderChoice::Omdb) {
            return Ok(None);
        }
        Ok(self.providers.metadata_source().await?)
    }

    async fn refresh_movie(
        &self,
        ctx: &HandlerContext,
        movie_id: i64,
        payload: &RefreshPayload,
    ) -> Result<ItemOutcome, HandlerError> {
        let Some(mut movie) = self.library.get_movie(movie_id).await? else {
            return Ok(ItemOutcome::failed("movie not found"));
        };

        let forced = ctx.meta.provider;
        let tmdb = self.metadata_source(forced).await?;
        let omdb = self.providers.ratings_source().await?;

        let search_title = payload
            .title
            .clone()
            .or_else(|| movie.title.clone())
            .unwrap_or_default();
        let search_year = payload.year.or(movie.year);

        let mut tried: Vec<TriedQuery> = Vec::new();
        let mut found: Option<MovieMetadata> = None;
        if let Some(tmdb) = &tmdb {
            found = if let Some(tmdb_id) = payload.tmdb_id {
                lossy(tmdb.movie_details(tmdb_id).await)
            } else if let Some(imdb_id) = &payload.imdb_id {
                lossy(tmdb.movie_by_imdb(imdb_id).await)
            } else {
                let (chosen, attempts) =
                    resolve_via_search(&search_title, search_year, |query, year| {
                        let tmdb = Arc::clone(tmdb);
                        async move { tmdb.search_movies(&query, year).await }
                    })
                    .await;
                tried = attempts;
                match chosen {
                    Some(id) => lossy(tmdb.movie_details(id).await),
                    None => None,
                }
            };
        }

        if let Some(metadata) = found {
            apply_movie_metadata(&mut movie, &metadata);
            movie.scraped = true;
            if ctx.meta.include_ratings() {
                if let (Some(omdb), Some(imdb_id)) = (&omdb, movie.imdb_id.clone()) {
                    if let Some(ratings) = lossy(omdb.ratings_by_imdb(&imdb_id).await) {
                        merge_ratings(&mut movie, &ratings);
                    }
                }
            }
            self.library.update_movie(&movie).await?;
            return Ok(ItemOutcome::Completed(json!({ "updated_from": "tmdb" })));
        }

        if forced != Some(ProviderChoice::Omdb) {
            self.info_log(format!(
                "TMDB search for movie '{search_title}' ({search_year:?}) returned no result. \
                 Tried: {}",
                format_tried(&tried)
            ))
            .await;
        }

        let Some(omdb) = &omdb else {
            return Ok(ItemOutcome::NoOp(json!({ "note": "no provider available" })));
        };
        match lossy(omdb.ratings_by_title(&search_title, search_year).await) {
            Some(ratings) if !ratings.is_empty() => {
                merge_ratings(&mut movie, &ratings);
                movie.scraped = true;
                self.library.update_movie(&movie).await?;
                Ok(ItemOutcome::Completed(json!({ "updated_from": "omdb" })))
            }
            _ => {
                self.info_log(format!(
                    "OMDb search for '{search_title}' ({search_year:?}) returned no result."
                ))
                .await;
                Ok(ItemOutcome::NoOp(json!({
                    "updated_from": null,
                    "note": NO_METADATA_NOTE,
                })))
            }
        }
    }

    async fn refresh_show(
        &self,
        ctx: &HandlerContext,
        show_id: i64,
        payload: &RefreshPayload,
    ) -> Result<ItemOutcome, HandlerError> {
        let Some(mut show) = self.library.get_show(show_id).await? else {
            return Ok(ItemOutcome::failed("show not found"));
        };

        let forced = ctx.meta.provider;
        let tmdb = self.metadata_source(forced).await?;
        let omdb = self.providers.ratings_source().await?;
        if tmdb.is_none() && omdb.is_none() {
            return Ok(ItemOutcome::failed("no metadata provider configured"));
        }

        // An IMDB override is refined through OMDb first: its canonical
        // title/year make the TMDB search far more precise.
        let mut override_title = payload.title.clone();
        let mut override_year = payload.year;
        if let (Some(imdb_id), Some(omdb)) = (&payload.imdb_id, &omdb) {
            if let Some(omdb_show) = lossy(omdb.show_by_imdb(imdb_id).await) {
                if omdb_show.imdb_id.is_some() {
                    if !omdb_show.title.is_empty() {
                        override_title = Some(omdb_show.title.clone());
                    }
                    override_year = omdb_show.start_year().or(override_year);
                }
            }
        }

        let search_title = override_title
            .clone()
            .or_else(|| show.title.clone())
            .unwrap_or_default();
        let search_year = if override_title.is_some() {
            override_year
        } else {
            show.year
        };

        let mut tried: Vec<TriedQuery> = Vec::new();
        let mut found: Option<ShowMetadata> = None;
        if let Some(tmdb) = &tmdb {
            found = if let Some(tmdb_id) = payload.tmdb_id {
                lossy(tmdb.show_details(tmdb_id).await)
            } else {
                let (chosen, attempts) =
                    resolve_via_search(&search_title, search_year, |query, year| {
                        let tmdb = Arc::clone(tmdb);
                        async move { tmdb.search_shows(&query, year).await }
                    })
                    .await;
                tried = attempts;
                match chosen {
                    Some(id) => lossy(tmdb.show_details(id).await),
                    None => None,
                }
            };
        }

        if let Some(metadata) = found {
            apply_show_metadata(&mut show, &metadata);
            show.scraped = true;
            self.library.update_show(&show).await?;
            return Ok(ItemOutcome::Completed(json!({ "updated_from": "tmdb" })));
        }

        if let Some(omdb) = &omdb {
            if let Some(omdb_show) = lossy(omdb.search_show(&search_title, search_year).await) {
                show.title = Some(omdb_show.title.clone());
                show.overview = omdb_show.plot.clone().or(show.overview);
                show.poster_path = omdb_show.poster.clone().or(show.poster_path);
                show.genres = omdb_show.genre.clone().or(show.genres);
                show.imdb_id = omdb_show.imdb_id.clone().or(show.imdb_id);
                show.rating = omdb_show.imdb_rating.or(show.rating);
                show.votes = omdb_show.imdb_votes.or(show.votes);
                show.season_count = omdb_show.total_seasons.or(show.season_count);
                show.scraped = true;
                self.library.update_show(&show).await?;
                return Ok(ItemOutcome::Completed(json!({ "updated_from": "omdb" })));
            }
        }

        self.info_log(format!(
            "TMDB search for show '{search_title}' ({show_id}) returned no result. Tried: {}",
            format_tried(&tried)
        ))
        .await;
        Ok(ItemOutcome::NoOp(json!({
            "updated_from": null,
            "note": NO_METADATA_NOTE,
        })))
    }

    async fn refresh_episode(&self, episode_id: i64) -> Result<ItemOutcome, HandlerError> {
        let Some(mut episode) = self.library.get_episode(episode_id).await? else {
            return Ok(ItemOutcome::failed("episode not found"));
        };
        let show = self.library.get_show(episode.show_id).await?;
        let Some(show_tmdb_id) = show.and_then(|s| s.tmdb_id) else {
            return Ok(ItemOutcome::failed("show missing tmdb id"));
        };
        let Some(tmdb) = self.providers.metadata_source().await? else {
            return Ok(ItemOutcome::failed("tmdb not configured"));
        };

        let episodes = match tmdb
            .season_episodes(show_tmdb_id, episode.season_number)
            .await
        {
            Ok(episodes) => episodes,
            Err(err) => return Ok(ItemOutcome::failed(err.to_string())),
        };
        let Some(info) = episodes
            .iter()
            .find(|e| e.episode_number == episode.episode_number)
        else {
            return Ok(ItemOutcome::failed("episode not found on tmdb"));
        };

        episode.title = Some(info.title.clone());
        episode.overview = info.overview.clone();
        episode.air_date = info.air_date.clone();
        episode.runtime = info.runtime;
        episode.still_path = info.still_path.clone();
        self.library.update_episode(&episode).await?;
        Ok(ItemOutcome::Completed(json!({ "updated_from": "tmdb" })))
    }
}

/// Collapse a provider error into "no result", logging it. Matches how the
/// rest of the resolution ladder degrades on flaky upstreams.
fn lossy<T>(result: Result<Option<T>, curator_providers::ProviderError>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, "provider call failed, treating as no result");
            None
        }
    }
}

fn apply_movie_metadata(movie: &mut MovieRecord, metadata: &MovieMetadata) {
    movie.tmdb_id = Some(metadata.tmdb_id);
    movie.title = Some(metadata.title.clone());
    movie.original_title = metadata.original_title.clone();
    movie.overview = metadata.overview.clone();
    movie.release_date = metadata.release_date.clone();
    movie.runtime = metadata.runtime;
    if !metadata.genres.is_empty() {
        movie.genres = Some(metadata.genres.join(", "));
    }
    movie.poster_path = metadata.poster_path.clone();
    movie.backdrop_path = metadata.backdrop_path.clone();
    movie.imdb_id = metadata.imdb_id.clone().or_else(|| movie.imdb_id.clone());
    movie.rating = metadata.rating;
    movie.votes = metadata.votes;
}

fn apply_show_metadata(show: &mut ShowRecord, metadata: &ShowMetadata) {
    show.tmdb_id = Some(metadata.tmdb_id);
    show.title = Some(metadata.title.clone());
    show.original_title = metadata.original_title.clone();
    show.overview = metadata.overview.clone();
    show.first_air_date = metadata.first_air_date.clone();
    show.last_air_date = metadata.last_air_date.clone();
    show.airing_status = metadata.airing_status.clone();
    if !metadata.genres.is_empty() {
        show.genres = Some(metadata.genres.join(", "));
    }
    show.poster_path = metadata.poster_path.clone();
    show.backdrop_path = metadata.backdrop_path.clone();
    show.imdb_id = metadata.imdb_id.clone().or_else(|| show.imdb_id.clone());
    show.rating = metadata.rating;
    show.votes = metadata.votes;
    show.season_count = metadata.season_count;
    show.episode_count = metadata.episode_count;
}

/// Merge fetched ratings without ever overwriting a stored value with null.
fn merge_ratings(movie: &mut MovieRecord, ratings: &RatingsBundle) {
    movie.imdb_rating = ratings.imdb_rating.or(movie.imdb_rating);
    movie.imdb_votes = ratings.imdb_votes.or(movie.imdb_votes);
    movie.rotten_tomatoes_score = ratings
        .rotten_tomatoes_score
        .or(movie.rotten_tomatoes_score);
    movie.metacritic_score = ratings.metacritic_score.or(movie.metacritic_score);
}

#[async_trait]
impl TaskHandler for RefreshMetadataHandler {
    async fn handle(
        &self,
        ctx: &HandlerContext,
        payload: &Value,
    ) -> Result<ItemOutcome, HandlerError> {
        let payload: RefreshPayload = match serde_json::from_value(payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                return Ok(ItemOutcome::failed(format!("invalid payload: {err}")));
            }
        };
        match payload.target() {
            Some(RefreshTarget::Movie(id)) => self.refresh_movie(ctx, id, &payload).await,
            Some(RefreshTarget::Show(id)) => self.refresh_show(ctx, id, &payload).await,
            Some(RefreshTarget::Episode(id)) => self.refresh_episode(id).await,
            None => Ok(ItemOutcome::failed("no id provided")),
        }
    }
}
