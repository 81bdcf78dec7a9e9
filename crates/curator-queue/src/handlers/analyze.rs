//! `analyze` handler: probe a media file and write the technical fields back
//! to the owning movie or episode row.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::warn;

use curator_providers::{ProbeReport, ProviderFactory};
use curator_store::{LogLevel, LogStore, MediaLibrary, NewLogEntry};
use curator_types::{AnalyzePayload, ItemOutcome};

use crate::handler::{HandlerContext, HandlerError, TaskHandler};
use crate::handlers::WORKER_LOGGER;

pub struct AnalyzeHandler {
    library: Arc<dyn MediaLibrary>,
    logs: Arc<dyn LogStore>,
    providers: Arc<dyn ProviderFactory>,
}

impl AnalyzeHandler {
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

    async fn log_probe_failure(&self, message: String) {
        warn!("{message}");
        if let Err(err) = self
            .logs
            .append_log(
                &NewLogEntry::new(LogLevel::Warning, WORKER_LOGGER, message)
                    .module("queue")
                    .function("analyze"),
            )
            .await
        {
            warn!(%err, "failed to persist analyze log entry");
        }
    }

    async fn analyze_movie(
        &self,
        movie_id: i64,
    ) -> Result<ItemOutcome, HandlerError> {
        let Some(mut movie) = self.library.get_movie(movie_id).await? else {
            return Ok(ItemOutcome::failed("movie not found or missing file_path"));
        };
        let Some(file_path) = movie.file_path.clone() else {
            return Ok(ItemOutcome::failed("movie not found or missing file_path"));
        };

        match self.providers.media_probe().probe(Path::new(&file_path)).await {
            Ok(report) => {
                apply_movie_report(&mut movie, &report);
                movie.media_info_scanned = true;
                movie.media_info_failed = false;
                self.library.update_movie(&movie).await?;
                Ok(ItemOutcome::Completed(json!({ "found": true })))
            }
            Err(err) => {
                movie.media_info_failed = true;
                self.library.update_movie(&movie).await?;
                self.log_probe_failure(format!(
                    "Analyze failed for movie_id={movie_id}: {err}"
                ))
                .await;
                Ok(ItemOutcome::failed(err.to_string()))
            }
        }
    }

    async fn analyze_episode(
        &self,
        episode_id: i64,
    ) -> Result<ItemOutcome, HandlerError> {
        let Some(mut episode) = self.library.get_episode(episode_id).await? else {
            return Ok(ItemOutcome::failed(
                "episode not found or missing file_path",
            ));
        };
        let Some(file_path) = episode.file_path.clone() else {
            return Ok(ItemOutcome::failed(
                "episode not found or missing file_path",
            ));
        };

        match self.providers.media_probe().probe(Path::new(&file_path)).await {
            Ok(report) => {
                episode.video_codec = report.video_codec.clone();
                episode.video_resolution = report.video_resolution.clone();
                episode.video_width = report.video_width;
                episode.video_height = report.video_height;
                episode.audio_codec = report.audio_codec.clone();
                episode.audio_channels = report.audio_channels.clone();
                episode.media_info_scanned = true;
                episode.media_info_failed = false;
                self.library.update_episode(&episode).await?;
                Ok(ItemOutcome::Completed(json!({ "found": true })))
            }
            Err(err) => {
                episode.media_info_failed = true;
                self.library.update_episode(&episode).await?;
                self.log_probe_failure(format!(
                    "Analyze failed for episode_id={episode_id}: {err}"
                ))
                .await;
                Ok(ItemOutcome::failed(err.to_string()))
            }
        }
    }
}

fn apply_movie_report(movie: &mut curator_store::MovieRecord, report: &ProbeReport) {
    movie.duration = report.duration;
    movie.container = report.container.clone();
    movie.video_codec = report.video_codec.clone();
    movie.video_profile = report.video_profile.clone();
    movie.video_resolution = report.video_resolution.clone();
    movie.video_width = report.video_width;
    movie.video_height = report.video_height;
    movie.video_aspect_ratio = report.video_aspect_ratio.clone();
    movie.video_bitrate = report.video_bitrate;
    movie.video_framerate = report.video_framerate.clone();
    movie.video_hdr = report.video_hdr.clone();
    movie.audio_codec = report.audio_codec.clone();
    movie.audio_channels = report.audio_channels.clone();
    movie.audio_bitrate = report.audio_bitrate;
    movie.audio_language = report.audio_language.clone();
    movie.subtitle_count = Some(report.subtitle_count);
    movie.subtitle_languages =
        serde_json::to_string(&report.subtitle_languages).ok();
}

#[async_trait]
impl TaskHandler for AnalyzeHandler {
    async fn handle(
        &self,
        _ctx: &HandlerContext,
        payload: &Value,
    ) -> Result<ItemOutcome, HandlerError> {
        let payload: AnalyzePayload = match serde_json::from_value(payload.clone()) {
            Ok(p) => p,
            Err(_) => return Ok(ItemOutcome::failed("no id provided")),
        };
        match payload {
            AnalyzePayload::Movie { movie_id } => self.analyze_movie(movie_id).await,
            AnalyzePayload::Episode { episode_id } => self.analyze_episode(episode_id).await,
        }
    }
}
