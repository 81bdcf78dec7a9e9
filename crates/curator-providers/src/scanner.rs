//! Filesystem directory scanner.
//!
//! Movie scans collect video files anywhere under the path; TV scans collect
//! show folders (immediate subdirectories that contain at least one video
//! file at any depth). Title/year parsing is deliberately light; the
//! full renaming heuristics live elsewhere in the server.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use curator_types::MediaType;

use crate::error::ProviderError;
use crate::traits::DirectoryScanner;
use crate::types::ScannedEntry;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "m4v", "wmv", "ts", "webm", "mpg", "mpeg",
];

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Strip release noise from a file stem: dots and underscores become spaces,
/// and a trailing `(2023)` / `[2023]` style year marker is removed.
fn clean_title(stem: &str) -> (String, Option<i32>) {
    let spaced = stem.replace(['.', '_'], " ");
    let words: Vec<&str> = spaced.split_whitespace().collect();
    let mut year = None;
    let mut cut = words.len();
    for (i, word) in words.iter().enumerate() {
        let trimmed = word.trim_matches(|c| matches!(c, '(' | ')' | '[' | ']'));
        if trimmed.len() == 4 {
            if let Ok(parsed) = trimmed.parse::<i32>() {
                if (1900..2100).contains(&parsed) {
                    year = Some(parsed);
                    cut = i;
                }
            }
        }
    }
    let title = words[..cut].join(" ");
    let title = if title.is_empty() { words.join(" ") } else { title };
    (title, year)
}

/// Scanner over the local filesystem.
pub struct WalkdirScanner;

impl WalkdirScanner {
    pub fn new() -> Self {
        Self
    }

    fn scan_movies(path: &Path) -> Vec<ScannedEntry> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_type().is_file() && is_video_file(entry.path()) {
                let stem = entry
                    .path()
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default();
                let (title, year) = clean_title(stem);
                entries.push(ScannedEntry {
                    path: entry.path().display().to_string(),
                    title,
                    year,
                });
            }
        }
        entries
    }

    fn scan_shows(path: &Path) -> Vec<ScannedEntry> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_dir() {
                continue;
            }
            let has_video = WalkDir::new(entry.path())
                .follow_links(false)
                .into_iter()
                .filter_map(Result::ok)
                .any(|e| e.file_type().is_file() && is_video_file(e.path()));
            if has_video {
                let name = entry.file_name().to_string_lossy().to_string();
                let (title, year) = clean_title(&name);
                entries.push(ScannedEntry {
                    path: entry.path().display().to_string(),
                    title,
                    year,
                });
            }
        }
        entries
    }
}

impl Default for WalkdirScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryScanner for WalkdirScanner {
    async fn scan(
        &self,
        path: &Path,
        media_type: MediaType,
    ) -> Result<Vec<ScannedEntry>, ProviderError> {
        if !path.is_dir() {
            return Err(ProviderError::Io(format!(
                "not a directory: {}",
                path.display()
            )));
        }
        let path = path.to_path_buf();
        // Directory walking is blocking I/O; keep it off the async runtime.
        let entries = tokio::task::spawn_blocking(move || match media_type {
            MediaType::Movie => Self::scan_movies(&path),
            MediaType::Tv => Self::scan_shows(&path),
        })
        .await
        .map_err(|e| ProviderError::Io(e.to_string()))?;
        debug!(found = entries.len(), "directory scan finished");
        Ok(entries)
    }
}
