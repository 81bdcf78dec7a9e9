//! Plex client; rating-key resolution against a Plex Media Server.
//!
//! Plex answers JSON when asked (`Accept: application/json`); results carry a
//! `ratingKey` and agent guids in assorted shapes
//! (`com.plexapp.agents.imdb://tt1234567?lang=en`, `imdb://tt1234567`), so
//! IMDB matching falls back to a substring scan over the raw object.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::traits::MediaServer;
use crate::types::PlexItem;

const PLEX_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PlexClient {
    client: reqwest::Client,
    host: String,
    token: String,
}

fn rating_key_of(item: &Value) -> Option<i64> {
    for key in ["ratingKey", "rating_key", "ratingkey"] {
        match &item[key] {
            Value::Number(n) => return n.as_i64(),
            Value::String(s) => {
                if let Ok(parsed) = s.parse() {
                    return Some(parsed);
                }
            }
            _ => {}
        }
    }
    None
}

impl PlexClient {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(PLEX_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn request(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ProviderError> {
        let url = format!("{}{path}", self.host);
        debug!(%url, "Plex request");
        let response = self
            .client
            .get(&url)
            .query(params)
            .header("X-Plex-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), path, "Plex API error");
            return Err(ProviderError::Http(format!(
                "Plex returned {} for {path}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MediaServer for PlexClient {
    async fn search(&self, query: &str) -> Result<Vec<PlexItem>, ProviderError> {
        let data = self
            .request("/search", &[("query", query.to_string())])
            .await?;
        let items = data["MediaContainer"]["Metadata"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| PlexItem {
                        rating_key: rating_key_of(entry),
                        raw: entry.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(items)
    }

    async fn rating_key_by_imdb(&self, imdb_id: &str) -> Result<Option<i64>, ProviderError> {
        for query in [imdb_id, imdb_id.trim_start_matches("tt")] {
            let results = self.search(query).await?;
            for item in &results {
                if let Some(rating_key) = item.rating_key {
                    let text = item.raw.to_string();
                    if text.contains(imdb_id) || results.len() == 1 {
                        return Ok(Some(rating_key));
                    }
                }
            }
            // A direct guid query with no match: fall through to the
            // tt-stripped retry.
        }
        Ok(None)
    }
}
