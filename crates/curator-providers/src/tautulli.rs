//! Tautulli client (api/v2); watch-history queries.
//!
//! Every call goes through the single-endpoint command envelope; a payload
//! only counts when `response.result == "success"`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::traits::HistoryProvider;
use crate::types::{HistoryEntry, TautulliHit};

const TAUTULLI_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TautulliClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

fn int_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_history(entries: &[Value]) -> Vec<HistoryEntry> {
    entries
        .iter()
        .map(|entry| HistoryEntry {
            date: int_of(&entry["date"]).unwrap_or(0),
            user: entry["user"].as_str().map(String::from),
            rating_key: int_of(&entry["rating_key"]),
            raw: entry.clone(),
        })
        .collect()
}

impl TautulliClient {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(TAUTULLI_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: format!("{}/api/v2", host.into().trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }

    async fn command(
        &self,
        cmd: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ProviderError> {
        debug!(cmd, "Tautulli request");
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("apikey", self.api_key.as_str()), ("cmd", cmd)])
            .query(params)
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), cmd, "Tautulli API error");
            return Err(ProviderError::Http(format!(
                "Tautulli returned {} for {cmd}",
                response.status()
            )));
        }
        let data: Value = response.json().await?;
        if data["response"]["result"].as_str() != Some("success") {
            let message = data["response"]["message"]
                .as_str()
                .unwrap_or("unknown error");
            warn!(cmd, message, "Tautulli command failed");
            return Err(ProviderError::Parse(format!(
                "Tautulli {cmd} failed: {message}"
            )));
        }
        Ok(data["response"]["data"].clone())
    }

    async fn history(
        &self,
        rating_key: Option<i64>,
        length: u32,
    ) -> Result<Vec<HistoryEntry>, ProviderError> {
        let mut params = vec![
            ("length", length.to_string()),
            ("order_column", "date".to_string()),
            ("order_dir", "desc".to_string()),
        ];
        if let Some(rating_key) = rating_key {
            params.push(("rating_key", rating_key.to_string()));
        }
        let data = self.command("get_history", &params).await?;
        Ok(data["data"]
            .as_array()
            .map(|entries| parse_history(entries))
            .unwrap_or_default())
    }
}

#[async_trait]
impl HistoryProvider for TautulliClient {
    async fn history_for_key(
        &self,
        rating_key: i64,
    ) -> Result<Vec<HistoryEntry>, ProviderError> {
        self.history(Some(rating_key), 100).await
    }

    async fn search(&self, query: &str) -> Result<Vec<TautulliHit>, ProviderError> {
        let data = self
            .command("search", &[("query", query.to_string())])
            .await?;
        let hits = data["results"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .map(|r| TautulliHit {
                        rating_key: int_of(&r["rating_key"]),
                        media_type: r["media_type"].as_str().map(String::from),
                        year: int_of(&r["year"]).map(|y| y as i32),
                        raw: r.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(hits)
    }

    async fn recent_history(&self, length: u32) -> Result<Vec<HistoryEntry>, ProviderError> {
        self.history(None, length).await
    }
}
