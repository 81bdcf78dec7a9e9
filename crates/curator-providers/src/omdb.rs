//! OMDb client (omdbapi.com); ratings from IMDB, Rotten Tomatoes, and
//! Metacritic, plus TV-show lookups for IMDB-id overrides.
//!
//! OMDb reports missing values as the literal string `"N/A"` and formats
//! vote counts with comma grouping; both are normalized here.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::traits::RatingsSource;
use crate::types::{OmdbShow, RatingsBundle};

const OMDB_BASE_URL: &str = "https://www.omdbapi.com";
const OMDB_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OmdbClient {
    client: reqwest::Client,
    api_key: String,
}

fn non_na(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty() && *s != "N/A")
}

fn parse_f64(value: &Value) -> Option<f64> {
    non_na(value)?.parse().ok()
}

fn parse_grouped_int(value: &Value) -> Option<i64> {
    non_na(value)?.replace(',', "").parse().ok()
}

fn parse_ratings(data: &Value) -> RatingsBundle {
    let mut ratings = RatingsBundle {
        imdb_rating: parse_f64(&data["imdbRating"]),
        imdb_votes: parse_grouped_int(&data["imdbVotes"]),
        rotten_tomatoes_score: None,
        metacritic_score: non_na(&data["Metascore"]).and_then(|s| s.parse().ok()),
    };
    if let Some(sources) = data["Ratings"].as_array() {
        for entry in sources {
            if entry["Source"].as_str() == Some("Rotten Tomatoes") {
                ratings.rotten_tomatoes_score = entry["Value"]
                    .as_str()
                    .and_then(|v| v.trim_end_matches('%').parse().ok());
            }
        }
    }
    ratings
}

fn parse_show(data: &Value) -> OmdbShow {
    OmdbShow {
        title: data["Title"].as_str().unwrap_or_default().to_string(),
        year: non_na(&data["Year"]).map(String::from),
        imdb_id: non_na(&data["imdbID"]).map(String::from),
        plot: non_na(&data["Plot"]).map(String::from),
        poster: non_na(&data["Poster"]).map(String::from),
        genre: non_na(&data["Genre"]).map(String::from),
        total_seasons: non_na(&data["totalSeasons"]).and_then(|s| s.parse().ok()),
        imdb_rating: parse_f64(&data["imdbRating"]),
        imdb_votes: parse_grouped_int(&data["imdbVotes"]),
    }
}

fn normalize_imdb_id(imdb_id: &str) -> String {
    if imdb_id.starts_with("tt") {
        imdb_id.to_string()
    } else {
        format!("tt{imdb_id}")
    }
}

impl OmdbClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(OMDB_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    /// GET with the api key attached; `Ok(None)` when OMDb answers
    /// `Response: "False"` (not found).
    async fn request(&self, params: &[(&str, String)]) -> Result<Option<Value>, ProviderError> {
        debug!(?params, "OMDb request");
        let response = self
            .client
            .get(OMDB_BASE_URL)
            .query(&[("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "OMDb API error");
            return Err(ProviderError::Http(format!(
                "OMDb returned {}",
                response.status()
            )));
        }
        let data: Value = response.json().await?;
        if data["Response"].as_str() == Some("False") {
            debug!(error = ?data["Error"].as_str(), "OMDb: no result");
            return Ok(None);
        }
        Ok(Some(data))
    }
}

#[async_trait]
impl RatingsSource for OmdbClient {
    async fn ratings_by_imdb(
        &self,
        imdb_id: &str,
    ) -> Result<Option<RatingsBundle>, ProviderError> {
        let data = self
            .request(&[
                ("i", normalize_imdb_id(imdb_id)),
                ("plot", "short".to_string()),
            ])
            .await?;
        Ok(data.as_ref().map(parse_ratings))
    }

    async fn ratings_by_title(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<RatingsBundle>, ProviderError> {
        let mut params = vec![
            ("t", title.to_string()),
            ("type", "movie".to_string()),
            ("plot", "short".to_string()),
        ];
        if let Some(year) = year {
            params.push(("y", year.to_string()));
        }
        let data = self.request(&params).await?;
        Ok(data.as_ref().map(parse_ratings))
    }

    async fn show_by_imdb(&self, imdb_id: &str) -> Result<Option<OmdbShow>, ProviderError> {
        let data = self
            .request(&[
                ("i", normalize_imdb_id(imdb_id)),
                ("type", "series".to_string()),
                ("plot", "full".to_string()),
            ])
            .await?;
        Ok(data.as_ref().map(parse_show))
    }

    async fn search_show(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<OmdbShow>, ProviderError> {
        let mut params = vec![
            ("t", title.to_string()),
            ("type", "series".to_string()),
            ("plot", "full".to_string()),
        ];
        if let Some(year) = year {
            params.push(("y", year.to_string()));
        }
        let data = self.request(&params).await?;
        Ok(data.as_ref().map(parse_show))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_ratings_with_na_values() {
        let data = json!({
            "imdbRating": "7.5",
            "imdbVotes": "1,234,567",
            "Metascore": "N/A",
            "Ratings": [
                {"Source": "Internet Movie Database", "Value": "7.5/10"},
                {"Source": "Rotten Tomatoes", "Value": "85%"}
            ]
        });
        let ratings = parse_ratings(&data);
        assert_eq!(ratings.imdb_rating, Some(7.5));
        assert_eq!(ratings.imdb_votes, Some(1_234_567));
        assert_eq!(ratings.rotten_tomatoes_score, Some(85));
        assert_eq!(ratings.metacritic_score, None);
    }

    #[test]
    fn all_na_yields_empty_bundle() {
        let data = json!({"imdbRating": "N/A", "imdbVotes": "N/A", "Metascore": "N/A"});
        assert!(parse_ratings(&data).is_empty());
    }

    #[test]
    fn show_start_year_handles_ranges() {
        let show = parse_show(&json!({"Title": "Breaking Bad", "Year": "2008–2013"}));
        assert_eq!(show.start_year(), Some(2008));
        let show = parse_show(&json!({"Title": "One-off", "Year": "N/A"}));
        assert_eq!(show.start_year(), None);
    }

    #[test]
    fn imdb_ids_get_tt_prefix() {
        assert_eq!(normalize_imdb_id("0903747"), "tt0903747");
        assert_eq!(normalize_imdb_id("tt0903747"), "tt0903747");
    }
}
