//! TMDB client (api.themoviedb.org).

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::traits::MetadataSource;
use crate::types::{EpisodeMetadata, MovieMetadata, SearchHit, ShowMetadata};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const TMDB_TIMEOUT: Duration = Duration::from_secs(30);

/// Convert a TMDB image path to a full URL.
fn full_image_url(path: Option<&str>, size: &str) -> Option<String> {
    path.map(|p| format!("{TMDB_IMAGE_BASE}/{size}{p}"))
}

fn year_of(date: Option<&str>) -> Option<i32> {
    date?.split('-').next()?.parse().ok()
}

pub struct TmdbClient {
    client: reqwest::Client,
    api_key: String,
    /// API Read Access Tokens are JWTs sent as a bearer header; classic keys
    /// go in the query string.
    use_bearer: bool,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        let use_bearer = api_key.starts_with("eyJ");
        let client = reqwest::Client::builder()
            .timeout(TMDB_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            use_bearer,
        })
    }

    /// GET an endpoint; `Ok(None)` for 404, error for other failures.
    async fn request(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Option<Value>, ProviderError> {
        let url = format!("{TMDB_BASE_URL}{endpoint}");
        debug!(%url, "TMDB request");
        let mut request = self.client.get(&url).query(params);
        if self.use_bearer {
            request = request.bearer_auth(&self.api_key);
        } else {
            request = request.query(&[("api_key", self.api_key.as_str())]);
        }
        let response = request.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            warn!(status = %response.status(), endpoint, "TMDB API error");
            return Err(ProviderError::Http(format!(
                "TMDB returned {} for {endpoint}",
                response.status()
            )));
        }
        Ok(Some(response.json().await?))
    }

    fn parse_search_hits(data: &Value, name_field: &str, date_field: &str) -> Vec<SearchHit> {
        data["results"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .filter_map(|r| {
                        Some(SearchHit {
                            id: r["id"].as_i64()?,
                            title: r[name_field]
                                .as_str()
                                .or_else(|| r["original_title"].as_str())
                                .or_else(|| r["original_name"].as_str())
                                .unwrap_or_default()
                                .to_string(),
                            year: year_of(r[date_field].as_str()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn parse_movie(data: &Value) -> Option<MovieMetadata> {
    Some(MovieMetadata {
        tmdb_id: data["id"].as_i64()?,
        title: data["title"].as_str().unwrap_or_default().to_string(),
        original_title: data["original_title"].as_str().map(String::from),
        overview: data["overview"].as_str().map(String::from),
        release_date: data["release_date"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(String::from),
        runtime: data["runtime"].as_i64(),
        genres: parse_genres(data),
        poster_path: full_image_url(data["poster_path"].as_str(), "w500"),
        backdrop_path: full_image_url(data["backdrop_path"].as_str(), "w1280"),
        imdb_id: data["external_ids"]["imdb_id"].as_str().map(String::from),
        rating: data["vote_average"].as_f64(),
        votes: data["vote_count"].as_i64(),
    })
}

fn parse_show(data: &Value) -> Option<ShowMetadata> {
    Some(ShowMetadata {
        tmdb_id: data["id"].as_i64()?,
        title: data["name"].as_str().unwrap_or_default().to_string(),
        original_title: data["original_name"].as_str().map(String::from),
        overview: data["overview"].as_str().map(String::from),
        first_air_date: data["first_air_date"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(String::from),
        last_air_date: data["last_air_date"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(String::from),
        airing_status: data["status"].as_str().map(String::from),
        genres: parse_genres(data),
        poster_path: full_image_url(data["poster_path"].as_str(), "w500"),
        backdrop_path: full_image_url(data["backdrop_path"].as_str(), "w1280"),
        imdb_id: data["external_ids"]["imdb_id"].as_str().map(String::from),
        rating: data["vote_average"].as_f64(),
        votes: data["vote_count"].as_i64(),
        season_count: data["number_of_seasons"].as_i64(),
        episode_count: data["number_of_episodes"].as_i64(),
    })
}

fn parse_genres(data: &Value) -> Vec<String> {
    data["genres"]
        .as_array()
        .map(|genres| {
            genres
                .iter()
                .filter_map(|g| g["name"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl MetadataSource for TmdbClient {
    async fn search_movies(
        &self,
        query: &str,
        year: Option<i32>,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let mut params = vec![("query", query.to_string())];
        if let Some(year) = year {
            params.push(("year", year.to_string()));
        }
        let data = self.request("/search/movie", &params).await?;
        Ok(data
            .map(|d| Self::parse_search_hits(&d, "title", "release_date"))
            .unwrap_or_default())
    }

    async fn movie_details(&self, id: i64) -> Result<Option<MovieMetadata>, ProviderError> {
        let data = self
            .request(
                &format!("/movie/{id}"),
                &[("append_to_response", "external_ids".to_string())],
            )
            .await?;
        Ok(data.as_ref().and_then(parse_movie))
    }

    async fn movie_by_imdb(&self, imdb_id: &str) -> Result<Option<MovieMetadata>, ProviderError> {
        let imdb_id = if imdb_id.starts_with("tt") {
            imdb_id.to_string()
        } else {
            format!("tt{imdb_id}")
        };
        let data = self
            .request(
                &format!("/find/{imdb_id}"),
                &[("external_source", "imdb_id".to_string())],
            )
            .await?;
        let movie_id = data
            .as_ref()
            .and_then(|d| d["movie_results"].as_array()?.first()?["id"].as_i64());
        match movie_id {
            Some(id) => self.movie_details(id).await,
            None => Ok(None),
        }
    }

    async fn search_shows(
        &self,
        query: &str,
        year: Option<i32>,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let mut params = vec![("query", query.to_string())];
        if let Some(year) = year {
            params.push(("first_air_date_year", year.to_string()));
        }
        let data = self.request("/search/tv", &params).await?;
        Ok(data
            .map(|d| Self::parse_search_hits(&d, "name", "first_air_date"))
            .unwrap_or_default())
    }

    async fn show_details(&self, id: i64) -> Result<Option<ShowMetadata>, ProviderError> {
        let data = self
            .request(
                &format!("/tv/{id}"),
                &[("append_to_response", "external_ids".to_string())],
            )
            .await?;
        Ok(data.as_ref().and_then(parse_show))
    }

    async fn season_episodes(
        &self,
        show_id: i64,
        season_number: i64,
    ) -> Result<Vec<EpisodeMetadata>, ProviderError> {
        let data = self
            .request(&format!("/tv/{show_id}/season/{season_number}"), &[])
            .await?;
        let Some(data) = data else {
            return Ok(Vec::new());
        };
        let episodes = data["episodes"]
            .as_array()
            .map(|episodes| {
                episodes
                    .iter()
                    .map(|ep| EpisodeMetadata {
                        season_number: ep["season_number"].as_i64().unwrap_or(season_number),
                        episode_number: ep["episode_number"].as_i64().unwrap_or(0),
                        title: ep["name"].as_str().unwrap_or_default().to_string(),
                        overview: ep["overview"].as_str().map(String::from),
                        air_date: ep["air_date"]
                            .as_str()
                            .filter(|s| !s.is_empty())
                            .map(String::from),
                        runtime: ep["runtime"].as_i64(),
                        still_path: full_image_url(ep["still_path"].as_str(), "w500"),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(episodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn image_urls_expand_by_size() {
        assert_eq!(
            full_image_url(Some("/abc.jpg"), "w500").as_deref(),
            Some("https://image.tmdb.org/t/p/w500/abc.jpg")
        );
        assert_eq!(full_image_url(None, "w500"), None);
    }

    #[test]
    fn parses_movie_details_payload() {
        let data = json!({
            "id": 12345,
            "title": "Updated Title",
            "original_title": "Updated Title",
            "overview": "A test movie.",
            "release_date": "2023-03-14",
            "runtime": 117,
            "genres": [{"id": 18, "name": "Drama"}],
            "poster_path": "/p.jpg",
            "backdrop_path": "/b.jpg",
            "external_ids": {"imdb_id": "tt0012345"},
            "vote_average": 7.6,
            "vote_count": 4321
        });
        let movie = parse_movie(&data).unwrap();
        assert_eq!(movie.tmdb_id, 12345);
        assert_eq!(movie.title, "Updated Title");
        assert_eq!(movie.genres, vec!["Drama".to_string()]);
        assert_eq!(movie.imdb_id.as_deref(), Some("tt0012345"));
        assert_eq!(
            movie.poster_path.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/p.jpg")
        );
    }

    #[test]
    fn empty_release_date_becomes_none() {
        let data = json!({"id": 1, "title": "X", "release_date": ""});
        let movie = parse_movie(&data).unwrap();
        assert_eq!(movie.release_date, None);
    }

    #[test]
    fn search_hits_parse_year_from_date() {
        let data = json!({"results": [
            {"id": 1, "title": "Heat", "release_date": "1995-12-15"},
            {"id": 2, "title": "Heat", "release_date": ""},
        ]});
        let hits = TmdbClient::parse_search_hits(&data, "title", "release_date");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].year, Some(1995));
        assert_eq!(hits[1].year, None);
    }
}
