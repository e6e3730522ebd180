// Trakt API client
// The exported JSON covers everything historical; the only live call is
// "what is the user watching right now".
// API Documentation: https://trakt.docs.apiary.io/#reference/users/watching

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::models::{TraktEpisode, TraktMovie, TraktShow};

const TRAKT_API_BASE: &str = "https://api.trakt.tv";
const TRAKT_API_VERSION: &str = "2";

pub struct TraktClient {
    client: Client,
    api_key: String,
}

/// Body of GET /users/{id}/watching
#[derive(Debug, Clone, Deserialize)]
pub struct WatchingResponse {
    pub started_at: String,
    pub expires_at: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub movie: Option<TraktMovie>,
    #[serde(default)]
    pub show: Option<TraktShow>,
    #[serde(default)]
    pub episode: Option<TraktEpisode>,
}

impl TraktClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build Trakt HTTP client")?;

        Ok(Self { client, api_key })
    }

    /// What `username` is playing right now. `None` when idle (HTTP 204).
    pub async fn watching(&self, username: &str) -> Result<Option<WatchingResponse>> {
        let url = format!(
            "{}/users/{}/watching",
            TRAKT_API_BASE,
            urlencoding::encode(username)
        );

        let response = self
            .client
            .get(&url)
            .header("Content-Type", "application/json")
            .header("trakt-api-version", TRAKT_API_VERSION)
            .header("trakt-api-key", &self.api_key)
            .send()
            .await
            .context("Failed to reach Trakt")?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        if !response.status().is_success() {
            anyhow::bail!("Trakt API error: {}", response.status());
        }

        let watching = response
            .json()
            .await
            .context("Failed to parse Trakt watching response")?;

        Ok(Some(watching))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_episode_watching() {
        let watching: WatchingResponse = serde_json::from_str(
            r#"{
                "expires_at": "2025-01-01T01:00:00.000Z",
                "started_at": "2025-01-01T00:00:00.000Z",
                "action": "scrobble",
                "type": "episode",
                "episode": {"season": 1, "number": 2, "title": "Lies", "ids": {"trakt": 1, "tvdb": 2, "imdb": "tt1", "tmdb": 3}},
                "show": {"title": "Dark", "year": 2017, "ids": {"trakt": 4, "slug": "dark", "tvdb": 5, "imdb": "tt2", "tmdb": 70523}}
            }"#,
        )
        .unwrap();

        assert_eq!(watching.item_type, "episode");
        assert!(watching.movie.is_none());
        assert_eq!(watching.show.unwrap().ids.tmdb, Some(70523));
        assert_eq!(watching.episode.unwrap().number, 2);
    }
}
