// TMDB client
// Only used for live artwork of whatever is currently playing; synced artwork
// comes from the image index instead.
// API Documentation: https://developer.themoviedb.org/reference/intro/getting-started

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

/// TMDB API client
pub struct TmdbClient {
    client: Client,
    api_key: String,
}

/// Which TMDB collection an id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmdbKind {
    Movie,
    Tv,
}

impl TmdbKind {
    fn as_str(&self) -> &'static str {
        match self {
            TmdbKind::Movie => "movie",
            TmdbKind::Tv => "tv",
        }
    }
}

/// w1280 - large backdrop
const BACKDROP_SIZE: &str = "w1280";

#[derive(Debug, Default, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub backdrops: Vec<ImageFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageFile {
    pub file_path: String,
    pub width: u32,
}

/// Full TMDB image URL for a `file_path` such as "/abc123.jpg"
pub fn image_url(file_path: &str, size: &str) -> String {
    format!("{}/{}{}", TMDB_IMAGE_BASE, size, file_path)
}

/// Widest images first, at most `limit`
fn widest(mut images: Vec<ImageFile>, limit: usize) -> Vec<ImageFile> {
    images.sort_by(|a, b| b.width.cmp(&a.width));
    images.truncate(limit);
    images
}

impl TmdbClient {
    /// Create a new TMDB client
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build TMDB HTTP client")?;

        Ok(Self { client, api_key })
    }

    /// Get all images TMDB has for a movie or show
    pub async fn get_images(&self, kind: TmdbKind, tmdb_id: i64) -> Result<ImagesResponse> {
        let url = format!(
            "{}/{}/{}/images?api_key={}",
            TMDB_API_BASE,
            kind.as_str(),
            tmdb_id,
            self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to get TMDB images")?;

        if !response.status().is_success() {
            anyhow::bail!("TMDB API error: {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse TMDB images response")
    }

    /// Up to `limit` large backdrop URLs, widest first. Errors yield an empty list.
    pub async fn backdrop_urls(&self, kind: TmdbKind, tmdb_id: i64, limit: usize) -> Vec<String> {
        match self.get_images(kind, tmdb_id).await {
            Ok(images) => widest(images.backdrops, limit)
                .iter()
                .map(|image| image_url(&image.file_path, BACKDROP_SIZE))
                .collect(),
            Err(e) => {
                tracing::error!("Error fetching TMDB images for {}: {:#}", tmdb_id, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(path: &str, width: u32) -> ImageFile {
        ImageFile {
            file_path: path.to_string(),
            width,
        }
    }

    #[test]
    fn test_image_url() {
        assert_eq!(
            image_url("/abc.jpg", BACKDROP_SIZE),
            "https://image.tmdb.org/t/p/w1280/abc.jpg"
        );
    }

    #[test]
    fn test_widest_sorts_and_limits() {
        let images = vec![
            image("/a.jpg", 1280),
            image("/b.jpg", 3840),
            image("/c.jpg", 1920),
            image("/d.jpg", 640),
        ];

        let paths: Vec<String> = widest(images, 3)
            .into_iter()
            .map(|i| i.file_path)
            .collect();
        assert_eq!(paths, vec!["/b.jpg", "/c.jpg", "/a.jpg"]);
    }

    #[test]
    fn test_parse_images_response() {
        let response: ImagesResponse = serde_json::from_str(
            r#"{"id": 27205, "backdrops": [{"file_path": "/x.jpg", "width": 1920, "height": 1080, "vote_average": 5.2}]}"#,
        )
        .unwrap();
        assert_eq!(response.backdrops.len(), 1);
        assert_eq!(response.backdrops[0].width, 1920);
        assert_eq!(TmdbKind::Tv.as_str(), "tv");
    }
}
