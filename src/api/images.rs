// Image API - redirects to synced artwork through the resizing proxy

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    services::{
        image_index::{ImageCategory, ImageMatch, IndexStats, MediaType},
        proxy::{BACKGROUND_PARAMS, POSTER_PARAMS},
    },
    AppState,
};

use super::error::ApiError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_image))
        .route("/thumbnails", get(get_thumbnail))
        .route("/reload-cache", post(reload_cache))
        .route("/random-backdrop", get(random_backdrop))
}

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub category: Option<String>,
    pub tmdb_id: Option<String>,
    pub season: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ThumbnailQuery {
    pub category: Option<String>,
    pub tmdb_id: Option<String>,
}

fn parse_category(category: &str) -> Result<ImageCategory, ApiError> {
    category
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid category. Must be \"posters\" or \"backdrops\""))
}

/// 302 to the proxied primary file, 404 when nothing is indexed
fn redirect_to_primary(state: &AppState, found: &ImageMatch) -> Result<Response, ApiError> {
    let filename = found
        .primary()
        .ok_or_else(|| ApiError::not_found("No images found for the specified parameters"))?;

    let cdn_url = state.proxy.cdn_url(&found.base_path, filename);
    let location = state.proxy.proxied(&cdn_url, POSTER_PARAMS);

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// GET /api/images?type=movies&category=posters&tmdb_id=27205[&season=1]
async fn get_image(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ImageQuery>,
) -> Result<Response, ApiError> {
    let (Some(media_type), Some(category), Some(tmdb_id)) =
        (query.media_type, query.category, query.tmdb_id)
    else {
        return Err(ApiError::bad_request(
            "Missing required parameters: type, category, and tmdb_id are required",
        ));
    };

    let media_type: MediaType = media_type
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid type. Must be \"movies\" or \"shows\""))?;
    let category = parse_category(&category)?;

    let season = query.season.filter(|s| !s.is_empty());
    let found = state
        .images
        .find_images(media_type, category, &tmdb_id, season.as_deref())
        .await;

    redirect_to_primary(&state, &found)
}

/// GET /api/images/thumbnails?category=posters&tmdb_id=27205
async fn get_thumbnail(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ThumbnailQuery>,
) -> Result<Response, ApiError> {
    let (Some(category), Some(tmdb_id)) = (query.category, query.tmdb_id) else {
        return Err(ApiError::bad_request(
            "Missing required parameters: category and tmdb_id are required",
        ));
    };

    let category = parse_category(&category)?;
    let found = state.images.find_thumbnails(category, &tmdb_id).await;

    redirect_to_primary(&state, &found)
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub message: String,
    pub stats: IndexStats,
}

/// POST /api/images/reload-cache
async fn reload_cache(State(state): State<Arc<AppState>>) -> Json<ReloadResponse> {
    let stats = state.images.reload().await.stats();

    Json(ReloadResponse {
        success: true,
        message: "Image index reloaded successfully".to_string(),
        stats,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomBackdropResponse {
    pub url: String,
    pub tmdb_id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub filename: String,
}

/// GET /api/images/random-backdrop - URL for a fullscreen background
async fn random_backdrop(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RandomBackdropResponse>, ApiError> {
    let backdrop = state
        .images
        .random_backdrop()
        .await
        .ok_or_else(|| ApiError::not_found("No backdrop images found"))?;

    let cdn_url = state
        .proxy
        .cdn_url(&backdrop.base_path(), &backdrop.filename);

    Ok(Json(RandomBackdropResponse {
        url: state.proxy.proxied(&cdn_url, BACKGROUND_PARAMS),
        tmdb_id: backdrop.tmdb_id,
        media_type: backdrop.media_type,
        filename: backdrop.filename,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{body_json, get, post, test_app};
    use axum::http::{header, StatusCode};

    #[tokio::test]
    async fn test_image_redirects_to_primary_file() {
        let (_dir, app) = test_app().await;

        let response = get(&app, "/api/images?type=movies&category=posters&tmdb_id=27205").await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://wsrv.nl/?url="));
        assert!(location.contains("movies%2Fposters%2F27205_poster.jpg"));
        assert!(location.ends_with("&w=400&output=webp&q=90&maxage=31d"));
    }

    #[tokio::test]
    async fn test_season_poster_redirect() {
        let (_dir, app) = test_app().await;

        let response = get(&app, "/api/images?type=shows&category=posters&tmdb_id=1399&season=1").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.contains("shows%2Fposters%2F1399%2F1%2F1399_s1_poster.jpg"));
    }

    #[tokio::test]
    async fn test_image_unknown_id_is_404() {
        let (_dir, app) = test_app().await;

        let response = get(&app, "/api/images?type=movies&category=posters&tmdb_id=999").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "No images found for the specified parameters");
    }

    #[tokio::test]
    async fn test_image_parameter_validation() {
        let (_dir, app) = test_app().await;

        let response = get(&app, "/api/images?type=movies&tmdb_id=27205").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get(&app, "/api/images?type=books&category=posters&tmdb_id=1").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Invalid type. Must be \"movies\" or \"shows\""
        );

        let response = get(&app, "/api/images?type=movies&category=logos&tmdb_id=1").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_thumbnail_redirect() {
        let (_dir, app) = test_app().await;

        let response = get(&app, "/api/images/thumbnails?category=posters&tmdb_id=27205").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.contains("thumbnails%2Fthumb_27205_poster.jpg"));

        let response = get(&app, "/api/images/thumbnails?category=backdrops&tmdb_id=27205").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reload_cache_reports_stats() {
        let (_dir, app) = test_app().await;

        let response = post(&app, "/api/images/reload-cache").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["stats"]["moviePosters"], 2);
        assert_eq!(body["stats"]["showBackdrops"], 1);
        assert_eq!(body["stats"]["thumbnailPosters"], 1);
    }

    #[tokio::test]
    async fn test_random_backdrop() {
        let (_dir, app) = test_app().await;

        let response = get(&app, "/api/images/random-backdrop").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let media_type = body["type"].as_str().unwrap();
        assert!(media_type == "movies" || media_type == "shows");
        assert!(body["url"].as_str().unwrap().contains("fit=cover"));
        assert!(body["filename"].as_str().unwrap().contains("_backdrop"));
        assert!(body["tmdbId"].is_string());
    }
}
