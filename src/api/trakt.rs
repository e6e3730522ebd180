// Trakt data API - serves the synced JSON export

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    models::{MovieSearchResult, ShowSearchResult},
    services::trakt_data::Document,
    AppState,
};

use super::error::ApiError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_index).post(clear_cache))
        .route("/search", get(search))
        .route("/user/profile", get(get_profile))
        .route("/user/stats", get(get_stats))
        .route("/user/history", get(get_history))
        .route("/user/watched", get(get_watched))
        .route("/user/watchlist", get(get_watchlist))
        .route("/user/comments", get(get_comments))
        .route("/user/lists", get(get_lists))
        .route("/user/lists/all-items", get(get_all_list_items))
        .route("/user/lists/:id", get(get_list_items))
}

/// `?type=movies|shows`, anything else means both
#[derive(Debug, Default, Deserialize)]
pub struct TypeQuery {
    #[serde(rename = "type")]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Movies,
    Shows,
    All,
}

impl TypeQuery {
    fn selection(&self) -> Selection {
        match self.media_type.as_deref() {
            Some("movies") => Selection::Movies,
            Some("shows") => Selection::Shows,
            _ => Selection::All,
        }
    }
}

/// Export documents go out exactly as they are on disk
fn found(doc: Option<Document>, what: &str) -> Result<Response, ApiError> {
    doc.map(|d| Json(d).into_response())
        .ok_or_else(|| ApiError::not_found(format!("{} not found", what)))
}

/// GET /api/trakt - the export's index.json
async fn get_index(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    found(state.trakt_data.index().await, "Index")
}

/// POST /api/trakt - drop memoized documents
async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.trakt_data.clear_cache().await;
    Json(json!({ "message": "Cache cleared successfully" }))
}

async fn get_profile(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    found(state.trakt_data.user_profile().await, "Profile")
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    found(state.trakt_data.user_stats().await, "Stats")
}

async fn get_comments(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    found(state.trakt_data.comments().await, "Comments")
}

async fn get_lists(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    found(state.trakt_data.lists().await, "Lists")
}

async fn get_all_list_items(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, Option<Document>>> {
    Json(state.trakt_data.all_list_items().await)
}

async fn get_list_items(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    found(state.trakt_data.list_items(&id).await, "List")
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TypeQuery>,
) -> Result<Response, ApiError> {
    let data = &state.trakt_data;
    match query.selection() {
        Selection::Movies => found(data.history_movies().await, "History"),
        Selection::Shows => found(data.history_shows().await, "History"),
        Selection::All => Ok(Json(data.history_all().await).into_response()),
    }
}

async fn get_watched(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TypeQuery>,
) -> Result<Response, ApiError> {
    let data = &state.trakt_data;
    match query.selection() {
        Selection::Movies => found(data.watched_movies().await, "Watched data"),
        Selection::Shows => found(data.watched_shows().await, "Watched data"),
        Selection::All => Ok(Json(data.watched_all().await).into_response()),
    }
}

async fn get_watchlist(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TypeQuery>,
) -> Result<Response, ApiError> {
    let data = &state.trakt_data;
    match query.selection() {
        Selection::Movies => found(data.watchlist_movies().await, "Watchlist"),
        Selection::Shows => found(data.watchlist_shows().await, "Watchlist"),
        Selection::All => Ok(Json(data.watchlist_all().await).into_response()),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct SearchResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movies: Option<Vec<MovieSearchResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shows: Option<Vec<ShowSearchResult>>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub results: SearchResults,
}

/// GET /api/trakt/search?q=dark[&type=movies|shows|all]
async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let q = query
        .q
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter \"q\" is required"))?;

    let media_type = query.media_type.unwrap_or_else(|| "all".to_string());
    let selection = TypeQuery {
        media_type: Some(media_type.clone()),
    }
    .selection();

    let mut results = SearchResults::default();
    if selection != Selection::Shows {
        results.movies = Some(state.trakt_data.search_movies_by_title(&q).await);
    }
    if selection != Selection::Movies {
        results.shows = Some(state.trakt_data.search_shows_by_title(&q).await);
    }

    Ok(Json(SearchResponse {
        query: q,
        media_type,
        results,
    }))
}
