// Currently-watching API - live Trakt status dressed with TMDB backdrops

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    services::{proxy::TMDB_BACKDROP_PARAMS, tmdb::TmdbKind, trakt::WatchingResponse},
    AppState,
};

/// Backdrops fetched from TMDB per playing item
const BACKDROP_LIMIT: usize = 3;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_watching))
}

#[derive(Debug, Serialize)]
pub struct WatchingData {
    #[serde(rename = "isWatching")]
    pub is_watching: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<WatchingContent>,
}

impl WatchingData {
    fn idle() -> Self {
        Self {
            is_watching: false,
            content: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WatchingContent {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub progress: WatchingProgress,
    pub images: WatchingImages,
    pub ids: ContentIds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Episode,
}

#[derive(Debug, Serialize)]
pub struct WatchingProgress {
    pub started_at: String,
    pub expires_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
}

#[derive(Debug, Default, Serialize)]
pub struct WatchingImages {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop_medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop_small: Option<String>,
}

impl WatchingImages {
    fn from_urls(urls: Vec<String>) -> Self {
        let mut urls = urls.into_iter();
        Self {
            backdrop: urls.next(),
            backdrop_medium: urls.next(),
            backdrop_small: urls.next(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContentIds {
    pub trakt: Option<i64>,
    pub tmdb: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imdb: Option<String>,
}

/// Elapsed share of [started_at, expires_at] at `now`, in percent.
/// `None` when `now` is outside the window or the window is unparseable or empty.
pub fn progress_percentage(started_at: &str, expires_at: &str, now: DateTime<Utc>) -> Option<u8> {
    let start = DateTime::parse_from_rfc3339(started_at).ok()?.with_timezone(&Utc);
    let end = DateTime::parse_from_rfc3339(expires_at).ok()?.with_timezone(&Utc);

    let total = (end - start).num_milliseconds();
    if total <= 0 || now < start || now > end {
        return None;
    }

    let elapsed = (now - start).num_milliseconds();
    Some((elapsed as f64 / total as f64 * 100.0).round() as u8)
}

/// Watching content without images, plus the TMDB lookup they need.
/// `None` when Trakt reports something other than a movie or episode.
pub fn describe(
    watching: &WatchingResponse,
    now: DateTime<Utc>,
) -> Option<(WatchingContent, Option<(TmdbKind, i64)>)> {
    let progress = WatchingProgress {
        started_at: watching.started_at.clone(),
        expires_at: watching.expires_at.clone(),
        percentage: progress_percentage(&watching.started_at, &watching.expires_at, now),
    };

    let (kind, title, subtitle, year, ids, tmdb_kind) = match watching.item_type.as_str() {
        "movie" => {
            let movie = watching.movie.as_ref()?;
            (
                ContentKind::Movie,
                movie.title.clone(),
                None,
                movie.year,
                &movie.ids,
                TmdbKind::Movie,
            )
        }
        "episode" => {
            let show = watching.show.as_ref()?;
            let subtitle = watching.episode.as_ref().map(|ep| {
                format!(
                    "S{}E{} - {}",
                    ep.season,
                    ep.number,
                    ep.title.as_deref().unwrap_or("")
                )
            });
            (
                ContentKind::Episode,
                show.title.clone(),
                subtitle,
                show.year,
                &show.ids,
                TmdbKind::Tv,
            )
        }
        _ => return None,
    };

    let content = WatchingContent {
        kind,
        title,
        subtitle,
        year,
        progress,
        images: WatchingImages::default(),
        ids: ContentIds {
            trakt: ids.trakt,
            tmdb: ids.tmdb,
            imdb: ids.imdb.clone(),
        },
    };

    let lookup = ids.tmdb.map(|id| (tmdb_kind, id));
    Some((content, lookup))
}

/// GET /api/watching
async fn get_watching(State(state): State<Arc<AppState>>) -> Json<WatchingData> {
    let Some(trakt) = state.trakt.as_ref() else {
        return Json(WatchingData::idle());
    };

    let watching = match trakt.watching(&state.config.trakt_username).await {
        Ok(Some(watching)) => watching,
        Ok(None) => return Json(WatchingData::idle()),
        Err(e) => {
            tracing::error!("Error fetching watching status: {:#}", e);
            return Json(WatchingData::idle());
        }
    };

    let Some((mut content, lookup)) = describe(&watching, Utc::now()) else {
        tracing::debug!("Ignoring watching item of type {}", watching.item_type);
        return Json(WatchingData::idle());
    };

    if let (Some(tmdb), Some((kind, tmdb_id))) = (state.tmdb.as_ref(), lookup) {
        let urls = tmdb
            .backdrop_urls(kind, tmdb_id, BACKDROP_LIMIT)
            .await
            .into_iter()
            .map(|url| state.proxy.proxied(&url, TMDB_BACKDROP_PARAMS))
            .collect();
        content.images = WatchingImages::from_urls(urls);
    }

    Json(WatchingData {
        is_watching: true,
        content: Some(content),
    })
}
