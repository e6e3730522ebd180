// Trakt data service
// Read-through cache over the JSON tree exported by the sync job. Documents are
// parsed once and served as-is until clear_cache(); missing or malformed files
// resolve to None so a single bad export never takes a route down.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

use crate::models::{
    ByType, MovieSearchResult, Provenance, ShowSearchResult, TraktHistoryItem, TraktWatchedMovie,
    TraktWatchedShow, TraktWatchlistItem,
};

const INDEX: &str = "index.json";
const PROFILE: &str = "user/profile/basic.json";
const STATS: &str = "user/stats/overview.json";
const HISTORY_MOVIES: &str = "user/history/movies.json";
const HISTORY_SHOWS: &str = "user/history/shows.json";
const WATCHED_MOVIES: &str = "user/watched/movies.json";
const WATCHED_SHOWS: &str = "user/watched/shows.json";
const WATCHLIST_MOVIES: &str = "user/watchlist/movies.json";
const WATCHLIST_SHOWS: &str = "user/watchlist/shows.json";
const WATCHLIST_ALL: &str = "user/watchlist/all.json";
const COMMENTS: &str = "user/comments/all.json";
const LISTS: &str = "user/lists/user_lists.json";

/// A parsed export file, shared between the cache and responses
pub type Document = Arc<Value>;

pub struct TraktDataService {
    data_dir: PathBuf,
    cache: RwLock<HashMap<String, Document>>,
}

impl TraktDataService {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Parsed document at `relative_path`, from memory if it was read before
    pub async fn get_document(&self, relative_path: &str) -> Option<Document> {
        if let Some(doc) = self.cache.read().await.get(relative_path) {
            return Some(doc.clone());
        }

        let full_path = self.data_dir.join(relative_path);
        let contents = match fs::read_to_string(&full_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Data file not found: {}", full_path.display());
                return None;
            }
            Err(e) => {
                tracing::error!("Failed to read data file {}: {}", full_path.display(), e);
                return None;
            }
        };

        let doc = match serde_json::from_str::<Value>(&contents) {
            Ok(value) => Arc::new(value),
            Err(e) => {
                tracing::error!("Error loading JSON file {}: {}", relative_path, e);
                return None;
            }
        };

        self.cache
            .write()
            .await
            .insert(relative_path.to_string(), doc.clone());
        tracing::debug!("Cached {}", relative_path);

        Some(doc)
    }

    /// Drop every memoized document; the next read goes back to disk
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        let dropped = cache.len();
        cache.clear();
        tracing::info!("Trakt data cache cleared ({} documents dropped)", dropped);
    }

    pub async fn index(&self) -> Option<Document> {
        self.get_document(INDEX).await
    }

    pub async fn user_profile(&self) -> Option<Document> {
        self.get_document(PROFILE).await
    }

    pub async fn user_stats(&self) -> Option<Document> {
        self.get_document(STATS).await
    }

    // History

    pub async fn history_movies(&self) -> Option<Document> {
        self.get_document(HISTORY_MOVIES).await
    }

    pub async fn history_shows(&self) -> Option<Document> {
        self.get_document(HISTORY_SHOWS).await
    }

    pub async fn history_all(&self) -> ByType<Document> {
        ByType {
            movies: self.history_movies().await,
            shows: self.history_shows().await,
        }
    }

    // Watched

    pub async fn watched_movies(&self) -> Option<Document> {
        self.get_document(WATCHED_MOVIES).await
    }

    pub async fn watched_shows(&self) -> Option<Document> {
        self.get_document(WATCHED_SHOWS).await
    }

    pub async fn watched_all(&self) -> ByType<Document> {
        ByType {
            movies: self.watched_movies().await,
            shows: self.watched_shows().await,
        }
    }

    // Watchlist

    pub async fn watchlist_movies(&self) -> Option<Document> {
        self.get_document(WATCHLIST_MOVIES).await
    }

    /// Older exports only ship the combined watchlist, so shows fall back to
    /// filtering all.json when there is no dedicated file
    pub async fn watchlist_shows(&self) -> Option<Document> {
        if fs::try_exists(self.data_dir.join(WATCHLIST_SHOWS))
            .await
            .unwrap_or(false)
        {
            return self.get_document(WATCHLIST_SHOWS).await;
        }

        let all = self.get_document(WATCHLIST_ALL).await?;
        let filtered = only_shows(&all);
        if filtered.is_none() {
            tracing::warn!("{} has no data array, no show watchlist", WATCHLIST_ALL);
        }
        filtered.map(Arc::new)
    }

    pub async fn watchlist_all(&self) -> ByType<Document> {
        ByType {
            movies: self.watchlist_movies().await,
            shows: self.watchlist_shows().await,
        }
    }

    // Comments and lists

    pub async fn comments(&self) -> Option<Document> {
        self.get_document(COMMENTS).await
    }

    pub async fn lists(&self) -> Option<Document> {
        self.get_document(LISTS).await
    }

    pub async fn list_items(&self, slug: &str) -> Option<Document> {
        if slug.is_empty() || slug.contains(['/', '\\']) || slug.contains("..") {
            tracing::warn!("Rejected list slug {:?}", slug);
            return None;
        }

        self.get_document(&format!("user/lists/{}_items.json", slug))
            .await
    }

    /// Items of every list the user has, keyed by list slug
    pub async fn all_list_items(&self) -> BTreeMap<String, Option<Document>> {
        let mut items = BTreeMap::new();

        let Some(lists) = self.lists().await else {
            return items;
        };

        let slugs: Vec<String> = data_items(&lists)
            .iter()
            .filter_map(|list| list.pointer("/ids/slug").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        for slug in slugs {
            let list_items = self.list_items(&slug).await;
            items.insert(slug, list_items);
        }

        items
    }

    // Search

    /// Case-insensitive title match across watched, watchlist and history, in that order.
    /// A movie present in several sources is reported once per source.
    pub async fn search_movies_by_title(&self, query: &str) -> Vec<MovieSearchResult> {
        let needle = query.to_lowercase();
        let mut results = Vec::new();

        if let Some(watched) = self.watched_movies().await {
            results.extend(
                parse_items::<TraktWatchedMovie>(&watched, WATCHED_MOVIES)
                    .into_iter()
                    .filter(|item| title_matches(&item.movie.title, &needle))
                    .map(|item| MovieSearchResult {
                        movie: item.movie,
                        provenance: Provenance::Watched {
                            plays: item.plays,
                            last_watched_at: item.last_watched_at,
                        },
                    }),
            );
        }

        if let Some(watchlist) = self.watchlist_movies().await {
            let items = parse_items::<TraktWatchlistItem>(&watchlist, WATCHLIST_MOVIES);
            results.extend(items.into_iter().filter_map(|item| {
                let movie = item.movie.filter(|m| title_matches(&m.title, &needle))?;
                Some(MovieSearchResult {
                    movie,
                    provenance: Provenance::Watchlist {
                        rank: item.rank,
                        listed_at: item.listed_at,
                    },
                })
            }));
        }

        if let Some(history) = self.history_movies().await {
            let items = parse_items::<TraktHistoryItem>(&history, HISTORY_MOVIES);
            results.extend(items.into_iter().filter_map(|item| {
                let movie = item.movie.filter(|m| title_matches(&m.title, &needle))?;
                Some(MovieSearchResult {
                    movie,
                    provenance: Provenance::History {
                        watched_at: item.watched_at,
                    },
                })
            }));
        }

        results
    }

    pub async fn search_shows_by_title(&self, query: &str) -> Vec<ShowSearchResult> {
        let needle = query.to_lowercase();
        let mut results = Vec::new();

        if let Some(watched) = self.watched_shows().await {
            results.extend(
                parse_items::<TraktWatchedShow>(&watched, WATCHED_SHOWS)
                    .into_iter()
                    .filter(|item| title_matches(&item.show.title, &needle))
                    .map(|item| ShowSearchResult {
                        show: item.show,
                        provenance: Provenance::Watched {
                            plays: item.plays,
                            last_watched_at: item.last_watched_at,
                        },
                    }),
            );
        }

        if let Some(watchlist) = self.watchlist_shows().await {
            let items = parse_items::<TraktWatchlistItem>(&watchlist, WATCHLIST_SHOWS);
            results.extend(items.into_iter().filter_map(|item| {
                let show = item.show.filter(|s| title_matches(&s.title, &needle))?;
                Some(ShowSearchResult {
                    show,
                    provenance: Provenance::Watchlist {
                        rank: item.rank,
                        listed_at: item.listed_at,
                    },
                })
            }));
        }

        if let Some(history) = self.history_shows().await {
            let items = parse_items::<TraktHistoryItem>(&history, HISTORY_SHOWS);
            results.extend(items.into_iter().filter_map(|item| {
                let show = item.show.filter(|s| title_matches(&s.title, &needle))?;
                Some(ShowSearchResult {
                    show,
                    provenance: Provenance::History {
                        watched_at: item.watched_at,
                    },
                })
            }));
        }

        results
    }
}

/// The `data` array of an export document, empty when it has none
fn data_items(doc: &Value) -> &[Value] {
    doc.get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Entries of `data` that fit `T`; the rest are skipped one by one
fn parse_items<T: DeserializeOwned>(doc: &Value, relative_path: &str) -> Vec<T> {
    data_items(doc)
        .iter()
        .filter_map(|item| match <T as serde::Deserialize>::deserialize(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::debug!("Skipping unexpected entry in {}: {}", relative_path, e);
                None
            }
        })
        .collect()
}

/// Copy of a combined watchlist with only show entries and a matching count
fn only_shows(all: &Value) -> Option<Value> {
    let mut filtered = all.clone();

    let items = filtered.get_mut("data")?.as_array_mut()?;
    items.retain(|item| item.get("type").and_then(Value::as_str) == Some("show"));
    let count = items.len();

    if let Some(metadata) = filtered.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.insert("count".to_string(), Value::from(count));
    }

    Some(filtered)
}

fn title_matches(title: &str, needle_lower: &str) -> bool {
    title.to_lowercase().contains(needle_lower)
}
