// Models for the exported Trakt data
// Route handlers serve export files untouched; these types only describe the
// entries search and the live watching lookup need to read.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TraktIds {
    #[serde(default)]
    pub trakt: Option<i64>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraktMovie {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub ids: TraktIds,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraktShow {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub ids: TraktIds,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraktEpisode {
    pub season: i32,
    pub number: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub ids: TraktIds,
}

// =============================================================================
// Export entries read by search
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TraktHistoryItem {
    pub watched_at: String,
    #[serde(default)]
    pub movie: Option<TraktMovie>,
    #[serde(default)]
    pub show: Option<TraktShow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktWatchedMovie {
    #[serde(default)]
    pub plays: u32,
    #[serde(default)]
    pub last_watched_at: Option<String>,
    pub movie: TraktMovie,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktWatchedShow {
    #[serde(default)]
    pub plays: u32,
    #[serde(default)]
    pub last_watched_at: Option<String>,
    pub show: TraktShow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktWatchlistItem {
    #[serde(default)]
    pub rank: Option<i64>,
    pub listed_at: String,
    #[serde(default)]
    pub movie: Option<TraktMovie>,
    #[serde(default)]
    pub show: Option<TraktShow>,
}

/// Movie and show halves of a dataset, either may be missing on disk
#[derive(Debug, Clone, Serialize)]
pub struct ByType<T> {
    pub movies: Option<T>,
    pub shows: Option<T>,
}

// =============================================================================
// Search results
// =============================================================================

/// Which dataset a search hit came from, with the fields only that dataset has
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Provenance {
    Watched {
        plays: u32,
        last_watched_at: Option<String>,
    },
    Watchlist {
        #[serde(skip_serializing_if = "Option::is_none")]
        rank: Option<i64>,
        listed_at: String,
    },
    History {
        watched_at: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct MovieSearchResult {
    pub movie: TraktMovie,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShowSearchResult {
    pub show: TraktShow,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_result_serializes_flat() {
        let result = MovieSearchResult {
            movie: TraktMovie {
                title: "Inception".to_string(),
                year: Some(2010),
                ids: TraktIds {
                    tmdb: Some(27205),
                    ..Default::default()
                },
            },
            provenance: Provenance::Watched {
                plays: 3,
                last_watched_at: Some("2024-01-01T00:00:00.000Z".to_string()),
            },
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["source"], "watched");
        assert_eq!(json["plays"], 3);
        assert_eq!(json["movie"]["title"], "Inception");
        assert_eq!(json["movie"]["ids"]["tmdb"], 27205);
    }

    #[test]
    fn test_watchlist_item_tolerates_missing_fields() {
        let item: TraktWatchlistItem = serde_json::from_str(
            r#"{"id": 1, "listed_at": "2024-02-02T00:00:00.000Z", "type": "show",
                "show": {"title": "Dark", "year": 2017, "ids": {"trakt": 1, "tmdb": 70523}},
                "extra_field": true}"#,
        )
        .unwrap();
        assert!(item.movie.is_none());
        assert_eq!(item.rank, None);
        assert_eq!(item.show.unwrap().ids.tmdb, Some(70523));
    }

    #[test]
    fn test_watched_movie_with_null_timestamp() {
        let item: TraktWatchedMovie = serde_json::from_str(
            r#"{"plays": 1, "last_watched_at": null, "movie": {"title": "Inception", "ids": {"tmdb": 27205}}}"#,
        )
        .unwrap();
        assert!(item.last_watched_at.is_none());
        assert_eq!(item.movie.year, None);
    }
}
