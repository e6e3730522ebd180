// Image index service
// Turns the sync job's media_index.json manifest (flat lists of image filenames)
// into a reverse lookup keyed by TMDB id, per media type and image category.
//
// The index is built lazily, memoized, and rebuilt in full when the manifest's
// last_updated stamp changes, when it gets older than the configured age, or
// when a reload is requested.

use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use tokio::fs;
use tokio::sync::RwLock;

use super::clock::{Clock, SystemClock};

/// Leading TMDB id of an asset filename, e.g. "27205" in "27205_poster.jpg"
static RE_ASSET_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)_").unwrap());
static RE_THUMBNAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^thumb_(\d+)_(poster|backdrop)\.[A-Za-z0-9]+$").unwrap()
});

/// TMDB id -> filenames, in manifest order
pub type IdLookup = HashMap<String, Vec<String>>;
/// TMDB id -> season number -> filenames
pub type SeasonLookup = HashMap<String, HashMap<String, Vec<String>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movies,
    Shows,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movies => "movies",
            MediaType::Shows => "shows",
        }
    }
}

impl FromStr for MediaType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" | "movies" => Ok(MediaType::Movies),
            "show" | "shows" | "tv" => Ok(MediaType::Shows),
            _ => Err(()),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageCategory {
    Posters,
    Backdrops,
}

impl ImageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageCategory::Posters => "posters",
            ImageCategory::Backdrops => "backdrops",
        }
    }
}

impl FromStr for ImageCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poster" | "posters" => Ok(ImageCategory::Posters),
            "backdrop" | "backdrops" => Ok(ImageCategory::Backdrops),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Manifest (written by the sync job)
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaManifest {
    pub last_updated: Option<String>,
    pub movies: MovieAssets,
    pub shows: ShowAssets,
    pub thumbnails: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MovieAssets {
    pub posters: Vec<String>,
    pub backdrops: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShowAssets {
    pub posters: Vec<String>,
    pub backdrops: Vec<String>,
    pub season_posters: SeasonLookup,
}

/// Only the stamp, so unchanged manifests are not fully materialized
#[derive(Debug, Deserialize)]
struct ManifestStamp {
    #[serde(default)]
    last_updated: Option<String>,
}

// =============================================================================
// Reverse index
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaLookup {
    pub posters: IdLookup,
    pub backdrops: IdLookup,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShowLookup {
    pub posters: IdLookup,
    pub backdrops: IdLookup,
    pub season_posters: SeasonLookup,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageLookup {
    pub movies: MediaLookup,
    pub shows: ShowLookup,
    pub thumbnails: MediaLookup,
}

impl ImageLookup {
    pub fn from_manifest(manifest: &MediaManifest) -> Self {
        Self {
            movies: MediaLookup {
                posters: build_lookup_map(&manifest.movies.posters),
                backdrops: build_lookup_map(&manifest.movies.backdrops),
            },
            shows: ShowLookup {
                posters: build_lookup_map(&manifest.shows.posters),
                backdrops: build_lookup_map(&manifest.shows.backdrops),
                season_posters: manifest.shows.season_posters.clone(),
            },
            thumbnails: build_thumbnail_lookup(&manifest.thumbnails),
        }
    }

    pub fn category(&self, media_type: MediaType, category: ImageCategory) -> &IdLookup {
        match (media_type, category) {
            (MediaType::Movies, ImageCategory::Posters) => &self.movies.posters,
            (MediaType::Movies, ImageCategory::Backdrops) => &self.movies.backdrops,
            (MediaType::Shows, ImageCategory::Posters) => &self.shows.posters,
            (MediaType::Shows, ImageCategory::Backdrops) => &self.shows.backdrops,
        }
    }

    pub fn thumbnails(&self, category: ImageCategory) -> &IdLookup {
        match category {
            ImageCategory::Posters => &self.thumbnails.posters,
            ImageCategory::Backdrops => &self.thumbnails.backdrops,
        }
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            movie_posters: self.movies.posters.len(),
            movie_backdrops: self.movies.backdrops.len(),
            show_posters: self.shows.posters.len(),
            show_backdrops: self.shows.backdrops.len(),
            season_posters: self.shows.season_posters.len(),
            thumbnail_posters: self.thumbnails.posters.len(),
            thumbnail_backdrops: self.thumbnails.backdrops.len(),
        }
    }
}

/// Number of distinct ids per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub movie_posters: usize,
    pub movie_backdrops: usize,
    pub show_posters: usize,
    pub show_backdrops: usize,
    pub season_posters: usize,
    pub thumbnail_posters: usize,
    pub thumbnail_backdrops: usize,
}

fn build_lookup_map(files: &[String]) -> IdLookup {
    let mut lookup = IdLookup::new();

    for file in files {
        if let Some(caps) = RE_ASSET_ID.captures(file) {
            lookup
                .entry(caps[1].to_string())
                .or_default()
                .push(file.clone());
        }
    }

    lookup
}

fn build_thumbnail_lookup(files: &[String]) -> MediaLookup {
    let mut lookup = MediaLookup::default();

    for file in files {
        let Some(caps) = RE_THUMBNAIL.captures(file) else {
            continue;
        };
        let target = match &caps[2] {
            "poster" => &mut lookup.posters,
            _ => &mut lookup.backdrops,
        };
        target
            .entry(caps[1].to_string())
            .or_default()
            .push(file.clone());
    }

    lookup
}

// =============================================================================
// Query results
// =============================================================================

/// Files found for a lookup plus the directory they live in, relative to the CDN root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMatch {
    pub files: Vec<String>,
    pub base_path: String,
}

impl ImageMatch {
    /// First listed file is the primary one
    pub fn primary(&self) -> Option<&str> {
        self.files.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomBackdrop {
    pub media_type: MediaType,
    pub tmdb_id: String,
    pub filename: String,
}

impl RandomBackdrop {
    pub fn base_path(&self) -> String {
        format!("{}/{}", self.media_type, ImageCategory::Backdrops)
    }
}

// =============================================================================
// Service
// =============================================================================

struct LoadedIndex {
    lookup: Arc<ImageLookup>,
    last_updated: Option<String>,
    built_at: DateTime<Utc>,
}

pub struct ImageIndex {
    manifest_path: PathBuf,
    /// None disables age-based rebuilds, including ages too large to represent
    max_age: Option<Duration>,
    clock: Arc<dyn Clock>,
    state: RwLock<Option<LoadedIndex>>,
}

impl ImageIndex {
    pub fn new(manifest_path: PathBuf, auto_reload_hours: u64) -> Self {
        Self::with_clock(manifest_path, auto_reload_hours, Arc::new(SystemClock))
    }

    pub fn with_clock(manifest_path: PathBuf, auto_reload_hours: u64, clock: Arc<dyn Clock>) -> Self {
        let max_age = Some(auto_reload_hours)
            .filter(|&hours| hours > 0)
            .and_then(|hours| i64::try_from(hours).ok())
            .and_then(Duration::try_hours);

        Self {
            manifest_path,
            max_age,
            clock,
            state: RwLock::new(None),
        }
    }

    /// Current index, rebuilt first if the manifest changed or the index expired.
    /// A missing or unreadable manifest yields an empty index.
    pub async fn load(&self) -> Arc<ImageLookup> {
        let Some(bytes) = self.read_manifest().await else {
            return Arc::new(ImageLookup::default());
        };

        let stamp: ManifestStamp = match serde_json::from_slice(&bytes) {
            Ok(stamp) => stamp,
            Err(e) => {
                tracing::error!(
                    "Failed to parse image manifest {}: {}",
                    self.manifest_path.display(),
                    e
                );
                return Arc::new(ImageLookup::default());
            }
        };

        {
            let state = self.state.read().await;
            if let Some(loaded) = state.as_ref() {
                if loaded.last_updated == stamp.last_updated && !self.is_expired(loaded) {
                    return loaded.lookup.clone();
                }
            }
        }

        self.rebuild(&bytes).await
    }

    /// Drop the memoized index and rebuild it from disk
    pub async fn reload(&self) -> Arc<ImageLookup> {
        self.state.write().await.take();
        tracing::info!("Image index cleared, reloading from manifest");
        self.load().await
    }

    pub async fn stats(&self) -> IndexStats {
        self.load().await.stats()
    }

    pub async fn find_images(
        &self,
        media_type: MediaType,
        category: ImageCategory,
        tmdb_id: &str,
        season: Option<&str>,
    ) -> ImageMatch {
        let index = self.load().await;

        if let (MediaType::Shows, ImageCategory::Posters, Some(season)) =
            (media_type, category, season)
        {
            let files = index
                .shows
                .season_posters
                .get(tmdb_id)
                .and_then(|seasons| seasons.get(season))
                .cloned()
                .unwrap_or_default();

            return ImageMatch {
                files,
                base_path: format!("shows/posters/{}/{}", tmdb_id, season),
            };
        }

        ImageMatch {
            files: index
                .category(media_type, category)
                .get(tmdb_id)
                .cloned()
                .unwrap_or_default(),
            base_path: format!("{}/{}", media_type, category),
        }
    }

    pub async fn find_thumbnails(&self, category: ImageCategory, tmdb_id: &str) -> ImageMatch {
        let index = self.load().await;

        ImageMatch {
            files: index
                .thumbnails(category)
                .get(tmdb_id)
                .cloned()
                .unwrap_or_default(),
            base_path: "thumbnails".to_string(),
        }
    }

    /// Pick any backdrop across movies and shows
    pub async fn random_backdrop(&self) -> Option<RandomBackdrop> {
        let index = self.load().await;

        let candidates: Vec<(MediaType, &String)> = index
            .movies
            .backdrops
            .keys()
            .map(|id| (MediaType::Movies, id))
            .chain(index.shows.backdrops.keys().map(|id| (MediaType::Shows, id)))
            .collect();

        if candidates.is_empty() {
            return None;
        }

        let (media_type, tmdb_id) = candidates[random_index(candidates.len())];
        let files = index.category(media_type, ImageCategory::Backdrops).get(tmdb_id)?;
        if files.is_empty() {
            return None;
        }

        Some(RandomBackdrop {
            media_type,
            tmdb_id: tmdb_id.clone(),
            filename: files[random_index(files.len())].clone(),
        })
    }

    fn is_expired(&self, loaded: &LoadedIndex) -> bool {
        match self.max_age {
            Some(max_age) => self.clock.now() - loaded.built_at > max_age,
            None => false,
        }
    }

    async fn read_manifest(&self) -> Option<Vec<u8>> {
        match fs::read(&self.manifest_path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "Image manifest not found at {}, returning empty index",
                    self.manifest_path.display()
                );
                None
            }
            Err(e) => {
                tracing::error!(
                    "Failed to read image manifest {}: {}",
                    self.manifest_path.display(),
                    e
                );
                None
            }
        }
    }

    /// Build a complete index first, then swap it in
    async fn rebuild(&self, bytes: &[u8]) -> Arc<ImageLookup> {
        let manifest: MediaManifest = match serde_json::from_slice(bytes) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::error!(
                    "Failed to parse image manifest {}: {}",
                    self.manifest_path.display(),
                    e
                );
                return Arc::new(ImageLookup::default());
            }
        };

        tracing::info!("Loading image index into memory...");
        let lookup = Arc::new(ImageLookup::from_manifest(&manifest));
        let stats = lookup.stats();
        tracing::info!(
            "Image index loaded: {} movie posters, {} show posters, {} thumbnails",
            stats.movie_posters,
            stats.show_posters,
            stats.thumbnail_posters + stats.thumbnail_backdrops
        );

        *self.state.write().await = Some(LoadedIndex {
            lookup: lookup.clone(),
            last_updated: manifest.last_updated,
            built_at: self.clock.now(),
        });

        lookup
    }
}

fn random_index(len: usize) -> usize {
    (OsRng.next_u64() % len as u64) as usize
}
