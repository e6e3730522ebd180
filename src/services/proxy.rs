// Image URL construction
// Synced artwork is published on a CDN; browsers get it through wsrv.nl,
// which resizes, converts to webp and caches.

/// Poster-sized redirect for /api/images
pub const POSTER_PARAMS: &str = "w=400&output=webp&q=90&maxage=31d";
/// Fullscreen background for /api/images/random-backdrop
pub const BACKGROUND_PARAMS: &str = "w=1920&h=1080&fit=cover&output=webp&q=85&maxage=14d";
/// TMDB backdrops shown while something is playing
pub const TMDB_BACKDROP_PARAMS: &str = "maxage=14d";

#[derive(Debug, Clone)]
pub struct ImageProxy {
    cdn_base_url: String,
    proxy_base_url: String,
}

impl ImageProxy {
    pub fn new(cdn_base_url: &str, proxy_base_url: &str) -> Self {
        let cdn_base_url = if cdn_base_url.ends_with('/') {
            cdn_base_url.to_string()
        } else {
            format!("{}/", cdn_base_url)
        };

        Self {
            cdn_base_url,
            proxy_base_url: proxy_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public URL of a synced file, `base_path` as returned by the image index
    pub fn cdn_url(&self, base_path: &str, filename: &str) -> String {
        format!("{}{}/{}", self.cdn_base_url, base_path, filename)
    }

    pub fn proxied(&self, url: &str, params: &str) -> String {
        format!(
            "{}/?url={}&{}",
            self.proxy_base_url,
            urlencoding::encode(url),
            params
        )
    }
}
