// Configuration module for trakt-dash
// Handles XDG-compliant directory paths and TOML configuration file

use serde::Deserialize;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "trakt-dash";
const CONFIG_FILENAME: &str = "config.toml";
const MANIFEST_FILENAME: &str = "media_index.json";

pub const DEFAULT_CDN_BASE_URL: &str = "https://cfcdn.sayed.app/watch/";
pub const DEFAULT_PROXY_BASE_URL: &str = "https://wsrv.nl";

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Server configuration
    pub server: ServerConfig,

    /// Directory paths (overrides XDG defaults)
    pub paths: PathsConfig,

    /// Image index and CDN configuration
    pub images: ImagesConfig,

    /// Trakt API configuration (used for "currently watching")
    pub trakt: TraktConfig,

    /// TMDB API configuration
    pub tmdb: TmdbConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server port (default: 3000)
    pub port: u16,

    /// Bind address (default: 0.0.0.0)
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Override data directory (root of the synced export)
    pub data_dir: Option<PathBuf>,

    /// Override the Trakt JSON directory (default: <data_dir>/json)
    pub json_dir: Option<PathBuf>,

    /// Override the image manifest path (default: <data_dir>/imgs/media_index.json)
    pub manifest_path: Option<PathBuf>,

    /// Override config directory
    pub config_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Base URL the synced images are published under
    pub cdn_base_url: String,

    /// Resizing proxy placed in front of the CDN
    pub proxy_base_url: String,

    /// Rebuild the image index when it is older than this (default: 24, 0 to disable)
    pub auto_reload_hours: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            cdn_base_url: DEFAULT_CDN_BASE_URL.to_string(),
            proxy_base_url: DEFAULT_PROXY_BASE_URL.to_string(),
            auto_reload_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraktConfig {
    /// Trakt API key (client id). Without it /api/watching always reports idle
    pub api_key: Option<String>,

    /// Trakt username whose activity is shown
    pub username: String,
}

impl Default for TraktConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            username: "lrs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    /// TMDB API key (optional, enables backdrops for /api/watching)
    pub api_key: Option<String>,
}

/// Application paths following XDG Base Directory Specification on Unix
/// On other platforms, falls back to the current directory or platform-specific locations
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for configuration files (config.toml)
    /// XDG: $XDG_CONFIG_HOME/trakt-dash or ~/.config/trakt-dash
    pub config_dir: PathBuf,

    /// Root of the synced export
    /// XDG: $XDG_DATA_HOME/trakt-dash or ~/.local/share/trakt-dash
    pub data_dir: PathBuf,

    /// Directory holding the Trakt JSON tree
    pub json_dir: PathBuf,

    /// Image manifest consumed by the image index
    pub manifest_path: PathBuf,
}

impl AppPaths {
    /// Create application paths using XDG directories (or fallbacks)
    ///
    /// Priority order:
    /// 1. Environment variables (TRAKT_DASH_CONFIG_DIR, TRAKT_DASH_DATA_DIR)
    /// 2. Config file overrides
    /// 3. XDG directories (Linux/Unix)
    /// 4. Current directory fallback
    pub fn new(config_overrides: &PathsConfig) -> Self {
        let config_dir = Self::resolve_config_dir(&config_overrides.config_dir);
        let data_dir = Self::resolve_data_dir(&config_overrides.data_dir);
        Self::with_data_dir(config_dir, data_dir, config_overrides)
    }

    /// Create application paths using current directory (legacy/portable mode)
    /// Mirrors the layout the sync job writes into `public/data`
    pub fn current_dir() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let data_dir = cwd.join("public").join("data");
        Self::with_data_dir(cwd, data_dir, &PathsConfig::default())
    }

    fn with_data_dir(config_dir: PathBuf, data_dir: PathBuf, overrides: &PathsConfig) -> Self {
        let json_dir = overrides
            .json_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("json"));
        let manifest_path = overrides
            .manifest_path
            .clone()
            .unwrap_or_else(|| data_dir.join("imgs").join(MANIFEST_FILENAME));

        Self {
            config_dir,
            data_dir,
            json_dir,
            manifest_path,
        }
    }

    /// Resolve config directory
    fn resolve_config_dir(config_override: &Option<PathBuf>) -> PathBuf {
        if let Ok(path) = std::env::var("TRAKT_DASH_CONFIG_DIR") {
            return PathBuf::from(path);
        }

        if let Some(ref path) = config_override {
            return path.clone();
        }

        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Resolve data directory
    fn resolve_data_dir(config_override: &Option<PathBuf>) -> PathBuf {
        if let Ok(path) = std::env::var("TRAKT_DASH_DATA_DIR") {
            return PathBuf::from(path);
        }

        if let Some(ref path) = config_override {
            return path.clone();
        }

        if let Some(dir) = dirs::data_dir() {
            return dir.join(APP_NAME);
        }

        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("data")
    }

    /// Get the config file path
    pub fn config_file_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILENAME)
    }

    /// Log the configured paths
    pub fn log_paths(&self) {
        tracing::info!("Config file: {}", self.config_file_path().display());
        tracing::info!("Data directory: {}", self.data_dir.display());
        tracing::debug!("Trakt JSON directory: {}", self.json_dir.display());
        tracing::debug!("Image manifest: {}", self.manifest_path.display());
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new(&PathsConfig::default())
    }
}

/// Application configuration - combines TOML file with environment overrides
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Application paths
    pub paths: AppPaths,

    /// Server port
    pub port: u16,

    /// Bind address
    pub bind_address: String,

    /// Image CDN/proxy settings
    pub images: ImagesConfig,

    /// Trakt API key (optional)
    pub trakt_api_key: Option<String>,

    /// Trakt username
    pub trakt_username: String,

    /// TMDB API key (optional)
    pub tmdb_api_key: Option<String>,
}

impl AppConfig {
    /// Load configuration from TOML file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML config file
    /// 3. Default values
    pub fn load() -> Self {
        let portable_mode = std::env::var("TRAKT_DASH_PORTABLE")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        if portable_mode {
            tracing::info!("Running in portable mode (using current directory)");
            return Self::portable();
        }

        let config_dir = Self::find_config_dir();
        let config_file = Self::load_config_file(&config_dir);

        Self::build(config_file)
    }

    /// Create a portable configuration (current directory for everything)
    fn portable() -> Self {
        let paths = AppPaths::current_dir();
        let mut images = ImagesConfig::default();
        if let Some(hours) = Self::env_auto_reload_hours() {
            images.auto_reload_hours = hours;
        }

        Self {
            paths,
            port: Self::env_port().unwrap_or(3000),
            bind_address: Self::env_bind_address().unwrap_or_else(|| "0.0.0.0".to_string()),
            images,
            trakt_api_key: std::env::var("TRAKT_API_KEY").ok(),
            trakt_username: std::env::var("TRAKT_USERNAME").unwrap_or_else(|_| "lrs".to_string()),
            tmdb_api_key: std::env::var("TMDB_API_KEY").ok(),
        }
    }

    /// Find the config directory (for locating config.toml)
    fn find_config_dir() -> PathBuf {
        if let Ok(path) = std::env::var("TRAKT_DASH_CONFIG_DIR") {
            return PathBuf::from(path);
        }

        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Load and parse the TOML config file
    fn load_config_file(config_dir: &Path) -> ConfigFile {
        let config_path = config_dir.join(CONFIG_FILENAME);

        if !config_path.exists() {
            tracing::debug!(
                "No config file found at {}, using defaults",
                config_path.display()
            );
            return ConfigFile::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config file {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                    ConfigFile::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                ConfigFile::default()
            }
        }
    }

    /// Build configuration from config file with environment overrides
    fn build(config_file: ConfigFile) -> Self {
        let paths = AppPaths::new(&config_file.paths);

        let port = Self::env_port().unwrap_or(config_file.server.port);

        let bind_address =
            Self::env_bind_address().unwrap_or_else(|| config_file.server.bind_address.clone());

        let mut images = config_file.images;
        if let Some(hours) = Self::env_auto_reload_hours() {
            images.auto_reload_hours = hours;
        }

        // API keys: env > config
        let trakt_api_key = std::env::var("TRAKT_API_KEY")
            .ok()
            .or(config_file.trakt.api_key);
        let trakt_username =
            std::env::var("TRAKT_USERNAME").unwrap_or(config_file.trakt.username);
        let tmdb_api_key = std::env::var("TMDB_API_KEY")
            .ok()
            .or(config_file.tmdb.api_key);

        Self {
            paths,
            port,
            bind_address,
            images,
            trakt_api_key,
            trakt_username,
            tmdb_api_key,
        }
    }

    fn env_port() -> Option<u16> {
        std::env::var("TRAKT_DASH_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
    }

    fn env_bind_address() -> Option<String> {
        std::env::var("TRAKT_DASH_BIND_ADDRESS").ok()
    }

    fn env_auto_reload_hours() -> Option<u64> {
        std::env::var("IMAGE_AUTO_RELOAD_HOURS")
            .ok()
            .and_then(|h| h.parse().ok())
    }

    /// Log configuration status
    pub fn log_config(&self) {
        self.paths.log_paths();
        tracing::info!("Server listening on {}:{}", self.bind_address, self.port);

        if self.images.auto_reload_hours > 0 {
            tracing::info!(
                "Image index auto-reload: every {} hours",
                self.images.auto_reload_hours
            );
        } else {
            tracing::info!("Image index auto-reload: disabled (manual reload only)");
        }

        if self.trakt_api_key.is_some() {
            tracing::info!("Currently watching: ENABLED for user {}", self.trakt_username);
        } else {
            tracing::info!("Currently watching: disabled");
            tracing::info!("Hint: Add [trakt] api_key to config.toml or set TRAKT_API_KEY env var");
        }

        if self.tmdb_api_key.is_some() {
            tracing::debug!("TMDB backdrops: enabled");
        } else {
            tracing::debug!("TMDB backdrops: disabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_dir_paths() {
        let paths = AppPaths::current_dir();
        assert!(paths.data_dir.ends_with("public/data"));
        assert!(paths.json_dir.ends_with("public/data/json"));
        assert!(paths.manifest_path.ends_with("imgs/media_index.json"));
    }

    #[test]
    fn test_path_overrides() {
        let overrides = PathsConfig {
            json_dir: Some(PathBuf::from("/srv/trakt")),
            manifest_path: Some(PathBuf::from("/srv/imgs/index.json")),
            ..Default::default()
        };
        let paths = AppPaths::with_data_dir(
            PathBuf::from("/etc/trakt-dash"),
            PathBuf::from("/var/lib/trakt-dash"),
            &overrides,
        );
        assert_eq!(paths.json_dir, PathBuf::from("/srv/trakt"));
        assert_eq!(paths.manifest_path, PathBuf::from("/srv/imgs/index.json"));
        assert_eq!(
            paths.config_file_path(),
            PathBuf::from("/etc/trakt-dash/config.toml")
        );
    }

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.images.auto_reload_hours, 24);
        assert_eq!(config.images.proxy_base_url, DEFAULT_PROXY_BASE_URL);
        assert_eq!(config.trakt.username, "lrs");
        assert!(config.tmdb.api_key.is_none());
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[server]
port = 9000
bind_address = "127.0.0.1"

[paths]
data_dir = "/custom/data"

[images]
cdn_base_url = "https://cdn.example.com/"
auto_reload_hours = 0

[trakt]
api_key = "trakt_key"
username = "someone"

[tmdb]
api_key = "tmdb_key"
"#;
        let config: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.paths.data_dir, Some(PathBuf::from("/custom/data")));
        assert_eq!(config.images.cdn_base_url, "https://cdn.example.com/");
        assert_eq!(config.images.proxy_base_url, DEFAULT_PROXY_BASE_URL);
        assert_eq!(config.images.auto_reload_hours, 0);
        assert_eq!(config.trakt.api_key, Some("trakt_key".to_string()));
        assert_eq!(config.trakt.username, "someone");
        assert_eq!(config.tmdb.api_key, Some("tmdb_key".to_string()));
    }

    #[test]
    fn test_partial_config_toml() {
        let toml_str = r#"
[tmdb]
api_key = "abc"
"#;
        let config: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 3000); // default
        assert_eq!(config.images.auto_reload_hours, 24); // default
        assert_eq!(config.tmdb.api_key, Some("abc".to_string()));
    }
}
