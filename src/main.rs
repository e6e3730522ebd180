use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod models;
mod services;

use config::AppConfig;
use services::{
    image_index::ImageIndex, proxy::ImageProxy, tmdb::TmdbClient, trakt::TraktClient,
    trakt_data::TraktDataService,
};

/// How often the background task re-checks the image manifest
const INDEX_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Tracks all background task handles for graceful shutdown
struct BackgroundTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    fn new() -> Self {
        Self {
            handles: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.handles.push((name, handle));
    }

    async fn shutdown(self) {
        tracing::info!("Initiating graceful shutdown...");

        self.shutdown.cancel();

        for (name, handle) in self.handles {
            tracing::debug!("Waiting for {} to finish...", name);
            match tokio::time::timeout(Duration::from_secs(10), handle).await {
                Ok(Ok(())) => tracing::debug!("{} finished cleanly", name),
                Ok(Err(e)) => tracing::warn!("{} panicked: {}", name, e),
                Err(_) => tracing::warn!("{} timed out during shutdown", name),
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

pub struct AppState {
    pub config: AppConfig,
    pub images: ImageIndex,
    pub trakt_data: TraktDataService,
    pub proxy: ImageProxy,
    /// Present only when a Trakt API key is configured
    pub trakt: Option<TraktClient>,
    pub tmdb: Option<TmdbClient>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let images = ImageIndex::new(
            config.paths.manifest_path.clone(),
            config.images.auto_reload_hours,
        );
        let trakt_data = TraktDataService::new(config.paths.json_dir.clone());
        let proxy = ImageProxy::new(&config.images.cdn_base_url, &config.images.proxy_base_url);

        let trakt = config
            .trakt_api_key
            .clone()
            .map(TraktClient::new)
            .transpose()?;
        let tmdb = config
            .tmdb_api_key
            .clone()
            .map(TmdbClient::new)
            .transpose()?;

        Ok(Self {
            config,
            images,
            trakt_data,
            proxy,
            trakt,
            tmdb,
        })
    }
}

/// Full HTTP surface: `/health` plus everything under `/api`
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trakt_dash=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load();
    config.log_config();

    let state = Arc::new(AppState::new(config.clone())?);

    // Build the image index up front so the first request doesn't pay for it
    let started = Instant::now();
    let stats = state.images.stats().await;
    tracing::info!(
        "Image index ready in {:?}: {} movie posters, {} movie backdrops, {} show posters, {} show backdrops",
        started.elapsed(),
        stats.movie_posters,
        stats.movie_backdrops,
        stats.show_posters,
        stats.show_backdrops
    );

    let mut bg_tasks = BackgroundTasks::new();

    // Keep the index current without making requests wait for rebuilds
    {
        let refresh_state = state.clone();
        let cancel = bg_tasks.token();
        bg_tasks.spawn("index-refresh", async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Index refresh received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(INDEX_REFRESH_INTERVAL) => {
                        refresh_state.images.load().await;
                    }
                }
            }
        });
    }

    let app = app(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid bind address {}: {}, falling back to 0.0.0.0",
                config.bind_address,
                e
            );
            SocketAddr::from(([0, 0, 0, 0], config.port))
        });
    tracing::info!("Starting server on {}", addr);

    // Create shutdown signal listener
    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
            _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    bg_tasks.shutdown().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}
