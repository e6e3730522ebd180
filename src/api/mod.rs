use axum::Router;
use std::sync::Arc;

use crate::AppState;

mod error;
mod images;
mod trakt;
mod watching;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/images", images::routes()) // Synced artwork redirects
        .nest("/trakt", trakt::routes()) // Exported Trakt datasets
        .nest("/watching", watching::routes()) // Live Trakt status
}


#[cfg(test)]
mod tests {
    use super::test_support::{get, test_app};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = test_app().await;

        let response = get(&app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let (_dir, app) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/trakt/user/profile")
                    .header(header::ORIGIN, "https://dashboard.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (_dir, app) = test_app().await;

        let response = get(&app, "/api/nothing-here").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
