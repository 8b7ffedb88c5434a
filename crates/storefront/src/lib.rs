//! Catalog bridge storefront library.
//!
//! Fetches a remote product catalog, renders it through the
//! `[api_products]` directive, and syncs it into the local catalog. The
//! binary in `main.rs` and the integration tests both build the router here.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod remote;
pub mod render;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, http::Request};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use state::AppState;

/// Directory holding the stylesheet and placeholder image.
pub const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

/// Build the full application router.
///
/// Layers, innermost first: sync trigger, sessions, request ID, tracing,
/// Sentry.
pub fn app<S>(state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = middleware::create_session_layer(session_store, state.config());
    let media_dir = state.config().media_dir.clone();

    Router::new()
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .nest_service("/media", ServeDir::new(media_dir))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::sync_trigger_middleware,
        ))
        .layer(session_layer)
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{
        CacheConfig, RemoteCatalogConfig, StorefrontConfig, SyncConfig,
    };
    use crate::state::Repositories;

    fn test_app() -> Router {
        let config = StorefrontConfig {
            database_url: secrecy::SecretString::from("postgres://unused"),
            host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: 0,
            base_url: "http://localhost:3000".to_string(),
            session_secret: secrecy::SecretString::from("test-session-secret"),
            remote: RemoteCatalogConfig::default(),
            cache: CacheConfig::default(),
            sync: SyncConfig::default(),
            media_dir: std::env::temp_dir(),
            home_content: "<p>Welcome</p>".to_string(),
            debug: false,
            sentry_dsn: None,
            sentry_environment: None,
        };
        let state = AppState::new(config, Repositories::in_memory()).unwrap();
        app(state, tower_sessions::MemoryStore::default())
    }

    async fn status_of(uri: &str) -> StatusCode {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        test_app().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(status_of("/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_home_without_directive() {
        assert_eq!(status_of("/").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_anonymous_sync_trigger_on_any_route() {
        assert_eq!(status_of("/?sync_products").await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of("/products/anything?sync_products=1").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_unknown_product_not_found() {
        assert_eq!(status_of("/products/missing").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_response_carries_request_id() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
