//! Router configuration: routes, middleware layers and shared state.

use std::time::Duration;

use axum::{
    http::{header, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers::{
    create_collection, delete_collection, describe_collection, extract, health, index_faces,
    list_collections, list_faces, search_faces_by_image,
};
use crate::state::AppState;

/// Create the application router with default layer settings.
pub fn create_router(state: AppState) -> Router {
    create_router_with_config(state, &Config::default())
}

pub fn create_router_with_config(state: AppState, config: &Config) -> Router {
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!(origins = origins.len(), "CORS restricted");
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        }
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let body_limit = RequestBodyLimitLayer::new(config.body_limit_mb * 1024 * 1024);
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    Router::new()
        .route("/health", get(health))
        .route("/collections", post(create_collection).get(list_collections))
        .route(
            "/collections/{id}",
            get(describe_collection).delete(delete_collection),
        )
        .route("/collections/{id}/faces", get(list_faces))
        .route("/collections/{id}/index-faces", post(index_faces))
        .route(
            "/collections/{id}/search-faces-by-image",
            post(search_faces_by_image),
        )
        .route("/extract", post(extract))
        .with_state(state)
        .layer(cors)
        .layer(body_limit)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
}
