//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /{alias}`                - Short link redirect
//! - `GET  /health`                 - Health check: database, publish queue
//! - `GET  /metrics`                - Prometheus metrics
//! - `POST /api/v1/shorter`         - Create a short link
//! - `GET  /api/v1/stats/{alias}`   - Aggregated click statistics
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::{health_handler, metrics_handler, redirect_handler};
use crate::api::middleware::tracing;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with all routes and middleware.
///
/// Static routes take precedence over `/{alias}`, which is why `health`,
/// `metrics` and `api` are reserved aliases.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/{alias}", get(redirect_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api::routes::v1_routes())
        .with_state(state)
        .layer(tracing::layer())
}

/// [`app_router`] with trailing slashes trimmed before routing.
pub fn app_service(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(app_router(state))
}
