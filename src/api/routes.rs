//! API route configuration.

use crate::api::handlers::{shorten_handler, stats_handler};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Versioned REST API routes, nested under `/api/v1`.
///
/// # Endpoints
///
/// - `POST /shorter`         - Create a short link
/// - `GET  /stats/{alias}`   - Aggregated click statistics for a link
pub fn v1_routes() -> Router<AppState> {
    Router::new()
        .route("/shorter", post(shorten_handler))
        .route("/stats/{alias}", get(stats_handler))
}
