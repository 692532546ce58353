//! Handler for Prometheus metrics exposition.

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::state::AppState;

/// Renders all metrics in Prometheus text format.
///
/// # Endpoint
///
/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.export() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, state.metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
