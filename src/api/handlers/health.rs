//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Components Checked
///
/// 1. **Database**: `SELECT 1` through the link store
/// 2. **Publish Queue**: Checks that the publish worker is alive and reports free slots
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let db_check = check_database(&state).await;
    let queue_check = check_publish_queue(&state);

    let all_healthy = db_check.is_ok() && queue_check.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database: db_check,
            publish_queue: queue_check,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_database(state: &AppState) -> CheckStatus {
    if state.link_service.ping().await {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Database unreachable")
    }
}

fn check_publish_queue(state: &AppState) -> CheckStatus {
    let dispatcher = &state.click_dispatcher;
    if dispatcher.is_closed() {
        CheckStatus::error("Publish queue is closed")
    } else {
        CheckStatus::ok(format!(
            "Free slots: {}/{}",
            dispatcher.capacity(),
            dispatcher.max_capacity()
        ))
    }
}
