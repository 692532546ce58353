//! Handler for link statistics.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::domain::entities::AggregatedStats;
use crate::error::AppError;
use crate::state::AppState;

/// Retrieves aggregated statistics for a short link.
///
/// # Endpoint
///
/// `GET /api/v1/stats/{alias}`
///
/// # Response
///
/// ```json
/// {
///   "alias": "abc123",
///   "total_clicks": 3,
///   "unique_ips": 2,
///   "by_country": { "Germany": 2, "unknown": 1 },
///   "by_device": { "desktop": 1, "mobile": 2 },
///   "by_browser": { "Chrome": 2, "Safari": 1 }
/// }
/// ```
///
/// # Errors
///
/// Returns 404 Not Found if the alias doesn't exist.
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(alias): Path<String>,
) -> Result<Json<AggregatedStats>, AppError> {
    let stats = state.stats_service.get_stats(&alias).await?;
    Ok(Json(stats))
}
