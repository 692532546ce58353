//! Handler for link shortening endpoint.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::json;
use validator::Validate;

use crate::api::dto::shorten::{ShortenRequest, ShortenResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short link.
///
/// # Endpoint
///
/// `POST /api/v1/shorter`
///
/// # Request Body
///
/// ```json
/// {
///   "original_url": "https://example.com/some/page",
///   "custom_alias": "promo2025",   // optional
///   "expires_in": 3600             // optional, seconds
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "short_url": "http://localhost:3000/promo2025",
///   "expires_at": "2025-01-01T13:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// - 400 Bad Request if the body is not valid JSON for this shape
/// - 422 Unprocessable Entity if validation fails
/// - 409 Conflict if the custom alias is already in use
pub async fn shorten_handler(
    State(state): State<AppState>,
    payload: Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShortenResponse>), AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        AppError::bad_request(
            "Invalid request body",
            json!({ "reason": rejection.body_text() }),
        )
    })?;

    payload.validate()?;

    let link = state
        .link_service
        .create_short_link(payload.original_url, payload.custom_alias, payload.expires_in)
        .await?;

    tracing::info!(alias = %link.alias, "Short link created");

    Ok((
        StatusCode::CREATED,
        Json(ShortenResponse {
            short_url: state.link_service.short_url(&link.alias),
            expires_at: link.expires_at,
        }),
    ))
}
