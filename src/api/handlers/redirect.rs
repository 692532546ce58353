//! Handler for short URL redirect.

use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::debug;

use crate::domain::click_event::RawClickFact;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::client_ip::client_ip;

/// Redirects an alias to its original URL.
///
/// # Endpoint
///
/// `GET /{alias}`
///
/// # Request Flow
///
/// 1. Resolve the alias (unknown or expired → 404)
/// 2. Atomically increment the click counter (failures are only logged)
/// 3. Queue a click fact for asynchronous publishing (never waits)
/// 4. Return 302 Found
///
/// # Click Tracking
///
/// Click facts go to a bounded publish queue. If the queue is full, the
/// fact is dropped and counted.
pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(alias): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let link = match state.link_service.resolve(&alias).await {
        Ok(link) => link,
        Err(e) => {
            state.metrics.redirect_errors_total.inc();
            return Err(e);
        }
    };

    state.link_service.record_click(&alias).await;
    state
        .metrics
        .redirects_total
        .with_label_values(&[alias.as_str()])
        .inc();

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let headers = request.headers();

    let fact = RawClickFact::new(
        alias.clone(),
        client_ip(headers, peer),
        header_value(headers, header::USER_AGENT),
        header_value(headers, header::REFERER),
    );

    if !state.click_dispatcher.dispatch(fact) {
        debug!(alias = %alias, "Click fact not queued");
    }

    Ok((StatusCode::FOUND, [(header::LOCATION, link.original_url)]).into_response())
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
