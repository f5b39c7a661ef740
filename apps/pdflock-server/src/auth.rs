//! API key check for the /api/pdf routes

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ServerError;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Middleware: require `X-API-Key` to match the configured key.
///
/// With no key configured, requests are let through outside production.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let expected = match state.api_key.as_deref() {
        Some(key) => key,
        None if !state.is_production() => {
            warn!(environment = %state.environment, "API key authentication skipped");
            return Ok(next.run(request).await);
        }
        None => "",
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    let verdict = match provided {
        None => Err(ServerError::MissingApiKey),
        Some(key) if expected.is_empty() || key != expected => Err(ServerError::InvalidApiKey),
        Some(_) => Ok(()),
    };
    if let Err(err) = verdict {
        warn!(path = %request.uri().path(), reason = %err, "API key rejected");
        return Err(err);
    }

    Ok(next.run(request).await)
}
