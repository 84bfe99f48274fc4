// API-key guard for the account and analysis routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

use super::AppState;
use super::error::ApiError;

pub(super) async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let security = &state.security;
    if !security.api_key_enabled {
        return Ok(next.run(request).await);
    }
    let presented = request
        .headers()
        .get(security.api_key_header.as_str())
        .and_then(|v| v.to_str().ok());
    match presented {
        Some(key) if keys_match(key, &security.api_key) => Ok(next.run(request).await),
        _ => {
            tracing::warn!(path = %request.uri().path(), "rejected request with bad API key");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Compares digests so timing depends on neither the key contents nor their lengths.
fn keys_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
