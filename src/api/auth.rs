// =============================================================================
// Bearer Token Authentication — Axum Extractor
// =============================================================================
//
// Extracts and validates a Bearer token from the `Authorization` header.
// The expected token comes from `REGIME_ADMIN_TOKEN`, read once at startup and
// held by `AppState`. Comparison is performed in constant time.
//
// Usage:
//
//   async fn handler(_auth: AuthBearer, ...) { ... }
//
// If no admin token is configured every authenticated request is refused, so
// the mutating endpoints are effectively disabled.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::app_state::AppState;

// =============================================================================
// Constant-time comparison
// =============================================================================

/// Compare two byte slices without an early exit on the first mismatch.
/// A length mismatch returns immediately; the expected length is not secret.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Check `presented` against the configured admin token.
pub fn token_matches(expected: Option<&str>, presented: &str) -> bool {
    match expected {
        Some(expected) => constant_time_eq(presented.as_bytes(), expected.as_bytes()),
        None => false,
    }
}

// =============================================================================
// Extractor
// =============================================================================

/// Proof that the request carried the admin token.
pub struct AuthBearer;

/// Rejection type returned when authentication fails.
pub struct AuthRejection {
    status: StatusCode,
    message: &'static str,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, axum::Json(body)).into_response()
    }
}

impl FromRequestParts<Arc<AppState>> for AuthBearer {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token() else {
            warn!("REGIME_ADMIN_TOKEN is not set, rejecting authenticated request");
            return Err(AuthRejection {
                status: StatusCode::FORBIDDEN,
                message: "Server authentication not configured",
            });
        };

        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let Some(token) = token else {
            warn!("Missing or malformed Authorization header");
            return Err(AuthRejection {
                status: StatusCode::UNAUTHORIZED,
                message: "Missing or invalid authorization token",
            });
        };

        if !token_matches(Some(expected), token) {
            warn!("Invalid admin token presented");
            return Err(AuthRejection {
                status: StatusCode::FORBIDDEN,
                message: "Invalid authorization token",
            });
        }

        Ok(AuthBearer)
    }
}

// =============================================================================
// Tests
// =============================================================================
