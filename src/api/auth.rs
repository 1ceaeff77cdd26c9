// src/api/auth.rs
//
// Session issuance is an external collaborator: the auth gateway terminates
// the user session and forwards the verified identity in headers, proving
// itself with a shared bearer token.

use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::api::{types::ErrorResponse, ApiState};
use crate::core::types::Identity;

/// Verify the gateway bearer token (if configured) and extract the caller's
/// identity from the forwarded headers.
pub fn authenticate(
    state: &ApiState,
    headers: &HeaderMap,
) -> Result<Identity, (StatusCode, Json<ErrorResponse>)> {
    if let Some(ref expected) = state.gateway_token {
        let auth_header = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let token = auth_header.strip_prefix("Bearer ").unwrap_or("");
        if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing bearer token".into(),
                }),
            ));
        }
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let Some(user_id) = header("x-user-id").filter(|v| !v.is_empty()) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "No authenticated identity".into(),
            }),
        ));
    };

    Ok(Identity {
        email: header("x-user-email").unwrap_or_default(),
        name: header("x-user-name").unwrap_or_else(|| user_id.clone()),
        user_id,
    })
}

/// Constant-time byte comparison to prevent timing attacks on token auth.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
