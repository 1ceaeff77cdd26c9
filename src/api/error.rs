// src/api/error.rs — ParleyError → HTTP status mapping

use axum::http::StatusCode;
use axum::Json;
use tracing::error;

use crate::api::types::ErrorResponse;
use crate::infra::errors::ParleyError;

/// State-precondition violations ("agent already active", "full") answer 400
/// like any other bad request; upstream and internal failures answer 500 with
/// the detail kept in the logs.
pub fn reject(err: ParleyError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        ParleyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ParleyError::Forbidden(_) => StatusCode::FORBIDDEN,
        ParleyError::NotFound(_) => StatusCode::NOT_FOUND,
        ParleyError::Conflict(_) | ParleyError::Validation(_) => StatusCode::BAD_REQUEST,
        ParleyError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        ParleyError::Database(_)
        | ParleyError::Config(_)
        | ParleyError::Io(_)
        | ParleyError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("request failed: {err}");
        (
            status,
            Json(ErrorResponse {
                error: "internal error".into(),
            }),
        )
    } else {
        (
            status,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
    }
}
