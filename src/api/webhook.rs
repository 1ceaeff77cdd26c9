// src/api/webhook.rs — Inbound call-provider webhook endpoint
//
// Signature verification gates entry entirely: nothing is parsed, let alone
// applied, until the HMAC over the raw body checks out. The response
// contract keeps the provider's retry loop sane — 200 for anything handled
// (including no-ops), 4xx only for genuinely bad or premature deliveries.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::error;

use crate::api::ApiState;
use crate::core::events::CallEvent;
use crate::infra::errors::ParleyError;

pub async fn receive_webhook(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    let signature = headers.get("x-signature").and_then(|v| v.to_str().ok());
    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());

    let (Some(signature), Some(_api_key)) = (signature, api_key) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "missing signature or API key" })),
        );
    };

    if !state.calls.verify_webhook(&body, signature) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid signature" })),
        );
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "invalid JSON" })),
            );
        }
    };

    let event = match CallEvent::parse(&payload) {
        Ok(event) => event,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            );
        }
    };

    match state.processor.handle(event).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ok" })),
        ),
        Err(ParleyError::NotFound(what)) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("{what} not found") })),
        ),
        Err(ParleyError::Validation(msg)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": msg })),
        ),
        Err(e) => {
            error!("webhook processing failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal error" })),
            )
        }
    }
}
