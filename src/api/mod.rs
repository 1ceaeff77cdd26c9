// src/api/mod.rs — HTTP surface: client mutations and the provider webhook

pub mod auth;
pub mod error;
pub mod handlers;
pub mod types;
pub mod webhook;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::core::access::AccessController;
use crate::core::agents::AgentConnectionManager;
use crate::core::processor::EventProcessor;
use crate::infra::config::BillingConfig;
use crate::provider::{CallProvider, ChatProvider, SubscriptionProvider};
use crate::store::StoreHandle;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StoreHandle,
    pub access: Arc<AccessController>,
    pub agents: Arc<AgentConnectionManager>,
    pub processor: Arc<EventProcessor>,
    pub calls: Arc<dyn CallProvider>,
    pub chat: Arc<dyn ChatProvider>,
    pub subscriptions: Arc<dyn SubscriptionProvider>,
    pub billing: BillingConfig,
    pub gateway_token: Option<String>,
    pub http: reqwest::Client,
}

/// Build the axum router with all API routes.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/api/v1/webhook", post(webhook::receive_webhook))
        .route(
            "/api/v1/meetings",
            post(handlers::create_meeting).get(handlers::list_meetings),
        )
        .route(
            "/api/v1/meetings/{id}",
            get(handlers::get_meeting)
                .patch(handlers::update_meeting)
                .delete(handlers::delete_meeting),
        )
        .route("/api/v1/meetings/{id}/cancel", post(handlers::cancel_meeting))
        .route(
            "/api/v1/meetings/{id}/can-join",
            get(handlers::can_join_meeting),
        )
        .route("/api/v1/meetings/{id}/join", post(handlers::join_meeting))
        .route("/api/v1/meetings/{id}/leave", post(handlers::leave_meeting))
        .route(
            "/api/v1/meetings/{id}/invite",
            post(handlers::invite_participants),
        )
        .route(
            "/api/v1/meetings/{id}/participants",
            get(handlers::list_participants),
        )
        .route(
            "/api/v1/meetings/{id}/transcript",
            get(handlers::get_transcript),
        )
        .route(
            "/api/v1/meetings/{id}/agent",
            post(handlers::toggle_agent).get(handlers::agent_status),
        )
        .route(
            "/api/v1/agents",
            post(handlers::create_agent).get(handlers::list_agents),
        )
        .route(
            "/api/v1/agents/{id}",
            get(handlers::get_agent)
                .patch(handlers::update_agent)
                .delete(handlers::delete_agent),
        )
        .route("/api/v1/usage", get(handlers::get_usage))
        .route("/api/v1/tokens/video", post(handlers::video_token))
        .route("/api/v1/tokens/chat", post(handlers::chat_token))
        .route("/api/v1/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the configured address (blocking).
pub async fn start_server(bind: &str, port: u16, state: ApiState) -> anyhow::Result<()> {
    let addr = format!("{bind}:{port}");
    let router = build_router(state);

    tracing::info!("API server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
