// src/api/handlers.rs

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::warn;

use crate::api::error::reject;
use crate::api::{auth, types::*, ApiState};
use crate::core::types::{Identity, JoinDecision, Participant};
use crate::core::usage;
use crate::infra::errors::ParleyError;
use crate::provider::avatar::{avatar_uri, AvatarVariant};
use crate::provider::{parse_transcript_jsonl, ProviderUser};
use crate::store::{MeetingQuery, NewAgent, NewMeeting};

type ApiError = (StatusCode, Json<ErrorResponse>);

const MAX_PAGE_SIZE: i64 = 100;
const TOKEN_TTL_SECONDS: i64 = 3600;

fn total_pages(total: i64, page_size: i64) -> i64 {
    (total + page_size - 1) / page_size
}

fn clamp_page_size(page_size: i64) -> i64 {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

async fn is_premium(state: &ApiState, user_id: &str) -> bool {
    match state.subscriptions.is_premium(user_id).await {
        Ok(premium) => premium,
        Err(e) => {
            // A billing outage must not lock users out; treat as free tier.
            warn!("subscription lookup for {user_id}: {e}");
            false
        }
    }
}

// -- Meetings --

/// POST /api/v1/meetings — Create a meeting and its provider call object.
pub async fn create_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<CreateMeetingRequest>,
) -> Result<(StatusCode, Json<MeetingResponse>), ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    if body.name.trim().is_empty() {
        return Err(reject(ParleyError::Validation(
            "meeting name cannot be empty".into(),
        )));
    }
    if let Some(max) = body.max_participants {
        if max < 1 {
            return Err(reject(ParleyError::Validation(
                "max_participants must be at least 1".into(),
            )));
        }
    }

    if !is_premium(&state, &identity.user_id).await {
        let count = state
            .store
            .count_meetings_for_user(&identity.user_id)
            .await
            .map_err(|e| reject(e.into()))?;
        if count >= state.billing.max_free_meetings {
            return Err(reject(ParleyError::Forbidden(
                "free tier meeting limit reached".into(),
            )));
        }
    }

    let agent = state
        .store
        .get_agent(&body.agent_id, Some(&identity.user_id))
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(ParleyError::NotFound("agent")))?;

    let meeting_id = uuid::Uuid::new_v4().to_string();
    state
        .store
        .insert_meeting(NewMeeting {
            id: meeting_id.clone(),
            name: body.name.trim().to_string(),
            user_id: identity.user_id.clone(),
            agent_id: agent.id.clone(),
            visibility: body
                .visibility
                .unwrap_or(crate::core::types::Visibility::Restricted),
            max_participants: body.max_participants,
        })
        .await
        .map_err(|e| reject(e.into()))?;

    // Register identities and the call object up front so the agent is ready
    // to join the moment the session starts.
    let creator = ProviderUser::person(
        &identity.user_id,
        &identity.name,
        Some(avatar_uri(&identity.name, AvatarVariant::Initials)),
    );
    let bot = ProviderUser::bot(
        &agent.id,
        &agent.name,
        Some(avatar_uri(&agent.name, AvatarVariant::BotttsNeutral)),
    );
    state.calls.upsert_user(&creator).await.map_err(reject)?;
    state.calls.upsert_user(&bot).await.map_err(reject)?;
    state
        .calls
        .create_call(&meeting_id, &identity.user_id, body.name.trim())
        .await
        .map_err(reject)?;

    let meeting = state
        .store
        .get_meeting(&meeting_id, None)
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(ParleyError::NotFound("meeting")))?;

    Ok((StatusCode::CREATED, Json(meeting.into())))
}

/// GET /api/v1/meetings — Paginated list with search/status/agent filters.
pub async fn list_meetings(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(params): Query<ListMeetingsParams>,
) -> Result<Json<MeetingListResponse>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let page_size = clamp_page_size(params.page_size);
    let (items, total) = state
        .store
        .list_meetings(MeetingQuery {
            user_id: identity.user_id,
            search: params.search,
            status: params.status,
            agent_id: params.agent_id,
            page: params.page.max(1),
            page_size,
        })
        .await
        .map_err(|e| reject(e.into()))?;

    Ok(Json(MeetingListResponse {
        items: items.into_iter().map(MeetingResponse::from).collect(),
        total,
        total_pages: total_pages(total, page_size),
    }))
}

/// GET /api/v1/meetings/{id}
pub async fn get_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MeetingResponse>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let meeting = state
        .store
        .get_meeting(&id, Some(&identity.user_id))
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(ParleyError::NotFound("meeting")))?;
    Ok(Json(meeting.into()))
}

/// PATCH /api/v1/meetings/{id}
pub async fn update_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateMeetingRequest>,
) -> Result<Json<MeetingResponse>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    if let Some(ref agent_id) = body.agent_id {
        state
            .store
            .get_agent(agent_id, Some(&identity.user_id))
            .await
            .map_err(|e| reject(e.into()))?
            .ok_or_else(|| reject(ParleyError::NotFound("agent")))?;
    }

    let updated = state
        .store
        .update_meeting(&id, &identity.user_id, body.name, body.agent_id)
        .await
        .map_err(|e| reject(e.into()))?;
    if !updated {
        return Err(reject(ParleyError::NotFound("meeting")));
    }

    let meeting = state
        .store
        .get_meeting(&id, Some(&identity.user_id))
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(ParleyError::NotFound("meeting")))?;
    Ok(Json(meeting.into()))
}

/// DELETE /api/v1/meetings/{id}
pub async fn delete_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let deleted = state
        .store
        .delete_meeting(&id, &identity.user_id)
        .await
        .map_err(|e| reject(e.into()))?;
    if !deleted {
        return Err(reject(ParleyError::NotFound("meeting")));
    }
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

/// POST /api/v1/meetings/{id}/cancel — Owner cancel, UPCOMING only.
pub async fn cancel_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MeetingResponse>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let cancelled = state
        .store
        .cancel_meeting(&id, &identity.user_id)
        .await
        .map_err(|e| reject(e.into()))?;
    if !cancelled {
        let existing = state
            .store
            .get_meeting(&id, Some(&identity.user_id))
            .await
            .map_err(|e| reject(e.into()))?;
        return Err(match existing {
            None => reject(ParleyError::NotFound("meeting")),
            Some(m) => reject(ParleyError::Conflict(format!(
                "cannot cancel a meeting in {}",
                m.status.as_str()
            ))),
        });
    }

    let meeting = state
        .store
        .get_meeting(&id, Some(&identity.user_id))
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(ParleyError::NotFound("meeting")))?;
    Ok(Json(meeting.into()))
}

// -- Access --

/// GET /api/v1/meetings/{id}/can-join — Side-effect-free access check.
pub async fn can_join_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CanJoinResponse>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let decision = state
        .access
        .can_join(&id, &identity)
        .await
        .map_err(reject)?;
    Ok(Json(match decision {
        JoinDecision::Allowed { role } => CanJoinResponse {
            can_join: true,
            role: Some(role),
            reason: None,
        },
        JoinDecision::Denied { reason } => CanJoinResponse {
            can_join: false,
            role: None,
            reason: Some(reason.message().into()),
        },
    }))
}

/// POST /api/v1/meetings/{id}/join
pub async fn join_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<JoinResponse>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let role = state.access.join(&id, &identity).await.map_err(reject)?;
    Ok(Json(JoinResponse { role }))
}

/// POST /api/v1/meetings/{id}/leave
pub async fn leave_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    state.access.leave(&id, &identity).await.map_err(reject)?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// POST /api/v1/meetings/{id}/invite
pub async fn invite_participants(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<InviteRequest>,
) -> Result<Json<InviteResponse>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let sent = state
        .access
        .invite(&id, &identity, &body.emails)
        .await
        .map_err(reject)?;
    Ok(Json(InviteResponse { sent }))
}

/// GET /api/v1/meetings/{id}/participants — Everyone currently present.
pub async fn list_participants(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    auth::authenticate(&state, &headers)?;

    state
        .store
        .get_meeting(&id, None)
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(ParleyError::NotFound("meeting")))?;

    let participants = state
        .store
        .list_present_participants(&id)
        .await
        .map_err(|e| reject(e.into()))?;
    Ok(Json(participants))
}

// -- Transcript --

/// GET /api/v1/meetings/{id}/transcript — Transcript items with speakers
/// resolved.
pub async fn get_transcript(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<TranscriptEntry>>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let meeting = state
        .store
        .get_meeting(&id, Some(&identity.user_id))
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(ParleyError::NotFound("meeting")))?;

    let Some(url) = meeting.transcript_url else {
        return Ok(Json(Vec::new()));
    };

    let raw = match state.http.get(&url).send().await {
        Ok(resp) => resp.text().await.unwrap_or_default(),
        Err(e) => {
            warn!("fetching transcript for meeting {id}: {e}");
            return Ok(Json(Vec::new()));
        }
    };

    let agent = state
        .store
        .get_agent(&meeting.agent_id, None)
        .await
        .map_err(|e| reject(e.into()))?;

    let entries = parse_transcript_jsonl(&raw)
        .into_iter()
        .map(|item| {
            let (speaker_name, speaker_image) = match &agent {
                Some(a) if a.id == item.speaker_id => (
                    a.name.clone(),
                    avatar_uri(&a.name, AvatarVariant::BotttsNeutral),
                ),
                _ if item.speaker_id.is_empty() => (
                    "Unknown".to_string(),
                    avatar_uri("Unknown", AvatarVariant::Initials),
                ),
                _ => (
                    item.speaker_id.clone(),
                    avatar_uri(&item.speaker_id, AvatarVariant::Initials),
                ),
            };
            TranscriptEntry {
                speaker_id: item.speaker_id,
                speaker_name,
                speaker_image,
                text: item.text,
            }
        })
        .collect();

    Ok(Json(entries))
}

// -- Agent toggle / status --

/// POST /api/v1/meetings/{id}/agent — Toggle the agent on or off.
pub async fn toggle_agent(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ToggleAgentRequest>,
) -> Result<Json<ToggleAgentResponse>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let meeting = state
        .store
        .get_meeting(&id, None)
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(ParleyError::NotFound("meeting")))?;

    let may_control = identity.user_id == meeting.user_id || {
        state
            .store
            .get_participant(&id, &identity.user_id)
            .await
            .map_err(|e| reject(e.into()))?
            .map(|p| p.role.can_control_agent())
            .unwrap_or(false)
    };
    if !may_control {
        return Err(reject(ParleyError::Forbidden(
            "only the host or a co-host may toggle the agent".into(),
        )));
    }

    if body.enable {
        let agent = state
            .store
            .get_agent(&meeting.agent_id, None)
            .await
            .map_err(|e| reject(e.into()))?
            .ok_or_else(|| reject(ParleyError::NotFound("agent")))?;
        state
            .agents
            .connect(&id, &agent.id, &agent.name, &agent.instructions)
            .await
            .map_err(reject)?;
        Ok(Json(ToggleAgentResponse {
            success: true,
            agent_active: true,
            duration_seconds: None,
        }))
    } else {
        let duration_seconds = state.agents.disconnect(&id).await.map_err(reject)?;
        Ok(Json(ToggleAgentResponse {
            success: true,
            agent_active: false,
            duration_seconds: Some(duration_seconds),
        }))
    }
}

/// GET /api/v1/meetings/{id}/agent — Live agent status, computed on read.
pub async fn agent_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AgentStatusResponse>, ApiError> {
    auth::authenticate(&state, &headers)?;

    let telemetry = state
        .store
        .agent_telemetry(&id)
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(ParleyError::NotFound("meeting")))?;

    Ok(Json(AgentStatusResponse {
        is_active: telemetry.active,
        duration: usage::current_duration_seconds(&telemetry, chrono::Utc::now()),
    }))
}

// -- Agents --

/// POST /api/v1/agents
pub async fn create_agent(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<crate::core::types::Agent>), ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    if body.name.trim().is_empty() || body.instructions.trim().is_empty() {
        return Err(reject(ParleyError::Validation(
            "agent name and instructions are required".into(),
        )));
    }

    if !is_premium(&state, &identity.user_id).await {
        let count = state
            .store
            .count_agents_for_user(&identity.user_id)
            .await
            .map_err(|e| reject(e.into()))?;
        if count >= state.billing.max_free_agents {
            return Err(reject(ParleyError::Forbidden(
                "free tier agent limit reached".into(),
            )));
        }
    }

    let agent_id = uuid::Uuid::new_v4().to_string();
    state
        .store
        .insert_agent(NewAgent {
            id: agent_id.clone(),
            user_id: identity.user_id.clone(),
            name: body.name.trim().to_string(),
            instructions: body.instructions.trim().to_string(),
        })
        .await
        .map_err(|e| reject(e.into()))?;

    let agent = state
        .store
        .get_agent(&agent_id, Some(&identity.user_id))
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(ParleyError::NotFound("agent")))?;
    Ok((StatusCode::CREATED, Json(agent)))
}

/// GET /api/v1/agents
pub async fn list_agents(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(params): Query<ListAgentsParams>,
) -> Result<Json<AgentListResponse>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let page_size = clamp_page_size(params.page_size);
    let (items, total) = state
        .store
        .list_agents(
            &identity.user_id,
            params.search,
            params.page.max(1),
            page_size,
        )
        .await
        .map_err(|e| reject(e.into()))?;

    Ok(Json(AgentListResponse {
        items,
        total,
        total_pages: total_pages(total, page_size),
    }))
}

/// GET /api/v1/agents/{id}
pub async fn get_agent(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<crate::core::types::Agent>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let agent = state
        .store
        .get_agent(&id, Some(&identity.user_id))
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(ParleyError::NotFound("agent")))?;
    Ok(Json(agent))
}

/// PATCH /api/v1/agents/{id} — Edits apply to future meetings only; a live
/// session keeps the instructions it was configured with.
pub async fn update_agent(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateAgentRequest>,
) -> Result<Json<crate::core::types::Agent>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let updated = state
        .store
        .update_agent(&id, &identity.user_id, body.name, body.instructions)
        .await
        .map_err(|e| reject(e.into()))?;
    if !updated {
        return Err(reject(ParleyError::NotFound("agent")));
    }

    let agent = state
        .store
        .get_agent(&id, Some(&identity.user_id))
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(ParleyError::NotFound("agent")))?;
    Ok(Json(agent))
}

/// DELETE /api/v1/agents/{id}
pub async fn delete_agent(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let deleted = state
        .store
        .delete_agent(&id, &identity.user_id)
        .await
        .map_err(|e| reject(e.into()))?;
    if !deleted {
        return Err(reject(ParleyError::NotFound("agent")));
    }
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

// -- Usage --

/// GET /api/v1/usage — Cross-meeting agent usage; cost suppressed for
/// premium accounts.
pub async fn get_usage(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<usage::UsageReport>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let premium = is_premium(&state, &identity.user_id).await;
    let report = usage::usage_report(&state.store, &state.billing, &identity.user_id, premium)
        .await
        .map_err(|e| reject(e.into()))?;
    Ok(Json(report))
}

// -- Tokens --

/// POST /api/v1/tokens/video — Call-provider token for the caller.
pub async fn video_token(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let user = provider_identity(&identity);
    state.calls.upsert_user(&user).await.map_err(reject)?;
    let token = state
        .calls
        .user_token(&identity.user_id, TOKEN_TTL_SECONDS)
        .map_err(reject)?;
    Ok(Json(TokenResponse { token }))
}

/// POST /api/v1/tokens/chat — Chat-provider token for the caller.
pub async fn chat_token(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let identity = auth::authenticate(&state, &headers)?;

    let user = provider_identity(&identity);
    state.chat.upsert_user(&user).await.map_err(reject)?;
    let token = state
        .chat
        .user_token(&identity.user_id, TOKEN_TTL_SECONDS)
        .map_err(reject)?;
    Ok(Json(TokenResponse { token }))
}

fn provider_identity(identity: &Identity) -> ProviderUser {
    ProviderUser::person(
        &identity.user_id,
        &identity.name,
        Some(avatar_uri(&identity.name, AvatarVariant::Initials)),
    )
}

/// GET /api/v1/health — Simple health check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
