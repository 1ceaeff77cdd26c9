// src/api/types.rs

use serde::{Deserialize, Serialize};

use crate::core::types::{Meeting, MeetingStatus, ParticipantRole, Visibility};

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// -- Meetings --

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMeetingRequest {
    pub name: String,
    pub agent_id: String,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub max_participants: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMeetingRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
}

/// A meeting plus its derived wall-clock duration.
#[derive(Debug, Serialize)]
pub struct MeetingResponse {
    #[serde(flatten)]
    pub meeting: Meeting,
    pub duration: Option<i64>,
}

impl From<Meeting> for MeetingResponse {
    fn from(meeting: Meeting) -> Self {
        let duration = meeting.wall_duration_seconds();
        Self { meeting, duration }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListMeetingsParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<MeetingStatus>,
    #[serde(default)]
    pub agent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeetingListResponse {
    pub items: Vec<MeetingResponse>,
    pub total: i64,
    pub total_pages: i64,
}

// -- Agents --

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub instructions: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAgentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListAgentsParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AgentListResponse {
    pub items: Vec<crate::core::types::Agent>,
    pub total: i64,
    pub total_pages: i64,
}

// -- Access --

#[derive(Debug, Serialize)]
pub struct CanJoinResponse {
    pub can_join: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ParticipantRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub role: ParticipantRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteRequest {
    pub emails: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub sent: usize,
}

// -- Agent toggle / status --

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleAgentRequest {
    pub enable: bool,
}

#[derive(Debug, Serialize)]
pub struct ToggleAgentResponse {
    pub success: bool,
    pub agent_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AgentStatusResponse {
    pub is_active: bool,
    pub duration: i64,
}

// -- Transcript --

#[derive(Debug, Serialize)]
pub struct TranscriptEntry {
    pub speaker_id: String,
    pub speaker_name: String,
    pub speaker_image: String,
    pub text: String,
}

// -- Tokens --

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}
