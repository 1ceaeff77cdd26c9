// src/provider/mod.rs — External collaborators behind trait seams
//
// The engine only sees these traits; HTTP clients live in the submodules and
// tests substitute fakes.

pub mod avatar;
pub mod billing;
pub mod chat;
pub mod model;
pub mod video;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::infra::errors::ParleyError;

/// An identity registered with the call or chat provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderUser {
    pub id: String,
    pub name: String,
    pub role: String,
    pub image: Option<String>,
}

impl ProviderUser {
    pub fn person(id: impl Into<String>, name: impl Into<String>, image: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: "admin".into(),
            image,
        }
    }

    pub fn bot(id: impl Into<String>, name: impl Into<String>, image: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: "user".into(),
            image,
        }
    }
}

/// Session parameters for a connected real-time agent. The turn-detection
/// values keep the agent from talking over participants.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    pub instructions: String,
    pub voice: String,
    pub vad_threshold: f32,
    pub vad_prefix_padding_ms: u32,
    pub vad_silence_duration_ms: u32,
}

/// A message in a provider chat channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub user_id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// One line of a provider transcript blob (JSONL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptItem {
    pub speaker_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub start_ts: Option<serde_json::Value>,
    #[serde(default)]
    pub stop_ts: Option<serde_json::Value>,
}

/// Parse a JSONL transcript, skipping lines that do not parse — transcripts
/// are best-effort provider output, not a strict format.
pub fn parse_transcript_jsonl(raw: &str) -> Vec<TranscriptItem> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

/// The external audio/video transport: call objects, membership, webhook
/// signatures, user tokens, and the bridge that joins a real-time AI session
/// to a call's audio.
#[async_trait]
pub trait CallProvider: Send + Sync {
    async fn upsert_user(&self, user: &ProviderUser) -> Result<(), ParleyError>;

    /// Create the call object for a meeting (the meeting id is the call id),
    /// with transcription and recording switched on.
    async fn create_call(
        &self,
        call_id: &str,
        created_by: &str,
        meeting_name: &str,
    ) -> Result<(), ParleyError>;

    async fn end_call(&self, call_id: &str) -> Result<(), ParleyError>;

    async fn remove_member(&self, call_id: &str, user_id: &str) -> Result<(), ParleyError>;

    /// Open a real-time AI session bound to the call's audio, joined as
    /// `agent_user_id`. Returns the live handle; the caller owns its lifetime.
    async fn connect_realtime_agent(
        &self,
        call_id: &str,
        agent_user_id: &str,
    ) -> Result<Box<dyn RealtimeSession>, ParleyError>;

    /// Constant-time webhook signature check. Must pass before any event is
    /// processed.
    fn verify_webhook(&self, body: &[u8], signature: &str) -> bool;

    fn user_token(&self, user_id: &str, ttl_seconds: i64) -> Result<String, ParleyError>;
}

/// Live handle to one real-time AI session. Never persisted; at most one per
/// agent at a time, owned by the agent connection manager.
#[async_trait]
pub trait RealtimeSession: Send + Sync {
    async fn configure(&self, config: &SessionConfig) -> Result<(), ParleyError>;
    async fn close(&self) -> Result<(), ParleyError>;
}

/// The chat provider: post-meeting Q&A channels.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn upsert_user(&self, user: &ProviderUser) -> Result<(), ParleyError>;

    /// Most recent messages in a channel, oldest first.
    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ParleyError>;

    async fn send_message(
        &self,
        channel_id: &str,
        author_id: &str,
        text: &str,
    ) -> Result<(), ParleyError>;

    fn user_token(&self, user_id: &str, ttl_seconds: i64) -> Result<String, ParleyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub content: String,
}

impl ModelMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::Assistant,
            content: content.into(),
        }
    }
}

/// Conversational completion endpoint (summaries, post-meeting replies).
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        messages: &[ModelMessage],
    ) -> Result<String, ParleyError>;
}

/// The billing/subscription provider. Lookup failures are treated as "free
/// account" by callers, never as request failures.
#[async_trait]
pub trait SubscriptionProvider: Send + Sync {
    async fn is_premium(&self, user_id: &str) -> Result<bool, ParleyError>;
}
