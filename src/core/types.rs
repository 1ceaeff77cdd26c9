// src/core/types.rs — Domain types shared across the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Meeting lifecycle state. UPCOMING → ACTIVE → PROCESSING → COMPLETED, with
/// CANCELLED as the alternate terminal path. COMPLETED and CANCELLED never
/// transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingStatus {
    Upcoming,
    Active,
    Processing,
    Completed,
    Cancelled,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Upcoming => "UPCOMING",
            MeetingStatus::Active => "ACTIVE",
            MeetingStatus::Processing => "PROCESSING",
            MeetingStatus::Completed => "COMPLETED",
            MeetingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UPCOMING" => Some(MeetingStatus::Upcoming),
            "ACTIVE" => Some(MeetingStatus::Active),
            "PROCESSING" => Some(MeetingStatus::Processing),
            "COMPLETED" => Some(MeetingStatus::Completed),
            "CANCELLED" => Some(MeetingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MeetingStatus::Completed | MeetingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Restricted,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Restricted => "restricted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "restricted" => Some(Visibility::Restricted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantRole {
    Host,
    CoHost,
    Participant,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Host => "HOST",
            ParticipantRole::CoHost => "CO_HOST",
            ParticipantRole::Participant => "PARTICIPANT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HOST" => Some(ParticipantRole::Host),
            "CO_HOST" => Some(ParticipantRole::CoHost),
            "PARTICIPANT" => Some(ParticipantRole::Participant),
            _ => None,
        }
    }

    /// Hosts and co-hosts may toggle the agent.
    pub fn can_control_agent(&self) -> bool {
        matches!(self, ParticipantRole::Host | ParticipantRole::CoHost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Accepted,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Accepted => "ACCEPTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(InvitationStatus::Pending),
            "ACCEPTED" => Some(InvitationStatus::Accepted),
            _ => None,
        }
    }
}

/// A meeting row. The meeting id doubles as the call id at the provider.
#[derive(Debug, Clone, Serialize)]
pub struct Meeting {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub agent_id: String,
    pub status: MeetingStatus,
    pub visibility: Visibility,
    pub max_participants: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub transcript_url: Option<String>,
    pub recording_url: Option<String>,
    pub summary: Option<String>,
    pub agent_active: bool,
    pub agent_connected_at: Option<DateTime<Utc>>,
    pub agent_disconnected_at: Option<DateTime<Utc>>,
    pub agent_total_duration: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// Wall-clock meeting length in seconds, once both endpoints exist.
    pub fn wall_duration_seconds(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds().max(0)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub instructions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub meeting_id: String,
    pub user_id: String,
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Invitation {
    pub meeting_id: String,
    pub email: String,
    pub status: InvitationStatus,
    pub invited_by: String,
    pub sent_at: DateTime<Utc>,
}

/// Authenticated caller, as injected by the auth gateway.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

/// Agent usage fields of a meeting row, read together for duration math.
#[derive(Debug, Clone, Copy)]
pub struct AgentTelemetry {
    pub active: bool,
    pub connected_at: Option<DateTime<Utc>>,
    pub total_duration_seconds: i64,
}

/// Why a join was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NotFound,
    Full,
    InvitationRequired,
}

impl DenyReason {
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::NotFound => "not found",
            DenyReason::Full => "full",
            DenyReason::InvitationRequired => "invitation required",
        }
    }
}

/// Outcome of the ordered access rules. Checking is side-effect free; only
/// `join` itself mutates rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    Allowed { role: ParticipantRole },
    Denied { reason: DenyReason },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            MeetingStatus::Upcoming,
            MeetingStatus::Active,
            MeetingStatus::Processing,
            MeetingStatus::Completed,
            MeetingStatus::Cancelled,
        ] {
            assert_eq!(MeetingStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(MeetingStatus::parse("ARCHIVED"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(MeetingStatus::Completed.is_terminal());
        assert!(MeetingStatus::Cancelled.is_terminal());
        assert!(!MeetingStatus::Processing.is_terminal());
    }

    #[test]
    fn test_role_agent_control() {
        assert!(ParticipantRole::Host.can_control_agent());
        assert!(ParticipantRole::CoHost.can_control_agent());
        assert!(!ParticipantRole::Participant.can_control_agent());
    }
}
