// src/store/store_server.rs — Async message passing for Store
//
// One background task owns the rusqlite Connection; every other component
// holds a cloneable StoreHandle. Serializing all access through the actor is
// what makes the single-statement preconditions in store.rs sufficient.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use crate::core::types::{
    Agent, AgentTelemetry, Invitation, Meeting, Participant, ParticipantRole,
};
use crate::store::store::{
    MeetingQuery, NewAgent, NewMeeting, SessionStart, Store, WriteOnce,
};

#[derive(Debug)]
pub enum StoreCommand {
    // Meetings
    InsertMeeting {
        meeting: NewMeeting,
        resp: oneshot::Sender<anyhow::Result<()>>,
    },
    GetMeeting {
        id: String,
        owner: Option<String>,
        resp: oneshot::Sender<anyhow::Result<Option<Meeting>>>,
    },
    ListMeetings {
        query: MeetingQuery,
        resp: oneshot::Sender<anyhow::Result<(Vec<Meeting>, i64)>>,
    },
    UpdateMeeting {
        id: String,
        owner: String,
        name: Option<String>,
        agent_id: Option<String>,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    DeleteMeeting {
        id: String,
        owner: String,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    CancelMeeting {
        id: String,
        owner: String,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    BeginSession {
        id: String,
        at: DateTime<Utc>,
        resp: oneshot::Sender<anyhow::Result<SessionStart>>,
    },
    EndSession {
        id: String,
        at: DateTime<Utc>,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    CompleteProcessing {
        id: String,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    SetTranscriptUrl {
        id: String,
        url: String,
        resp: oneshot::Sender<anyhow::Result<WriteOnce>>,
    },
    SetRecordingUrl {
        id: String,
        url: String,
        resp: oneshot::Sender<anyhow::Result<WriteOnce>>,
    },
    SetSummary {
        id: String,
        summary: String,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    MarkAgentConnected {
        id: String,
        at: DateTime<Utc>,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    MarkAgentDisconnected {
        id: String,
        at: DateTime<Utc>,
        duration_seconds: i64,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    AgentTelemetry {
        id: String,
        resp: oneshot::Sender<anyhow::Result<Option<AgentTelemetry>>>,
    },
    MeetingsWithActiveAgent {
        resp: oneshot::Sender<anyhow::Result<Vec<Meeting>>>,
    },
    TotalAgentSeconds {
        user_id: String,
        resp: oneshot::Sender<anyhow::Result<i64>>,
    },
    CountMeetingsForUser {
        user_id: String,
        resp: oneshot::Sender<anyhow::Result<i64>>,
    },

    // Agents
    InsertAgent {
        agent: NewAgent,
        resp: oneshot::Sender<anyhow::Result<()>>,
    },
    GetAgent {
        id: String,
        owner: Option<String>,
        resp: oneshot::Sender<anyhow::Result<Option<Agent>>>,
    },
    ListAgents {
        user_id: String,
        search: Option<String>,
        page: i64,
        page_size: i64,
        resp: oneshot::Sender<anyhow::Result<(Vec<Agent>, i64)>>,
    },
    UpdateAgent {
        id: String,
        owner: String,
        name: Option<String>,
        instructions: Option<String>,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    DeleteAgent {
        id: String,
        owner: String,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    CountAgentsForUser {
        user_id: String,
        resp: oneshot::Sender<anyhow::Result<i64>>,
    },

    // Participants
    UpsertParticipant {
        meeting_id: String,
        user_id: String,
        role: ParticipantRole,
        at: DateTime<Utc>,
        resp: oneshot::Sender<anyhow::Result<()>>,
    },
    JoinWithCapacity {
        meeting_id: String,
        user_id: String,
        role: ParticipantRole,
        at: DateTime<Utc>,
        max_participants: i64,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    MarkParticipantLeft {
        meeting_id: String,
        user_id: String,
        at: DateTime<Utc>,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    GetParticipant {
        meeting_id: String,
        user_id: String,
        resp: oneshot::Sender<anyhow::Result<Option<Participant>>>,
    },
    ListPresentParticipants {
        meeting_id: String,
        resp: oneshot::Sender<anyhow::Result<Vec<Participant>>>,
    },
    CountPresentParticipants {
        meeting_id: String,
        resp: oneshot::Sender<anyhow::Result<i64>>,
    },

    // Invitations
    UpsertInvitation {
        meeting_id: String,
        email: String,
        invited_by: String,
        at: DateTime<Utc>,
        resp: oneshot::Sender<anyhow::Result<()>>,
    },
    GetInvitation {
        meeting_id: String,
        email: String,
        resp: oneshot::Sender<anyhow::Result<Option<Invitation>>>,
    },
    AcceptInvitation {
        meeting_id: String,
        email: String,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
}

/// A handle to the Store that uses message passing.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

macro_rules! send_command {
    ($self:ident, $variant:ident { $($field:ident $(: $value:expr)?),* $(,)? }) => {{
        let (resp_tx, resp_rx) = oneshot::channel();
        $self
            .tx
            .send(StoreCommand::$variant {
                $($field $(: $value)?,)*
                resp: resp_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("store task is gone"))?;
        resp_rx
            .await
            .map_err(|_| anyhow::anyhow!("store task dropped the reply"))?
    }};
}

impl StoreHandle {
    pub fn new(tx: mpsc::Sender<StoreCommand>) -> Self {
        Self { tx }
    }

    // -- Meetings --

    pub async fn insert_meeting(&self, meeting: NewMeeting) -> anyhow::Result<()> {
        send_command!(self, InsertMeeting { meeting })
    }

    pub async fn get_meeting(
        &self,
        id: &str,
        owner: Option<&str>,
    ) -> anyhow::Result<Option<Meeting>> {
        send_command!(self, GetMeeting {
            id: id.to_string(),
            owner: owner.map(str::to_string),
        })
    }

    pub async fn list_meetings(
        &self,
        query: MeetingQuery,
    ) -> anyhow::Result<(Vec<Meeting>, i64)> {
        send_command!(self, ListMeetings { query })
    }

    pub async fn update_meeting(
        &self,
        id: &str,
        owner: &str,
        name: Option<String>,
        agent_id: Option<String>,
    ) -> anyhow::Result<bool> {
        send_command!(self, UpdateMeeting {
            id: id.to_string(),
            owner: owner.to_string(),
            name,
            agent_id,
        })
    }

    pub async fn delete_meeting(&self, id: &str, owner: &str) -> anyhow::Result<bool> {
        send_command!(self, DeleteMeeting {
            id: id.to_string(),
            owner: owner.to_string(),
        })
    }

    pub async fn cancel_meeting(&self, id: &str, owner: &str) -> anyhow::Result<bool> {
        send_command!(self, CancelMeeting {
            id: id.to_string(),
            owner: owner.to_string(),
        })
    }

    pub async fn begin_session(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<SessionStart> {
        send_command!(self, BeginSession {
            id: id.to_string(),
            at,
        })
    }

    pub async fn end_session(&self, id: &str, at: DateTime<Utc>) -> anyhow::Result<bool> {
        send_command!(self, EndSession {
            id: id.to_string(),
            at,
        })
    }

    pub async fn complete_processing(&self, id: &str) -> anyhow::Result<bool> {
        send_command!(self, CompleteProcessing { id: id.to_string() })
    }

    pub async fn set_transcript_url(&self, id: &str, url: &str) -> anyhow::Result<WriteOnce> {
        send_command!(self, SetTranscriptUrl {
            id: id.to_string(),
            url: url.to_string(),
        })
    }

    pub async fn set_recording_url(&self, id: &str, url: &str) -> anyhow::Result<WriteOnce> {
        send_command!(self, SetRecordingUrl {
            id: id.to_string(),
            url: url.to_string(),
        })
    }

    pub async fn set_summary(&self, id: &str, summary: &str) -> anyhow::Result<bool> {
        send_command!(self, SetSummary {
            id: id.to_string(),
            summary: summary.to_string(),
        })
    }

    pub async fn mark_agent_connected(&self, id: &str, at: DateTime<Utc>) -> anyhow::Result<bool> {
        send_command!(self, MarkAgentConnected {
            id: id.to_string(),
            at,
        })
    }

    pub async fn mark_agent_disconnected(
        &self,
        id: &str,
        at: DateTime<Utc>,
        duration_seconds: i64,
    ) -> anyhow::Result<bool> {
        send_command!(self, MarkAgentDisconnected {
            id: id.to_string(),
            at,
            duration_seconds,
        })
    }

    pub async fn agent_telemetry(&self, id: &str) -> anyhow::Result<Option<AgentTelemetry>> {
        send_command!(self, AgentTelemetry { id: id.to_string() })
    }

    pub async fn meetings_with_active_agent(&self) -> anyhow::Result<Vec<Meeting>> {
        send_command!(self, MeetingsWithActiveAgent {})
    }

    pub async fn total_agent_seconds(&self, user_id: &str) -> anyhow::Result<i64> {
        send_command!(self, TotalAgentSeconds {
            user_id: user_id.to_string(),
        })
    }

    pub async fn count_meetings_for_user(&self, user_id: &str) -> anyhow::Result<i64> {
        send_command!(self, CountMeetingsForUser {
            user_id: user_id.to_string(),
        })
    }

    // -- Agents --

    pub async fn insert_agent(&self, agent: NewAgent) -> anyhow::Result<()> {
        send_command!(self, InsertAgent { agent })
    }

    pub async fn get_agent(
        &self,
        id: &str,
        owner: Option<&str>,
    ) -> anyhow::Result<Option<Agent>> {
        send_command!(self, GetAgent {
            id: id.to_string(),
            owner: owner.map(str::to_string),
        })
    }

    pub async fn list_agents(
        &self,
        user_id: &str,
        search: Option<String>,
        page: i64,
        page_size: i64,
    ) -> anyhow::Result<(Vec<Agent>, i64)> {
        send_command!(self, ListAgents {
            user_id: user_id.to_string(),
            search,
            page,
            page_size,
        })
    }

    pub async fn update_agent(
        &self,
        id: &str,
        owner: &str,
        name: Option<String>,
        instructions: Option<String>,
    ) -> anyhow::Result<bool> {
        send_command!(self, UpdateAgent {
            id: id.to_string(),
            owner: owner.to_string(),
            name,
            instructions,
        })
    }

    pub async fn delete_agent(&self, id: &str, owner: &str) -> anyhow::Result<bool> {
        send_command!(self, DeleteAgent {
            id: id.to_string(),
            owner: owner.to_string(),
        })
    }

    pub async fn count_agents_for_user(&self, user_id: &str) -> anyhow::Result<i64> {
        send_command!(self, CountAgentsForUser {
            user_id: user_id.to_string(),
        })
    }

    // -- Participants --

    pub async fn upsert_participant(
        &self,
        meeting_id: &str,
        user_id: &str,
        role: ParticipantRole,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        send_command!(self, UpsertParticipant {
            meeting_id: meeting_id.to_string(),
            user_id: user_id.to_string(),
            role,
            at,
        })
    }

    pub async fn join_with_capacity(
        &self,
        meeting_id: &str,
        user_id: &str,
        role: ParticipantRole,
        at: DateTime<Utc>,
        max_participants: i64,
    ) -> anyhow::Result<bool> {
        send_command!(self, JoinWithCapacity {
            meeting_id: meeting_id.to_string(),
            user_id: user_id.to_string(),
            role,
            at,
            max_participants,
        })
    }

    pub async fn mark_participant_left(
        &self,
        meeting_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        send_command!(self, MarkParticipantLeft {
            meeting_id: meeting_id.to_string(),
            user_id: user_id.to_string(),
            at,
        })
    }

    pub async fn get_participant(
        &self,
        meeting_id: &str,
        user_id: &str,
    ) -> anyhow::Result<Option<Participant>> {
        send_command!(self, GetParticipant {
            meeting_id: meeting_id.to_string(),
            user_id: user_id.to_string(),
        })
    }

    pub async fn list_present_participants(
        &self,
        meeting_id: &str,
    ) -> anyhow::Result<Vec<Participant>> {
        send_command!(self, ListPresentParticipants {
            meeting_id: meeting_id.to_string(),
        })
    }

    pub async fn count_present_participants(&self, meeting_id: &str) -> anyhow::Result<i64> {
        send_command!(self, CountPresentParticipants {
            meeting_id: meeting_id.to_string(),
        })
    }

    // -- Invitations --

    pub async fn upsert_invitation(
        &self,
        meeting_id: &str,
        email: &str,
        invited_by: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        send_command!(self, UpsertInvitation {
            meeting_id: meeting_id.to_string(),
            email: email.to_string(),
            invited_by: invited_by.to_string(),
            at,
        })
    }

    pub async fn get_invitation(
        &self,
        meeting_id: &str,
        email: &str,
    ) -> anyhow::Result<Option<Invitation>> {
        send_command!(self, GetInvitation {
            meeting_id: meeting_id.to_string(),
            email: email.to_string(),
        })
    }

    pub async fn accept_invitation(&self, meeting_id: &str, email: &str) -> anyhow::Result<bool> {
        send_command!(self, AcceptInvitation {
            meeting_id: meeting_id.to_string(),
            email: email.to_string(),
        })
    }
}

/// Helper to spawn the store server and return a handle.
pub fn spawn_store_server(store: Store) -> (StoreHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(256);
    let handle = StoreHandle::new(tx);
    let join_handle = tokio::spawn(run_store_server(store, rx));
    (handle, join_handle)
}

/// The background task that owns the Store.
pub async fn run_store_server(store: Store, mut rx: mpsc::Receiver<StoreCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::InsertMeeting { meeting, resp } => {
                let _ = resp.send(store.insert_meeting(&meeting));
            }
            StoreCommand::GetMeeting { id, owner, resp } => {
                let _ = resp.send(store.get_meeting(&id, owner.as_deref()));
            }
            StoreCommand::ListMeetings { query, resp } => {
                let _ = resp.send(store.list_meetings(&query));
            }
            StoreCommand::UpdateMeeting {
                id,
                owner,
                name,
                agent_id,
                resp,
            } => {
                let _ = resp.send(store.update_meeting(
                    &id,
                    &owner,
                    name.as_deref(),
                    agent_id.as_deref(),
                ));
            }
            StoreCommand::DeleteMeeting { id, owner, resp } => {
                let _ = resp.send(store.delete_meeting(&id, &owner));
            }
            StoreCommand::CancelMeeting { id, owner, resp } => {
                let _ = resp.send(store.cancel_meeting(&id, &owner));
            }
            StoreCommand::BeginSession { id, at, resp } => {
                let _ = resp.send(store.begin_session(&id, at));
            }
            StoreCommand::EndSession { id, at, resp } => {
                let _ = resp.send(store.end_session(&id, at));
            }
            StoreCommand::CompleteProcessing { id, resp } => {
                let _ = resp.send(store.complete_processing(&id));
            }
            StoreCommand::SetTranscriptUrl { id, url, resp } => {
                let _ = resp.send(store.set_transcript_url(&id, &url));
            }
            StoreCommand::SetRecordingUrl { id, url, resp } => {
                let _ = resp.send(store.set_recording_url(&id, &url));
            }
            StoreCommand::SetSummary { id, summary, resp } => {
                let _ = resp.send(store.set_summary(&id, &summary));
            }
            StoreCommand::MarkAgentConnected { id, at, resp } => {
                let _ = resp.send(store.mark_agent_connected(&id, at));
            }
            StoreCommand::MarkAgentDisconnected {
                id,
                at,
                duration_seconds,
                resp,
            } => {
                let _ = resp.send(store.mark_agent_disconnected(&id, at, duration_seconds));
            }
            StoreCommand::AgentTelemetry { id, resp } => {
                let _ = resp.send(store.agent_telemetry(&id));
            }
            StoreCommand::MeetingsWithActiveAgent { resp } => {
                let _ = resp.send(store.meetings_with_active_agent());
            }
            StoreCommand::TotalAgentSeconds { user_id, resp } => {
                let _ = resp.send(store.total_agent_seconds(&user_id));
            }
            StoreCommand::CountMeetingsForUser { user_id, resp } => {
                let _ = resp.send(store.count_meetings_for_user(&user_id));
            }
            StoreCommand::InsertAgent { agent, resp } => {
                let _ = resp.send(store.insert_agent(&agent));
            }
            StoreCommand::GetAgent { id, owner, resp } => {
                let _ = resp.send(store.get_agent(&id, owner.as_deref()));
            }
            StoreCommand::ListAgents {
                user_id,
                search,
                page,
                page_size,
                resp,
            } => {
                let _ = resp.send(store.list_agents(&user_id, search.as_deref(), page, page_size));
            }
            StoreCommand::UpdateAgent {
                id,
                owner,
                name,
                instructions,
                resp,
            } => {
                let _ = resp.send(store.update_agent(
                    &id,
                    &owner,
                    name.as_deref(),
                    instructions.as_deref(),
                ));
            }
            StoreCommand::DeleteAgent { id, owner, resp } => {
                let _ = resp.send(store.delete_agent(&id, &owner));
            }
            StoreCommand::CountAgentsForUser { user_id, resp } => {
                let _ = resp.send(store.count_agents_for_user(&user_id));
            }
            StoreCommand::UpsertParticipant {
                meeting_id,
                user_id,
                role,
                at,
                resp,
            } => {
                let _ = resp.send(store.upsert_participant(&meeting_id, &user_id, role, at));
            }
            StoreCommand::JoinWithCapacity {
                meeting_id,
                user_id,
                role,
                at,
                max_participants,
                resp,
            } => {
                let _ = resp.send(store.join_with_capacity(
                    &meeting_id,
                    &user_id,
                    role,
                    at,
                    max_participants,
                ));
            }
            StoreCommand::MarkParticipantLeft {
                meeting_id,
                user_id,
                at,
                resp,
            } => {
                let _ = resp.send(store.mark_participant_left(&meeting_id, &user_id, at));
            }
            StoreCommand::GetParticipant {
                meeting_id,
                user_id,
                resp,
            } => {
                let _ = resp.send(store.get_participant(&meeting_id, &user_id));
            }
            StoreCommand::ListPresentParticipants { meeting_id, resp } => {
                let _ = resp.send(store.list_present_participants(&meeting_id));
            }
            StoreCommand::CountPresentParticipants { meeting_id, resp } => {
                let _ = resp.send(store.count_present_participants(&meeting_id));
            }
            StoreCommand::UpsertInvitation {
                meeting_id,
                email,
                invited_by,
                at,
                resp,
            } => {
                let _ = resp.send(store.upsert_invitation(&meeting_id, &email, &invited_by, at));
            }
            StoreCommand::GetInvitation {
                meeting_id,
                email,
                resp,
            } => {
                let _ = resp.send(store.get_invitation(&meeting_id, &email));
            }
            StoreCommand::AcceptInvitation {
                meeting_id,
                email,
                resp,
            } => {
                let _ = resp.send(store.accept_invitation(&meeting_id, &email));
            }
        }
    }
}
