// src/core/agents.rs — Agent connection manager
//
// Owns the registry of live real-time AI sessions, keyed by meeting id.
// connect/disconnect for the same meeting serialize on a per-meeting async
// mutex; the store's preconditioned agent marks are the final arbiter, so
// even a racing caller that slips past the link check cannot double-connect
// or double-bill.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::infra::config::RealtimeConfig;
use crate::infra::errors::{ParleyError, Result};
use crate::provider::avatar::{avatar_uri, AvatarVariant};
use crate::provider::{CallProvider, ProviderUser, RealtimeSession, SessionConfig};
use crate::store::StoreHandle;

/// Link state for one meeting's agent. Explicit states instead of inferring
/// "connected" from nullable timestamps.
pub enum AgentLink {
    Disconnected,
    Connecting,
    Connected {
        since: DateTime<Utc>,
        session: Box<dyn RealtimeSession>,
    },
    Disconnecting,
}

impl AgentLink {
    fn is_engaged(&self) -> bool {
        matches!(
            self,
            AgentLink::Connecting | AgentLink::Connected { .. } | AgentLink::Disconnecting
        )
    }
}

pub struct AgentConnectionManager {
    store: StoreHandle,
    calls: Arc<dyn CallProvider>,
    realtime: RealtimeConfig,
    links: Mutex<HashMap<String, Arc<tokio::sync::Mutex<AgentLink>>>>,
}

impl AgentConnectionManager {
    pub fn new(store: StoreHandle, calls: Arc<dyn CallProvider>, realtime: RealtimeConfig) -> Self {
        Self {
            store,
            calls,
            realtime,
            links: Mutex::new(HashMap::new()),
        }
    }

    fn link_for(&self, meeting_id: &str) -> Arc<tokio::sync::Mutex<AgentLink>> {
        let mut links = self.links.lock().unwrap_or_else(|p| p.into_inner());
        links
            .entry(meeting_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(AgentLink::Disconnected)))
            .clone()
    }

    fn drop_link(&self, meeting_id: &str) {
        let mut links = self.links.lock().unwrap_or_else(|p| p.into_inner());
        links.remove(meeting_id);
    }

    /// Whether this process holds a live session for the meeting.
    pub async fn has_live_session(&self, meeting_id: &str) -> bool {
        let link = self.link_for(meeting_id);
        let guard = link.lock().await;
        guard.is_engaged()
    }

    /// Attach the agent to the meeting's call: register its provider
    /// identity, open the real-time session on the call audio, configure it
    /// with the agent's instructions, then mark the meeting row. A failure at
    /// any step unwinds completely — the database never says "active" without
    /// a live handle behind it.
    pub async fn connect(
        &self,
        meeting_id: &str,
        agent_id: &str,
        agent_name: &str,
        instructions: &str,
    ) -> Result<()> {
        let link = self.link_for(meeting_id);
        let mut guard = link.lock().await;

        if guard.is_engaged() {
            return Err(ParleyError::Conflict("agent already active".into()));
        }
        let telemetry = self.store.agent_telemetry(meeting_id).await?;
        match telemetry {
            None => return Err(ParleyError::NotFound("meeting")),
            Some(t) if t.active => {
                return Err(ParleyError::Conflict("agent already active".into()));
            }
            Some(_) => {}
        }

        *guard = AgentLink::Connecting;

        match self.open_session(meeting_id, agent_id, agent_name, instructions).await {
            Ok(session) => {
                let now = Utc::now();
                match self.store.mark_agent_connected(meeting_id, now).await {
                    Ok(true) => {
                        *guard = AgentLink::Connected { since: now, session };
                        info!("agent {agent_id} connected to meeting {meeting_id}");
                        Ok(())
                    }
                    Ok(false) => {
                        // Lost the precondition race; leave the winner alone.
                        if let Err(e) = session.close().await {
                            warn!("closing session after lost connect race: {e}");
                        }
                        *guard = AgentLink::Disconnected;
                        Err(ParleyError::Conflict("agent already active".into()))
                    }
                    Err(e) => {
                        if let Err(close_err) = session.close().await {
                            warn!("closing session after failed connect mark: {close_err}");
                        }
                        *guard = AgentLink::Disconnected;
                        Err(e.into())
                    }
                }
            }
            Err(e) => {
                *guard = AgentLink::Disconnected;
                Err(e)
            }
        }
    }

    async fn open_session(
        &self,
        meeting_id: &str,
        agent_id: &str,
        agent_name: &str,
        instructions: &str,
    ) -> Result<Box<dyn RealtimeSession>> {
        let bot = ProviderUser::bot(
            agent_id,
            agent_name,
            Some(avatar_uri(agent_name, AvatarVariant::BotttsNeutral)),
        );
        self.calls.upsert_user(&bot).await?;

        let session = self.calls.connect_realtime_agent(meeting_id, agent_id).await?;

        let config = SessionConfig {
            instructions: instructions.to_string(),
            voice: self.realtime.voice.clone(),
            vad_threshold: self.realtime.vad_threshold,
            vad_prefix_padding_ms: self.realtime.vad_prefix_padding_ms,
            vad_silence_duration_ms: self.realtime.vad_silence_duration_ms,
        };
        if let Err(e) = session.configure(&config).await {
            if let Err(close_err) = session.close().await {
                warn!("closing session after failed configure: {close_err}");
            }
            return Err(e);
        }
        Ok(session)
    }

    /// Detach the agent and fold the session into the billing total. The
    /// session close and the membership removal are independent failure
    /// domains and both are attempted; billing is finalized unless both fail.
    /// Returns the seconds billed for the just-ended session.
    pub async fn disconnect(&self, meeting_id: &str) -> Result<i64> {
        let link = self.link_for(meeting_id);
        let mut guard = link.lock().await;

        let meeting = self
            .store
            .get_meeting(meeting_id, None)
            .await?
            .ok_or(ParleyError::NotFound("meeting"))?;
        if !meeting.agent_active {
            return Err(ParleyError::Conflict("agent not active".into()));
        }

        let previous = std::mem::replace(&mut *guard, AgentLink::Disconnecting);
        let (since, session) = match previous {
            AgentLink::Connected { since, session } => (Some(since), Some(session)),
            // No local handle (e.g. the process restarted); membership
            // removal below is still attempted to avoid an orphaned billable
            // connection.
            _ => (None, None),
        };

        let close_failed = match &session {
            Some(s) => match s.close().await {
                Ok(()) => false,
                Err(e) => {
                    warn!("closing real-time session for meeting {meeting_id}: {e}");
                    true
                }
            },
            None => {
                warn!("no live session handle for meeting {meeting_id}, removing membership only");
                false
            }
        };

        let remove_failed = match self.calls.remove_member(meeting_id, &meeting.agent_id).await {
            Ok(()) => false,
            Err(e) => {
                warn!("removing agent from call {meeting_id}: {e}");
                true
            }
        };

        if close_failed && remove_failed {
            // Nothing succeeded; keep the handle so a retry can try again.
            *guard = match (since, session) {
                (Some(since), Some(session)) => AgentLink::Connected { since, session },
                _ => AgentLink::Disconnected,
            };
            return Err(ParleyError::Upstream {
                service: "call-provider",
                message: "agent disconnect failed: session close and membership removal both failed"
                    .into(),
            });
        }

        let now = Utc::now();
        let connected_at = meeting.agent_connected_at.or(since);
        // Missing timestamp counts as zero elapsed time; negative clock skew
        // clamps to zero. Billing never errors.
        let duration_seconds = connected_at
            .map(|at| (now - at).num_seconds().max(0))
            .unwrap_or(0);

        if !self
            .store
            .mark_agent_disconnected(meeting_id, now, duration_seconds)
            .await?
        {
            warn!("meeting {meeting_id} was already marked disconnected");
        }

        if close_failed || remove_failed {
            warn!(
                "partial agent disconnect for meeting {meeting_id} (billed {duration_seconds}s); \
                 operator follow-up needed"
            );
        } else {
            info!("agent disconnected from meeting {meeting_id} after {duration_seconds}s");
        }

        *guard = AgentLink::Disconnected;
        drop(guard);
        self.drop_link(meeting_id);
        Ok(duration_seconds)
    }

    /// Crash-recovery sweep: rows that claim a live agent in a freshly
    /// started process have no handle behind them. Finalize them as stale so
    /// the billing totals stay honest.
    pub async fn reconcile(&self) -> Result<usize> {
        let stale = self.store.meetings_with_active_agent().await?;
        let mut finalized = 0;

        for meeting in stale {
            if self.has_live_session(&meeting.id).await {
                continue;
            }
            let now = Utc::now();
            let duration_seconds = meeting
                .agent_connected_at
                .map(|at| (now - at).num_seconds().max(0))
                .unwrap_or(0);

            if self
                .store
                .mark_agent_disconnected(&meeting.id, now, duration_seconds)
                .await?
            {
                finalized += 1;
                warn!(
                    "finalized stale agent session for meeting {} ({duration_seconds}s)",
                    meeting.id
                );
            }
            if let Err(e) = self.calls.remove_member(&meeting.id, &meeting.agent_id).await {
                warn!("removing stale agent from call {}: {e}", meeting.id);
            }
        }
        Ok(finalized)
    }
}
