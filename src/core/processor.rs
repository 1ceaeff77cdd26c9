// src/core/processor.rs — Webhook event processor
//
// The only component allowed to transition meeting status from
// provider-observed reality. Delivery is at-least-once and unordered, so
// every arm is safe to re-apply: transitions ride on the store's
// preconditioned updates, and duplicates degrade to logged no-ops instead of
// errors so the provider's retry loop stays quiet.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::agents::AgentConnectionManager;
use crate::core::events::CallEvent;
use crate::core::types::MeetingStatus;
use crate::infra::errors::{ParleyError, Result};
use crate::jobs::{SummarizeJob, SummaryQueue};
use crate::provider::{CallProvider, ChatModel, ChatProvider, ModelMessage};
use crate::store::{SessionStart, StoreHandle, WriteOnce};

pub struct EventProcessor {
    store: StoreHandle,
    agents: Arc<AgentConnectionManager>,
    calls: Arc<dyn CallProvider>,
    chat: Arc<dyn ChatProvider>,
    model: Arc<dyn ChatModel>,
    jobs: SummaryQueue,
    chat_context_messages: usize,
}

impl EventProcessor {
    pub fn new(
        store: StoreHandle,
        agents: Arc<AgentConnectionManager>,
        calls: Arc<dyn CallProvider>,
        chat: Arc<dyn ChatProvider>,
        model: Arc<dyn ChatModel>,
        jobs: SummaryQueue,
        chat_context_messages: usize,
    ) -> Self {
        Self {
            store,
            agents,
            calls,
            chat,
            model,
            jobs,
            chat_context_messages,
        }
    }

    /// Apply one provider event. Ok(()) means the provider gets its 200,
    /// including for no-op duplicates and unrecognized kinds.
    pub async fn handle(&self, event: CallEvent) -> Result<()> {
        match event {
            CallEvent::SessionStarted { meeting_id } => self.on_session_started(&meeting_id).await,
            CallEvent::ParticipantLeft {
                meeting_id,
                user_id,
            } => self.on_participant_left(&meeting_id, &user_id).await,
            CallEvent::SessionEnded { meeting_id } => self.on_session_ended(&meeting_id).await,
            CallEvent::TranscriptionReady { meeting_id, url } => {
                self.on_transcription_ready(&meeting_id, &url).await
            }
            CallEvent::RecordingReady { meeting_id, url } => {
                self.on_recording_ready(&meeting_id, &url).await
            }
            CallEvent::ChatMessage {
                meeting_id,
                author_id,
                text,
            } => self.on_chat_message(&meeting_id, &author_id, &text).await,
            CallEvent::Unrecognized { event_type } => {
                debug!("ignoring unrecognized webhook event '{event_type}'");
                Ok(())
            }
        }
    }

    async fn on_session_started(&self, meeting_id: &str) -> Result<()> {
        match self.store.begin_session(meeting_id, Utc::now()).await? {
            SessionStart::Started => {}
            SessionStart::AlreadyActive => {
                // Duplicate delivery. started_at stays as stamped by the
                // first application and the agent is already on the call.
                info!("meeting {meeting_id} already ACTIVE, skipping session_started");
                return Ok(());
            }
            SessionStart::AlreadyProcessed => {
                info!("meeting {meeting_id} already past ACTIVE, session_started is too late");
                return Err(ParleyError::NotFound("meeting"));
            }
            SessionStart::NotFound => return Err(ParleyError::NotFound("meeting")),
        }

        let meeting = self
            .store
            .get_meeting(meeting_id, None)
            .await?
            .ok_or(ParleyError::NotFound("meeting"))?;
        let agent = self
            .store
            .get_agent(&meeting.agent_id, None)
            .await?
            .ok_or(ParleyError::NotFound("agent"))?;

        // The meeting genuinely is ACTIVE now; a connect failure (say, a
        // missing realtime credential) is logged for the operator rather than
        // bounced back into the provider's retry loop.
        if let Err(e) = self
            .agents
            .connect(meeting_id, &agent.id, &agent.name, &agent.instructions)
            .await
        {
            warn!("connecting agent to meeting {meeting_id}: {e}");
        }
        Ok(())
    }

    async fn on_participant_left(&self, meeting_id: &str, user_id: &str) -> Result<()> {
        let meeting = self
            .store
            .get_meeting(meeting_id, None)
            .await?
            .ok_or(ParleyError::NotFound("meeting"))?;

        if user_id == meeting.agent_id {
            // The agent's call membership went away; the call is over.
            self.calls.end_call(meeting_id).await?;
            info!("agent left meeting {meeting_id}, call ended");
        }
        Ok(())
    }

    async fn on_session_ended(&self, meeting_id: &str) -> Result<()> {
        if !self.store.end_session(meeting_id, Utc::now()).await? {
            info!("ignoring session_ended for meeting {meeting_id} (not ACTIVE)");
            return Ok(());
        }

        // Accounting sweep: a host who never toggled the agent off must not
        // leave an unaccounted billable session behind. Failures are logged;
        // the PROCESSING transition above stands either way.
        let still_active = self
            .store
            .agent_telemetry(meeting_id)
            .await?
            .map(|t| t.active)
            .unwrap_or(false);
        if still_active {
            if let Err(e) = self.agents.disconnect(meeting_id).await {
                warn!("finalizing agent session after meeting {meeting_id} ended: {e}");
            }
        }
        Ok(())
    }

    async fn on_transcription_ready(&self, meeting_id: &str, url: &str) -> Result<()> {
        match self.store.set_transcript_url(meeting_id, url).await? {
            WriteOnce::Set => {
                self.jobs.enqueue(SummarizeJob {
                    meeting_id: meeting_id.to_string(),
                    transcript_url: url.to_string(),
                });
                info!("transcript stored for meeting {meeting_id}, summarization enqueued");
                Ok(())
            }
            WriteOnce::AlreadySet => {
                info!("transcript for meeting {meeting_id} already stored, skipping");
                Ok(())
            }
            WriteOnce::NotFound => Err(ParleyError::NotFound("meeting")),
        }
    }

    async fn on_recording_ready(&self, meeting_id: &str, url: &str) -> Result<()> {
        match self.store.set_recording_url(meeting_id, url).await? {
            WriteOnce::Set => Ok(()),
            WriteOnce::AlreadySet => {
                info!("recording for meeting {meeting_id} already stored, skipping");
                Ok(())
            }
            WriteOnce::NotFound => Err(ParleyError::NotFound("meeting")),
        }
    }

    /// A message in a completed meeting's channel: answer it as the agent,
    /// with the meeting summary and recent channel history as context.
    async fn on_chat_message(&self, meeting_id: &str, author_id: &str, text: &str) -> Result<()> {
        let meeting = self
            .store
            .get_meeting(meeting_id, None)
            .await?
            .ok_or(ParleyError::NotFound("meeting"))?;

        if author_id == meeting.agent_id {
            return Ok(());
        }
        if meeting.status != MeetingStatus::Completed {
            debug!("ignoring chat message for meeting {meeting_id} in {:?}", meeting.status);
            return Ok(());
        }

        let agent = self
            .store
            .get_agent(&meeting.agent_id, None)
            .await?
            .ok_or(ParleyError::NotFound("agent"))?;

        let summary = meeting.summary.as_deref().unwrap_or("(no summary available)");
        let system = format!(
            "You are {}, an AI assistant that attended the meeting \"{}\" and now answers \
             follow-up questions about it.\n\nOriginal instructions:\n{}\n\nMeeting summary:\n{}",
            agent.name, meeting.name, agent.instructions, summary
        );

        let history = self
            .chat
            .recent_messages(meeting_id, self.chat_context_messages)
            .await?;
        let mut messages: Vec<ModelMessage> = history
            .iter()
            .map(|m| {
                if m.user_id == agent.id {
                    ModelMessage::assistant(m.text.clone())
                } else {
                    ModelMessage::user(m.text.clone())
                }
            })
            .collect();
        // The triggering message may already be in the fetched history.
        let already_last = history
            .last()
            .map(|m| m.user_id == author_id && m.text == text)
            .unwrap_or(false);
        if !already_last {
            messages.push(ModelMessage::user(text));
        }

        let reply = self.model.complete(&system, &messages).await?;
        if reply.trim().is_empty() {
            warn!("model returned an empty reply for meeting {meeting_id}");
            return Ok(());
        }
        self.chat.send_message(meeting_id, &agent.id, &reply).await?;
        Ok(())
    }
}
