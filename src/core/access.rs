// src/core/access.rs — Access controller
//
// Who may join a meeting, in a fixed rule order: existence, ownership,
// capacity, visibility, invitation. `can_join` is side-effect free and safely
// repeatable; `join` re-derives the decision itself rather than trusting a
// possibly-stale check.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::core::agents::AgentConnectionManager;
use crate::core::types::{
    DenyReason, Identity, InvitationStatus, JoinDecision, Meeting, ParticipantRole,
};
use crate::infra::errors::{ParleyError, Result};
use crate::store::StoreHandle;

pub struct AccessController {
    store: StoreHandle,
    agents: Arc<AgentConnectionManager>,
}

impl AccessController {
    pub fn new(store: StoreHandle, agents: Arc<AgentConnectionManager>) -> Self {
        Self { store, agents }
    }

    /// Evaluate the ordered access rules without touching any state.
    pub async fn can_join(&self, meeting_id: &str, identity: &Identity) -> Result<JoinDecision> {
        let Some(meeting) = self.store.get_meeting(meeting_id, None).await? else {
            return Ok(JoinDecision::Denied {
                reason: DenyReason::NotFound,
            });
        };
        self.evaluate(&meeting, identity).await
    }

    async fn evaluate(&self, meeting: &Meeting, identity: &Identity) -> Result<JoinDecision> {
        if identity.user_id == meeting.user_id {
            return Ok(JoinDecision::Allowed {
                role: ParticipantRole::Host,
            });
        }

        // Capacity is checked before visibility and invitations: a full
        // meeting turns everyone away, invited or not.
        if let Some(max) = meeting.max_participants {
            let mut present = self.store.count_present_participants(&meeting.id).await?;
            // A present participant re-checking their own access does not
            // count against themselves.
            if let Some(row) = self
                .store
                .get_participant(&meeting.id, &identity.user_id)
                .await?
            {
                if row.left_at.is_none() {
                    present -= 1;
                }
            }
            if present >= max {
                return Ok(JoinDecision::Denied {
                    reason: DenyReason::Full,
                });
            }
        }

        if meeting.visibility == crate::core::types::Visibility::Public {
            return Ok(JoinDecision::Allowed {
                role: ParticipantRole::Participant,
            });
        }

        let invitation = self
            .store
            .get_invitation(&meeting.id, &identity.email)
            .await?;
        match invitation {
            Some(inv)
                if inv.status == InvitationStatus::Pending
                    || inv.status == InvitationStatus::Accepted =>
            {
                Ok(JoinDecision::Allowed {
                    role: ParticipantRole::Participant,
                })
            }
            _ => Ok(JoinDecision::Denied {
                reason: DenyReason::InvitationRequired,
            }),
        }
    }

    /// Join the meeting: re-validate, create or revive the participant row,
    /// and accept a matching pending invitation. The capacity check and the
    /// row insert are one conditional statement in the store, so two joiners
    /// racing at the limit cannot both land.
    pub async fn join(&self, meeting_id: &str, identity: &Identity) -> Result<ParticipantRole> {
        let meeting = self
            .store
            .get_meeting(meeting_id, None)
            .await?
            .ok_or(ParleyError::NotFound("meeting"))?;

        let role = match self.evaluate(&meeting, identity).await? {
            JoinDecision::Allowed { role } => role,
            JoinDecision::Denied { reason } => {
                return Err(match reason {
                    DenyReason::NotFound => ParleyError::NotFound("meeting"),
                    _ => ParleyError::Conflict(reason.message().into()),
                });
            }
        };

        let now = Utc::now();
        match (role, meeting.max_participants) {
            // Hosts bypass capacity entirely.
            (ParticipantRole::Host, _) | (_, None) => {
                self.store
                    .upsert_participant(meeting_id, &identity.user_id, role, now)
                    .await?;
            }
            (_, Some(max)) => {
                let landed = self
                    .store
                    .join_with_capacity(meeting_id, &identity.user_id, role, now, max)
                    .await?;
                if !landed {
                    return Err(ParleyError::Conflict(DenyReason::Full.message().into()));
                }
            }
        }

        // Accepting is a side effect of joining, not of checking.
        self.store
            .accept_invitation(meeting_id, &identity.email)
            .await?;

        Ok(role)
    }

    /// Stamp `left_at`. A departing owner with a live agent session triggers
    /// a best-effort disconnect so no billable session runs unattended; that
    /// cleanup is logged and never blocks the leave.
    pub async fn leave(&self, meeting_id: &str, identity: &Identity) -> Result<()> {
        let meeting = self
            .store
            .get_meeting(meeting_id, None)
            .await?
            .ok_or(ParleyError::NotFound("meeting"))?;

        let left = self
            .store
            .mark_participant_left(meeting_id, &identity.user_id, Utc::now())
            .await?;
        if !left {
            return Err(ParleyError::NotFound("participant"));
        }

        if identity.user_id == meeting.user_id && meeting.agent_active {
            if let Err(e) = self.agents.disconnect(meeting_id).await {
                warn!("auto-disconnect after host left meeting {meeting_id}: {e}");
            }
        }

        Ok(())
    }

    /// Invite a batch of email addresses. Host or co-host only; re-inviting
    /// resets an invitation to PENDING.
    pub async fn invite(
        &self,
        meeting_id: &str,
        identity: &Identity,
        emails: &[String],
    ) -> Result<usize> {
        let meeting = self
            .store
            .get_meeting(meeting_id, None)
            .await?
            .ok_or(ParleyError::NotFound("meeting"))?;

        let may_invite = identity.user_id == meeting.user_id || {
            self.store
                .get_participant(meeting_id, &identity.user_id)
                .await?
                .map(|p| p.role.can_control_agent())
                .unwrap_or(false)
        };
        if !may_invite {
            return Err(ParleyError::Forbidden(
                "only the host or a co-host may invite".into(),
            ));
        }

        let now = Utc::now();
        let mut sent = 0;
        for email in emails {
            let email = email.trim();
            if email.is_empty() || !email.contains('@') {
                return Err(ParleyError::Validation(format!(
                    "invalid email address '{email}'"
                )));
            }
            self.store
                .upsert_invitation(meeting_id, email, &identity.user_id, now)
                .await?;
            sent += 1;
        }
        Ok(sent)
    }
}
