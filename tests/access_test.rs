// tests/access_test.rs — Ordered access rules, capacity, invitations, leave
// cleanup

mod common;

use std::sync::atomic::Ordering;

use common::{identity, seed_agent, seed_meeting, world};
use parley::core::types::{DenyReason, JoinDecision, ParticipantRole, Visibility};
use parley::infra::errors::ParleyError;

#[tokio::test]
async fn test_unknown_meeting_is_denied_not_found() {
    let w = world().await;
    let decision = w.access.can_join("ghost", &identity("u-1")).await.unwrap();
    assert_eq!(
        decision,
        JoinDecision::Denied {
            reason: DenyReason::NotFound
        }
    );
}

#[tokio::test]
async fn test_owner_joins_as_host() {
    let w = world().await;
    seed_agent(&w.store, "agent-1", "owner-1").await;
    seed_meeting(&w.store, "m-1", "owner-1", "agent-1", Visibility::Restricted, None).await;

    assert_eq!(
        w.access.can_join("m-1", &identity("owner-1")).await.unwrap(),
        JoinDecision::Allowed {
            role: ParticipantRole::Host
        }
    );
    let role = w.access.join("m-1", &identity("owner-1")).await.unwrap();
    assert_eq!(role, ParticipantRole::Host);
}

#[tokio::test]
async fn test_public_meeting_admits_participants() {
    let w = world().await;
    seed_agent(&w.store, "agent-1", "owner-1").await;
    seed_meeting(&w.store, "m-1", "owner-1", "agent-1", Visibility::Public, None).await;

    let role = w.access.join("m-1", &identity("u-1")).await.unwrap();
    assert_eq!(role, ParticipantRole::Participant);
}

#[tokio::test]
async fn test_restricted_meeting_requires_invitation() {
    let w = world().await;
    seed_agent(&w.store, "agent-1", "owner-1").await;
    seed_meeting(&w.store, "m-1", "owner-1", "agent-1", Visibility::Restricted, None).await;

    assert_eq!(
        w.access.can_join("m-1", &identity("u-1")).await.unwrap(),
        JoinDecision::Denied {
            reason: DenyReason::InvitationRequired
        }
    );
    let err = w.access.join("m-1", &identity("u-1")).await.unwrap_err();
    assert!(matches!(err, ParleyError::Conflict(_)));
}

#[tokio::test]
async fn test_invited_identity_is_admitted_and_invitation_accepted() {
    let w = world().await;
    seed_agent(&w.store, "agent-1", "owner-1").await;
    seed_meeting(&w.store, "m-1", "owner-1", "agent-1", Visibility::Restricted, None).await;

    w.access
        .invite("m-1", &identity("owner-1"), &["u-1@example.com".into()])
        .await
        .unwrap();

    // Checking is side-effect free: the invitation stays PENDING.
    assert_eq!(
        w.access.can_join("m-1", &identity("u-1")).await.unwrap(),
        JoinDecision::Allowed {
            role: ParticipantRole::Participant
        }
    );
    assert_eq!(
        w.store
            .get_invitation("m-1", "u-1@example.com")
            .await
            .unwrap()
            .unwrap()
            .status,
        parley::core::types::InvitationStatus::Pending
    );

    // Joining accepts it.
    w.access.join("m-1", &identity("u-1")).await.unwrap();
    assert_eq!(
        w.store
            .get_invitation("m-1", "u-1@example.com")
            .await
            .unwrap()
            .unwrap()
            .status,
        parley::core::types::InvitationStatus::Accepted
    );

    // Access monotonicity: the accepted invitation still admits them.
    assert_eq!(
        w.access.can_join("m-1", &identity("u-1")).await.unwrap(),
        JoinDecision::Allowed {
            role: ParticipantRole::Participant
        }
    );
}

#[tokio::test]
async fn test_capacity_denial_beats_pending_invitation() {
    let w = world().await;
    seed_agent(&w.store, "agent-1", "owner-1").await;
    seed_meeting(&w.store, "m-1", "owner-1", "agent-1", Visibility::Restricted, Some(2)).await;

    w.access
        .invite(
            "m-1",
            &identity("owner-1"),
            &[
                "u-1@example.com".into(),
                "u-2@example.com".into(),
                "u-3@example.com".into(),
            ],
        )
        .await
        .unwrap();

    w.access.join("m-1", &identity("u-1")).await.unwrap();
    w.access.join("m-1", &identity("u-2")).await.unwrap();

    // Two present participants, capacity 2: the third invitee is turned away
    // with "full", invitation or not.
    assert_eq!(
        w.access.can_join("m-1", &identity("u-3")).await.unwrap(),
        JoinDecision::Denied {
            reason: DenyReason::Full
        }
    );
    let err = w.access.join("m-1", &identity("u-3")).await.unwrap_err();
    match err {
        ParleyError::Conflict(msg) => assert_eq!(msg, "full"),
        other => panic!("expected Conflict, got {other}"),
    }
}

#[tokio::test]
async fn test_host_bypasses_capacity() {
    let w = world().await;
    seed_agent(&w.store, "agent-1", "owner-1").await;
    seed_meeting(&w.store, "m-1", "owner-1", "agent-1", Visibility::Public, Some(1)).await;

    w.access.join("m-1", &identity("u-1")).await.unwrap();
    let role = w.access.join("m-1", &identity("owner-1")).await.unwrap();
    assert_eq!(role, ParticipantRole::Host);
}

#[tokio::test]
async fn test_rejoin_after_leaving() {
    let w = world().await;
    seed_agent(&w.store, "agent-1", "owner-1").await;
    seed_meeting(&w.store, "m-1", "owner-1", "agent-1", Visibility::Public, None).await;

    w.access.join("m-1", &identity("u-1")).await.unwrap();
    w.access.leave("m-1", &identity("u-1")).await.unwrap();
    assert!(w
        .store
        .get_participant("m-1", "u-1")
        .await
        .unwrap()
        .unwrap()
        .left_at
        .is_some());

    w.access.join("m-1", &identity("u-1")).await.unwrap();
    assert!(w
        .store
        .get_participant("m-1", "u-1")
        .await
        .unwrap()
        .unwrap()
        .left_at
        .is_none());
}

#[tokio::test]
async fn test_leave_without_joining_is_not_found() {
    let w = world().await;
    seed_agent(&w.store, "agent-1", "owner-1").await;
    seed_meeting(&w.store, "m-1", "owner-1", "agent-1", Visibility::Public, None).await;

    let err = w.access.leave("m-1", &identity("u-1")).await.unwrap_err();
    assert!(matches!(err, ParleyError::NotFound("participant")));
}

#[tokio::test]
async fn test_host_leaving_disconnects_active_agent() {
    let w = world().await;
    seed_agent(&w.store, "agent-1", "owner-1").await;
    seed_meeting(&w.store, "m-1", "owner-1", "agent-1", Visibility::Public, None).await;

    w.access.join("m-1", &identity("owner-1")).await.unwrap();
    w.agents
        .connect("m-1", "agent-1", "Agent", "Be helpful.")
        .await
        .unwrap();

    w.access.leave("m-1", &identity("owner-1")).await.unwrap();

    // No billable session keeps running unattended.
    let telemetry = w.store.agent_telemetry("m-1").await.unwrap().unwrap();
    assert!(!telemetry.active);
    assert_eq!(w.calls.open_sessions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_host_leave_succeeds_even_when_cleanup_fails() {
    let w = world().await;
    seed_agent(&w.store, "agent-1", "owner-1").await;
    seed_meeting(&w.store, "m-1", "owner-1", "agent-1", Visibility::Public, None).await;

    w.access.join("m-1", &identity("owner-1")).await.unwrap();
    w.agents
        .connect("m-1", "agent-1", "Agent", "Be helpful.")
        .await
        .unwrap();

    // Both disconnect legs fail; the leave must still complete.
    w.calls.fail_close.store(true, Ordering::SeqCst);
    w.calls.fail_remove.store(true, Ordering::SeqCst);
    w.access.leave("m-1", &identity("owner-1")).await.unwrap();

    assert!(w
        .store
        .get_participant("m-1", "owner-1")
        .await
        .unwrap()
        .unwrap()
        .left_at
        .is_some());
}

#[tokio::test]
async fn test_non_host_leaving_keeps_agent_connected() {
    let w = world().await;
    seed_agent(&w.store, "agent-1", "owner-1").await;
    seed_meeting(&w.store, "m-1", "owner-1", "agent-1", Visibility::Public, None).await;

    w.access.join("m-1", &identity("u-1")).await.unwrap();
    w.agents
        .connect("m-1", "agent-1", "Agent", "Be helpful.")
        .await
        .unwrap();

    w.access.leave("m-1", &identity("u-1")).await.unwrap();
    assert!(w.store.agent_telemetry("m-1").await.unwrap().unwrap().active);
}

#[tokio::test]
async fn test_only_hosts_may_invite() {
    let w = world().await;
    seed_agent(&w.store, "agent-1", "owner-1").await;
    seed_meeting(&w.store, "m-1", "owner-1", "agent-1", Visibility::Public, None).await;

    w.access.join("m-1", &identity("u-1")).await.unwrap();
    let err = w
        .access
        .invite("m-1", &identity("u-1"), &["x@example.com".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Forbidden(_)));

    let err = w
        .access
        .invite("m-1", &identity("owner-1"), &["not-an-email".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Validation(_)));
}
