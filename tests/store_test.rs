// tests/store_test.rs — Integration test: SQLite transitions and preconditions

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use rusqlite::Connection;

use parley::core::types::{MeetingStatus, ParticipantRole, Visibility};
use parley::store::{schema, MeetingQuery, NewAgent, NewMeeting, SessionStart, Store, WriteOnce};

/// Create an in-memory SQLite store with schema applied.
fn test_store() -> Store {
    let conn = Connection::open_in_memory().unwrap();
    schema::run_migrations(&conn).unwrap();
    Store::new(conn)
}

fn seed_meeting(store: &Store, id: &str, max_participants: Option<i64>) {
    store
        .insert_meeting(&NewMeeting {
            id: id.to_string(),
            name: format!("Meeting {id}"),
            user_id: "owner-1".into(),
            agent_id: "agent-1".into(),
            visibility: Visibility::Restricted,
            max_participants,
        })
        .unwrap();
}

#[test]
fn test_new_meeting_is_upcoming() {
    let store = test_store();
    seed_meeting(&store, "m-1", None);

    let meeting = store.get_meeting("m-1", None).unwrap().unwrap();
    assert_eq!(meeting.status, MeetingStatus::Upcoming);
    assert!(meeting.started_at.is_none());
    assert!(!meeting.agent_active);
    assert_eq!(meeting.agent_total_duration, 0);
}

#[test]
fn test_begin_session_is_idempotent() {
    let store = test_store();
    seed_meeting(&store, "m-1", None);

    let first = Utc::now();
    assert_eq!(store.begin_session("m-1", first).unwrap(), SessionStart::Started);
    let started_at = store.get_meeting("m-1", None).unwrap().unwrap().started_at;
    assert!(started_at.is_some());

    // A later duplicate must not move started_at.
    let second = first + Duration::seconds(30);
    assert_eq!(
        store.begin_session("m-1", second).unwrap(),
        SessionStart::AlreadyActive
    );
    assert_eq!(
        store.get_meeting("m-1", None).unwrap().unwrap().started_at,
        started_at
    );
}

#[test]
fn test_begin_session_after_end_is_too_late() {
    let store = test_store();
    seed_meeting(&store, "m-1", None);

    store.begin_session("m-1", Utc::now()).unwrap();
    assert!(store.end_session("m-1", Utc::now()).unwrap());
    assert_eq!(
        store.begin_session("m-1", Utc::now()).unwrap(),
        SessionStart::AlreadyProcessed
    );
    assert_eq!(
        store.begin_session("ghost", Utc::now()).unwrap(),
        SessionStart::NotFound
    );
}

#[test]
fn test_end_session_requires_active() {
    let store = test_store();
    seed_meeting(&store, "m-1", None);

    // UPCOMING → no transition.
    assert!(!store.end_session("m-1", Utc::now()).unwrap());

    store.begin_session("m-1", Utc::now()).unwrap();
    assert!(store.end_session("m-1", Utc::now()).unwrap());
    let meeting = store.get_meeting("m-1", None).unwrap().unwrap();
    assert_eq!(meeting.status, MeetingStatus::Processing);
    assert!(meeting.ended_at.is_some());

    // Duplicate session_ended is a no-op.
    assert!(!store.end_session("m-1", Utc::now()).unwrap());
}

#[test]
fn test_complete_processing() {
    let store = test_store();
    seed_meeting(&store, "m-1", None);
    store.begin_session("m-1", Utc::now()).unwrap();
    store.end_session("m-1", Utc::now()).unwrap();

    assert!(store.complete_processing("m-1").unwrap());
    assert_eq!(
        store.get_meeting("m-1", None).unwrap().unwrap().status,
        MeetingStatus::Completed
    );
    assert!(!store.complete_processing("m-1").unwrap());
}

#[test]
fn test_transcript_url_is_write_once() {
    let store = test_store();
    seed_meeting(&store, "m-1", None);

    assert_eq!(
        store.set_transcript_url("m-1", "https://cdn/x.jsonl").unwrap(),
        WriteOnce::Set
    );
    assert_eq!(
        store.set_transcript_url("m-1", "https://cdn/other.jsonl").unwrap(),
        WriteOnce::AlreadySet
    );
    assert_eq!(
        store
            .get_meeting("m-1", None)
            .unwrap()
            .unwrap()
            .transcript_url
            .as_deref(),
        Some("https://cdn/x.jsonl")
    );
    assert_eq!(
        store.set_transcript_url("ghost", "https://cdn/x.jsonl").unwrap(),
        WriteOnce::NotFound
    );
}

#[test]
fn test_agent_marks_accumulate_duration() {
    let store = test_store();
    seed_meeting(&store, "m-1", None);

    let t0 = Utc::now();
    assert!(store.mark_agent_connected("m-1", t0).unwrap());
    // Second connect loses the precondition.
    assert!(!store.mark_agent_connected("m-1", t0).unwrap());

    assert!(store
        .mark_agent_disconnected("m-1", t0 + Duration::seconds(65), 65)
        .unwrap());
    let telemetry = store.agent_telemetry("m-1").unwrap().unwrap();
    assert!(!telemetry.active);
    assert_eq!(telemetry.total_duration_seconds, 65);

    // Disconnect with the agent already inactive changes nothing.
    assert!(!store
        .mark_agent_disconnected("m-1", Utc::now(), 100)
        .unwrap());
    assert_eq!(
        store
            .agent_telemetry("m-1")
            .unwrap()
            .unwrap()
            .total_duration_seconds,
        65
    );

    // A second session adds to the total.
    let t1 = Utc::now();
    assert!(store.mark_agent_connected("m-1", t1).unwrap());
    assert!(store
        .mark_agent_disconnected("m-1", t1 + Duration::seconds(35), 35)
        .unwrap());
    assert_eq!(
        store
            .agent_telemetry("m-1")
            .unwrap()
            .unwrap()
            .total_duration_seconds,
        100
    );
}

#[test]
fn test_negative_durations_are_clamped() {
    let store = test_store();
    seed_meeting(&store, "m-1", None);

    store.mark_agent_connected("m-1", Utc::now()).unwrap();
    store
        .mark_agent_disconnected("m-1", Utc::now(), -42)
        .unwrap();
    assert_eq!(
        store
            .agent_telemetry("m-1")
            .unwrap()
            .unwrap()
            .total_duration_seconds,
        0
    );
}

#[test]
fn test_capacity_join_is_one_conditional_statement() {
    let store = test_store();
    seed_meeting(&store, "m-1", Some(2));
    let now = Utc::now();

    assert!(store
        .join_with_capacity("m-1", "u-1", ParticipantRole::Participant, now, 2)
        .unwrap());
    assert!(store
        .join_with_capacity("m-1", "u-2", ParticipantRole::Participant, now, 2)
        .unwrap());
    // Third distinct identity bounces off the capacity check.
    assert!(!store
        .join_with_capacity("m-1", "u-3", ParticipantRole::Participant, now, 2)
        .unwrap());
    assert_eq!(store.count_present_participants("m-1").unwrap(), 2);

    // A present participant re-joining does not count against themselves.
    assert!(store
        .join_with_capacity("m-1", "u-1", ParticipantRole::Participant, now, 2)
        .unwrap());

    // Someone who left freed a slot.
    assert!(store.mark_participant_left("m-1", "u-2", now).unwrap());
    assert!(store
        .join_with_capacity("m-1", "u-3", ParticipantRole::Participant, now, 2)
        .unwrap());

    // The returner finds the meeting full again.
    assert!(!store
        .join_with_capacity("m-1", "u-2", ParticipantRole::Participant, now, 2)
        .unwrap());
}

#[test]
fn test_rejoin_clears_left_at() {
    let store = test_store();
    seed_meeting(&store, "m-1", None);
    let now = Utc::now();

    store
        .upsert_participant("m-1", "u-1", ParticipantRole::Participant, now)
        .unwrap();
    assert!(store.mark_participant_left("m-1", "u-1", now).unwrap());
    assert!(store
        .get_participant("m-1", "u-1")
        .unwrap()
        .unwrap()
        .left_at
        .is_some());

    store
        .upsert_participant("m-1", "u-1", ParticipantRole::Participant, now)
        .unwrap();
    assert!(store
        .get_participant("m-1", "u-1")
        .unwrap()
        .unwrap()
        .left_at
        .is_none());

    // Leaving twice only works once.
    assert!(store.mark_participant_left("m-1", "u-1", now).unwrap());
    assert!(!store.mark_participant_left("m-1", "u-1", now).unwrap());
}

#[test]
fn test_reinvite_resets_to_pending() {
    let store = test_store();
    seed_meeting(&store, "m-1", None);
    let now = Utc::now();

    store
        .upsert_invitation("m-1", "kim@example.com", "owner-1", now)
        .unwrap();
    assert!(store.accept_invitation("m-1", "kim@example.com").unwrap());
    assert!(!store.accept_invitation("m-1", "kim@example.com").unwrap());

    store
        .upsert_invitation("m-1", "kim@example.com", "owner-1", now)
        .unwrap();
    let invitation = store
        .get_invitation("m-1", "kim@example.com")
        .unwrap()
        .unwrap();
    assert_eq!(
        invitation.status,
        parley::core::types::InvitationStatus::Pending
    );
}

#[test]
fn test_cancel_only_from_upcoming() {
    let store = test_store();
    seed_meeting(&store, "m-1", None);
    seed_meeting(&store, "m-2", None);

    assert!(store.cancel_meeting("m-1", "owner-1").unwrap());
    assert_eq!(
        store.get_meeting("m-1", None).unwrap().unwrap().status,
        MeetingStatus::Cancelled
    );
    // Terminal: a session_started after cancel is refused.
    assert_eq!(
        store.begin_session("m-1", Utc::now()).unwrap(),
        SessionStart::AlreadyProcessed
    );

    store.begin_session("m-2", Utc::now()).unwrap();
    assert!(!store.cancel_meeting("m-2", "owner-1").unwrap());
    // Wrong owner cannot cancel either.
    seed_meeting(&store, "m-3", None);
    assert!(!store.cancel_meeting("m-3", "someone-else").unwrap());
}

#[test]
fn test_list_meetings_filters_and_pagination() {
    let store = test_store();
    store
        .insert_agent(&NewAgent {
            id: "agent-1".into(),
            user_id: "owner-1".into(),
            name: "Notetaker".into(),
            instructions: "Take notes.".into(),
        })
        .unwrap();
    for i in 0..5 {
        seed_meeting(&store, &format!("m-{i}"), None);
    }
    store.begin_session("m-0", Utc::now()).unwrap();

    let (page, total) = store
        .list_meetings(&MeetingQuery {
            user_id: "owner-1".into(),
            search: None,
            status: None,
            agent_id: None,
            page: 1,
            page_size: 2,
        })
        .unwrap();
    assert_eq!(total, 5);
    assert_eq!(page.len(), 2);

    let (active, total_active) = store
        .list_meetings(&MeetingQuery {
            user_id: "owner-1".into(),
            search: None,
            status: Some(MeetingStatus::Active),
            agent_id: None,
            page: 1,
            page_size: 20,
        })
        .unwrap();
    assert_eq!(total_active, 1);
    assert_eq!(active[0].id, "m-0");

    let (named, _) = store
        .list_meetings(&MeetingQuery {
            user_id: "owner-1".into(),
            search: Some("m-3".into()),
            status: None,
            agent_id: None,
            page: 1,
            page_size: 20,
        })
        .unwrap();
    assert_eq!(named.len(), 1);

    // Another user sees nothing.
    let (_, other_total) = store
        .list_meetings(&MeetingQuery {
            user_id: "owner-2".into(),
            search: None,
            status: None,
            agent_id: None,
            page: 1,
            page_size: 20,
        })
        .unwrap();
    assert_eq!(other_total, 0);
}

#[test]
fn test_migrations_are_idempotent_across_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("parley.db");

    {
        let conn = Connection::open(&db_path).unwrap();
        schema::run_migrations(&conn).unwrap();
        let store = Store::new(conn);
        seed_meeting(&store, "m-1", None);
    }

    // Reopening runs migrations again as a no-op and sees the data.
    let conn = Connection::open(&db_path).unwrap();
    schema::run_migrations(&conn).unwrap();
    let store = Store::new(conn);
    assert!(store.get_meeting("m-1", None).unwrap().is_some());
}

#[test]
fn test_total_agent_seconds_sums_stored_totals() {
    let store = test_store();
    seed_meeting(&store, "m-1", None);
    seed_meeting(&store, "m-2", None);
    let now = Utc::now();

    store.mark_agent_connected("m-1", now).unwrap();
    store.mark_agent_disconnected("m-1", now, 120).unwrap();
    store.mark_agent_connected("m-2", now).unwrap();
    store.mark_agent_disconnected("m-2", now, 45).unwrap();

    assert_eq!(store.total_agent_seconds("owner-1").unwrap(), 165);
    assert_eq!(store.total_agent_seconds("owner-2").unwrap(), 0);
}
