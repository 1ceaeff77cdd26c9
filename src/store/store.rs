// src/store/store.rs — SQLite operations
//
// Every lifecycle transition is a single conditional UPDATE (precondition in
// the WHERE clause), so concurrent webhook deliveries cannot interleave a
// read-then-write. The row count tells the caller whether the transition
// applied.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use crate::core::types::{
    Agent, AgentTelemetry, Invitation, InvitationStatus, Meeting, MeetingStatus, Participant,
    ParticipantRole, Visibility,
};

/// Outcome of applying a `session_started` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStart {
    /// Transitioned to ACTIVE; `started_at` stamped.
    Started,
    /// Already ACTIVE — duplicate delivery, nothing changed.
    AlreadyActive,
    /// PROCESSING, COMPLETED or CANCELLED — too late to start.
    AlreadyProcessed,
    NotFound,
}

/// Outcome of a write-once URL column update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOnce {
    Set,
    AlreadySet,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub agent_id: String,
    pub visibility: Visibility,
    pub max_participants: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewAgent {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub instructions: String,
}

/// Filters for the paginated meeting list.
#[derive(Debug, Clone, Default)]
pub struct MeetingQuery {
    pub user_id: String,
    pub search: Option<String>,
    pub status: Option<MeetingStatus>,
    pub agent_id: Option<String>,
    pub page: i64,
    pub page_size: i64,
}

/// Low-level SQLite operations. Owned by the store actor; see `store_server`.
pub struct Store {
    conn: Connection,
}

fn ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_ts(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .map(|d| Some(d.with_timezone(&Utc)))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}

fn bad_enum(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unrecognized enum value '{value}'").into(),
    )
}

const MEETING_COLUMNS: &str = "id, name, user_id, agent_id, status, visibility, max_participants, \
     started_at, ended_at, transcript_url, recording_url, summary, \
     agent_active, agent_connected_at, agent_disconnected_at, agent_total_duration, \
     created_at, updated_at";

fn meeting_from_row(row: &Row) -> rusqlite::Result<Meeting> {
    let status_raw: String = row.get(4)?;
    let visibility_raw: String = row.get(5)?;
    Ok(Meeting {
        id: row.get(0)?,
        name: row.get(1)?,
        user_id: row.get(2)?,
        agent_id: row.get(3)?,
        status: MeetingStatus::parse(&status_raw).ok_or_else(|| bad_enum(4, &status_raw))?,
        visibility: Visibility::parse(&visibility_raw)
            .ok_or_else(|| bad_enum(5, &visibility_raw))?,
        max_participants: row.get(6)?,
        started_at: opt_ts(row, 7)?,
        ended_at: opt_ts(row, 8)?,
        transcript_url: row.get(9)?,
        recording_url: row.get(10)?,
        summary: row.get(11)?,
        agent_active: row.get::<_, i64>(12)? != 0,
        agent_connected_at: opt_ts(row, 13)?,
        agent_disconnected_at: opt_ts(row, 14)?,
        agent_total_duration: row.get(15)?,
        created_at: ts(row, 16)?,
        updated_at: ts(row, 17)?,
    })
}

fn agent_from_row(row: &Row) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        instructions: row.get(3)?,
        created_at: ts(row, 4)?,
        updated_at: ts(row, 5)?,
    })
}

fn participant_from_row(row: &Row) -> rusqlite::Result<Participant> {
    let role_raw: String = row.get(2)?;
    Ok(Participant {
        meeting_id: row.get(0)?,
        user_id: row.get(1)?,
        role: ParticipantRole::parse(&role_raw).ok_or_else(|| bad_enum(2, &role_raw))?,
        joined_at: ts(row, 3)?,
        left_at: opt_ts(row, 4)?,
    })
}

fn invitation_from_row(row: &Row) -> rusqlite::Result<Invitation> {
    let status_raw: String = row.get(2)?;
    Ok(Invitation {
        meeting_id: row.get(0)?,
        email: row.get(1)?,
        status: InvitationStatus::parse(&status_raw).ok_or_else(|| bad_enum(2, &status_raw))?,
        invited_by: row.get(3)?,
        sent_at: ts(row, 4)?,
    })
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // -- Meetings --

    pub fn insert_meeting(&self, meeting: &NewMeeting) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO meetings (id, name, user_id, agent_id, visibility, max_participants,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                meeting.id,
                meeting.name,
                meeting.user_id,
                meeting.agent_id,
                meeting.visibility.as_str(),
                meeting.max_participants,
                now
            ],
        )?;
        Ok(())
    }

    /// Fetch a meeting, optionally restricted to its owner.
    pub fn get_meeting(&self, id: &str, owner: Option<&str>) -> anyhow::Result<Option<Meeting>> {
        let result = match owner {
            Some(user_id) => self.conn.query_row(
                &format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                meeting_from_row,
            ),
            None => self.conn.query_row(
                &format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE id = ?1"),
                params![id],
                meeting_from_row,
            ),
        };
        match result {
            Ok(m) => Ok(Some(m)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Paginated, filtered list plus total count for the same filters.
    pub fn list_meetings(&self, query: &MeetingQuery) -> anyhow::Result<(Vec<Meeting>, i64)> {
        let mut clauses = String::from("user_id = ?1");
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(query.user_id.clone())];

        if let Some(ref search) = query.search {
            values.push(Box::new(format!("%{search}%")));
            clauses.push_str(&format!(" AND name LIKE ?{}", values.len()));
        }
        if let Some(status) = query.status {
            values.push(Box::new(status.as_str()));
            clauses.push_str(&format!(" AND status = ?{}", values.len()));
        }
        if let Some(ref agent_id) = query.agent_id {
            values.push(Box::new(agent_id.clone()));
            clauses.push_str(&format!(" AND agent_id = ?{}", values.len()));
        }

        let total: i64 = {
            let refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
            self.conn.query_row(
                &format!("SELECT COUNT(*) FROM meetings WHERE {clauses}"),
                refs.as_slice(),
                |r| r.get(0),
            )?
        };

        let page = query.page.max(1);
        let page_size = query.page_size.max(1);
        values.push(Box::new(page_size));
        let limit_idx = values.len();
        values.push(Box::new((page - 1) * page_size));
        let offset_idx = values.len();

        let sql = format!(
            "SELECT {MEETING_COLUMNS} FROM meetings WHERE {clauses}
             ORDER BY created_at DESC, id DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
        );
        let refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(refs.as_slice(), meeting_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((rows, total))
    }

    pub fn update_meeting(
        &self,
        id: &str,
        owner: &str,
        name: Option<&str>,
        agent_id: Option<&str>,
    ) -> anyhow::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE meetings SET name = COALESCE(?3, name), agent_id = COALESCE(?4, agent_id),
             updated_at = ?5
             WHERE id = ?1 AND user_id = ?2",
            params![id, owner, name, agent_id, now],
        )?;
        Ok(changed == 1)
    }

    pub fn delete_meeting(&self, id: &str, owner: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM meetings WHERE id = ?1 AND user_id = ?2",
            params![id, owner],
        )?;
        Ok(changed == 1)
    }

    /// Owner cancel, allowed only before the session starts.
    pub fn cancel_meeting(&self, id: &str, owner: &str) -> anyhow::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE meetings SET status = 'CANCELLED', updated_at = ?3
             WHERE id = ?1 AND user_id = ?2 AND status = 'UPCOMING'",
            params![id, owner, now],
        )?;
        Ok(changed == 1)
    }

    /// Apply `session_started`. The WHERE clause is the idempotency guard: a
    /// duplicate delivery matches zero rows and leaves `started_at` alone.
    pub fn begin_session(&self, id: &str, at: DateTime<Utc>) -> anyhow::Result<SessionStart> {
        let changed = self.conn.execute(
            "UPDATE meetings SET status = 'ACTIVE', started_at = ?2, updated_at = ?2
             WHERE id = ?1
               AND status NOT IN ('ACTIVE', 'PROCESSING', 'COMPLETED', 'CANCELLED')",
            params![id, at.to_rfc3339()],
        )?;
        if changed == 1 {
            return Ok(SessionStart::Started);
        }
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM meetings WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(match status.as_deref() {
            None => SessionStart::NotFound,
            Some("ACTIVE") => SessionStart::AlreadyActive,
            Some(_) => SessionStart::AlreadyProcessed,
        })
    }

    /// Apply `session_ended`: ACTIVE → PROCESSING. Returns false when the
    /// meeting was not ACTIVE (duplicate or out-of-order delivery).
    pub fn end_session(&self, id: &str, at: DateTime<Utc>) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE meetings SET status = 'PROCESSING', ended_at = ?2, updated_at = ?2
             WHERE id = ?1 AND status = 'ACTIVE'",
            params![id, at.to_rfc3339()],
        )?;
        Ok(changed == 1)
    }

    /// PROCESSING → COMPLETED, once the summary is in.
    pub fn complete_processing(&self, id: &str) -> anyhow::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE meetings SET status = 'COMPLETED', updated_at = ?2
             WHERE id = ?1 AND status = 'PROCESSING'",
            params![id, now],
        )?;
        Ok(changed == 1)
    }

    pub fn set_transcript_url(&self, id: &str, url: &str) -> anyhow::Result<WriteOnce> {
        self.write_once(id, "transcript_url", url)
    }

    pub fn set_recording_url(&self, id: &str, url: &str) -> anyhow::Result<WriteOnce> {
        self.write_once(id, "recording_url", url)
    }

    fn write_once(&self, id: &str, column: &str, url: &str) -> anyhow::Result<WriteOnce> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            &format!(
                "UPDATE meetings SET {column} = ?2, updated_at = ?3
                 WHERE id = ?1 AND {column} IS NULL"
            ),
            params![id, url, now],
        )?;
        if changed == 1 {
            return Ok(WriteOnce::Set);
        }
        let exists: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM meetings WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(if exists == 0 {
            WriteOnce::NotFound
        } else {
            WriteOnce::AlreadySet
        })
    }

    pub fn set_summary(&self, id: &str, summary: &str) -> anyhow::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE meetings SET summary = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, summary, now],
        )?;
        Ok(changed == 1)
    }

    /// Flip the agent to connected. Precondition `agent_active = 0` makes a
    /// racing second connect lose cleanly.
    pub fn mark_agent_connected(&self, id: &str, at: DateTime<Utc>) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE meetings SET agent_active = 1, agent_connected_at = ?2,
             agent_disconnected_at = NULL, updated_at = ?2
             WHERE id = ?1 AND agent_active = 0",
            params![id, at.to_rfc3339()],
        )?;
        Ok(changed == 1)
    }

    /// Flip the agent to disconnected, folding the session into the running
    /// total in the same statement so billing and the flag can never diverge.
    pub fn mark_agent_disconnected(
        &self,
        id: &str,
        at: DateTime<Utc>,
        duration_seconds: i64,
    ) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE meetings SET agent_active = 0, agent_disconnected_at = ?2,
             agent_total_duration = agent_total_duration + ?3, updated_at = ?2
             WHERE id = ?1 AND agent_active = 1",
            params![id, at.to_rfc3339(), duration_seconds.max(0)],
        )?;
        Ok(changed == 1)
    }

    pub fn agent_telemetry(&self, id: &str) -> anyhow::Result<Option<AgentTelemetry>> {
        let result = self.conn.query_row(
            "SELECT agent_active, agent_connected_at, agent_total_duration
             FROM meetings WHERE id = ?1",
            params![id],
            |row| {
                Ok(AgentTelemetry {
                    active: row.get::<_, i64>(0)? != 0,
                    connected_at: opt_ts(row, 1)?,
                    total_duration_seconds: row.get(2)?,
                })
            },
        );
        match result {
            Ok(t) => Ok(Some(t)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Rows claiming a live agent — input to the startup reconcile sweep.
    pub fn meetings_with_active_agent(&self) -> anyhow::Result<Vec<Meeting>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings WHERE agent_active = 1"
        ))?;
        let rows = stmt
            .query_map([], meeting_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Sum of completed agent sessions across all of a user's meetings. An
    /// in-progress session is intentionally excluded; the aggregate stays
    /// O(1) over stored data.
    pub fn total_agent_seconds(&self, user_id: &str) -> anyhow::Result<i64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(agent_total_duration), 0) FROM meetings WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(total)
    }

    pub fn count_meetings_for_user(&self, user_id: &str) -> anyhow::Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM meetings WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    // -- Agents --

    pub fn insert_agent(&self, agent: &NewAgent) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO agents (id, user_id, name, instructions, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![agent.id, agent.user_id, agent.name, agent.instructions, now],
        )?;
        Ok(())
    }

    pub fn get_agent(&self, id: &str, owner: Option<&str>) -> anyhow::Result<Option<Agent>> {
        let result = match owner {
            Some(user_id) => self.conn.query_row(
                "SELECT id, user_id, name, instructions, created_at, updated_at
                 FROM agents WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                agent_from_row,
            ),
            None => self.conn.query_row(
                "SELECT id, user_id, name, instructions, created_at, updated_at
                 FROM agents WHERE id = ?1",
                params![id],
                agent_from_row,
            ),
        };
        match result {
            Ok(a) => Ok(Some(a)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_agents(
        &self,
        user_id: &str,
        search: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> anyhow::Result<(Vec<Agent>, i64)> {
        let pattern = search.map(|s| format!("%{s}%"));
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM agents WHERE user_id = ?1 AND (?2 IS NULL OR name LIKE ?2)",
            params![user_id, pattern],
            |r| r.get(0),
        )?;
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, instructions, created_at, updated_at
             FROM agents WHERE user_id = ?1 AND (?2 IS NULL OR name LIKE ?2)
             ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4",
        )?;
        let page = page.max(1);
        let page_size = page_size.max(1);
        let rows = stmt
            .query_map(
                params![user_id, pattern, page_size, (page - 1) * page_size],
                agent_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((rows, total))
    }

    pub fn update_agent(
        &self,
        id: &str,
        owner: &str,
        name: Option<&str>,
        instructions: Option<&str>,
    ) -> anyhow::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE agents SET name = COALESCE(?3, name),
             instructions = COALESCE(?4, instructions), updated_at = ?5
             WHERE id = ?1 AND user_id = ?2",
            params![id, owner, name, instructions, now],
        )?;
        Ok(changed == 1)
    }

    pub fn delete_agent(&self, id: &str, owner: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM agents WHERE id = ?1 AND user_id = ?2",
            params![id, owner],
        )?;
        Ok(changed == 1)
    }

    pub fn count_agents_for_user(&self, user_id: &str) -> anyhow::Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM agents WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    // -- Participants --

    /// Create or revive a participant row without a capacity check (hosts
    /// bypass capacity).
    pub fn upsert_participant(
        &self,
        meeting_id: &str,
        user_id: &str,
        role: ParticipantRole,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO participants (meeting_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(meeting_id, user_id) DO UPDATE SET left_at = NULL",
            params![meeting_id, user_id, role.as_str(), at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Capacity-checked join in one statement: the insert only happens while
    /// the count of other present participants is below the limit, so two
    /// joiners racing at the boundary cannot both land.
    pub fn join_with_capacity(
        &self,
        meeting_id: &str,
        user_id: &str,
        role: ParticipantRole,
        at: DateTime<Utc>,
        max_participants: i64,
    ) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "INSERT INTO participants (meeting_id, user_id, role, joined_at)
             SELECT ?1, ?2, ?3, ?4
             WHERE (SELECT COUNT(*) FROM participants
                    WHERE meeting_id = ?1 AND left_at IS NULL AND user_id <> ?2) < ?5
             ON CONFLICT(meeting_id, user_id) DO UPDATE SET left_at = NULL",
            params![meeting_id, user_id, role.as_str(), at.to_rfc3339(), max_participants],
        )?;
        Ok(changed == 1)
    }

    pub fn mark_participant_left(
        &self,
        meeting_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE participants SET left_at = ?3
             WHERE meeting_id = ?1 AND user_id = ?2 AND left_at IS NULL",
            params![meeting_id, user_id, at.to_rfc3339()],
        )?;
        Ok(changed == 1)
    }

    pub fn get_participant(
        &self,
        meeting_id: &str,
        user_id: &str,
    ) -> anyhow::Result<Option<Participant>> {
        let result = self.conn.query_row(
            "SELECT meeting_id, user_id, role, joined_at, left_at
             FROM participants WHERE meeting_id = ?1 AND user_id = ?2",
            params![meeting_id, user_id],
            participant_from_row,
        );
        match result {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_present_participants(
        &self,
        meeting_id: &str,
    ) -> anyhow::Result<Vec<Participant>> {
        let mut stmt = self.conn.prepare(
            "SELECT meeting_id, user_id, role, joined_at, left_at
             FROM participants WHERE meeting_id = ?1 AND left_at IS NULL
             ORDER BY joined_at",
        )?;
        let rows = stmt
            .query_map(params![meeting_id], participant_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_present_participants(&self, meeting_id: &str) -> anyhow::Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM participants WHERE meeting_id = ?1 AND left_at IS NULL",
            params![meeting_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    // -- Invitations --

    /// Re-inviting resets the pair to PENDING.
    pub fn upsert_invitation(
        &self,
        meeting_id: &str,
        email: &str,
        invited_by: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO invitations (meeting_id, email, status, invited_by, sent_at)
             VALUES (?1, ?2, 'PENDING', ?3, ?4)
             ON CONFLICT(meeting_id, email) DO UPDATE
             SET status = 'PENDING', invited_by = excluded.invited_by, sent_at = excluded.sent_at",
            params![meeting_id, email, invited_by, at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_invitation(
        &self,
        meeting_id: &str,
        email: &str,
    ) -> anyhow::Result<Option<Invitation>> {
        let result = self.conn.query_row(
            "SELECT meeting_id, email, status, invited_by, sent_at
             FROM invitations WHERE meeting_id = ?1 AND email = ?2",
            params![meeting_id, email],
            invitation_from_row,
        );
        match result {
            Ok(i) => Ok(Some(i)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn accept_invitation(&self, meeting_id: &str, email: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE invitations SET status = 'ACCEPTED'
             WHERE meeting_id = ?1 AND email = ?2 AND status = 'PENDING'",
            params![meeting_id, email],
        )?;
        Ok(changed == 1)
    }
}
