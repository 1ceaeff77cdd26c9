// src/core/usage.rs — Agent usage and billing math
//
// Durations are derived on read, never cached, so a client polling
// mid-session sees a live-incrementing value without any background timer.
// None of this can fail: a missing timestamp is zero elapsed time.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::types::AgentTelemetry;
use crate::infra::config::BillingConfig;
use crate::store::StoreHandle;

/// Total agent seconds for one meeting as of `now`: the stored total of
/// completed sessions plus the live session, if any.
pub fn current_duration_seconds(telemetry: &AgentTelemetry, now: DateTime<Utc>) -> i64 {
    let stored = telemetry.total_duration_seconds.max(0);
    if !telemetry.active {
        return stored;
    }
    let live = telemetry
        .connected_at
        .map(|at| (now - at).num_seconds().max(0))
        .unwrap_or(0);
    stored + live
}

/// Billable cost for a second count: whole minutes, rounded up.
pub fn cost_for_seconds(seconds: i64, cost_per_minute: f64) -> f64 {
    let minutes = (seconds.max(0) + 59) / 60;
    minutes as f64 * cost_per_minute
}

/// Cross-meeting usage for one account. `total_cost` is suppressed for
/// premium accounts, which report usage but are not billed per minute.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub meeting_count: i64,
    pub agent_count: i64,
    pub total_agent_seconds: i64,
    pub total_agent_minutes: i64,
    pub premium: bool,
    pub total_cost: Option<f64>,
}

/// Aggregate free-tier usage across all of a user's meetings. Only completed
/// sessions (stored totals) are summed — the aggregate is O(1) over stored
/// data and an in-progress session is excluded by design.
pub async fn usage_report(
    store: &StoreHandle,
    billing: &BillingConfig,
    user_id: &str,
    premium: bool,
) -> anyhow::Result<UsageReport> {
    let meeting_count = store.count_meetings_for_user(user_id).await?;
    let agent_count = store.count_agents_for_user(user_id).await?;
    let total_agent_seconds = store.total_agent_seconds(user_id).await?.max(0);
    let total_agent_minutes = (total_agent_seconds + 59) / 60;

    let total_cost = if premium {
        None
    } else {
        Some(cost_for_seconds(
            total_agent_seconds,
            billing.agent_cost_per_minute,
        ))
    };

    Ok(UsageReport {
        meeting_count,
        agent_count,
        total_agent_seconds,
        total_agent_minutes,
        premium,
        total_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn telemetry(active: bool, connected_secs_ago: Option<i64>, total: i64) -> AgentTelemetry {
        AgentTelemetry {
            active,
            connected_at: connected_secs_ago.map(|s| Utc::now() - Duration::seconds(s)),
            total_duration_seconds: total,
        }
    }

    #[test]
    fn test_inactive_duration_is_stored_total() {
        let t = telemetry(false, None, 120);
        assert_eq!(current_duration_seconds(&t, Utc::now()), 120);
    }

    #[test]
    fn test_active_duration_adds_live_session() {
        let t = telemetry(true, Some(30), 120);
        let duration = current_duration_seconds(&t, Utc::now());
        assert!((149..=151).contains(&duration), "got {duration}");
    }

    #[test]
    fn test_active_without_timestamp_counts_zero_live() {
        // agent_active without a connect timestamp should never happen, but
        // billing must not error on it.
        let t = telemetry(true, None, 60);
        assert_eq!(current_duration_seconds(&t, Utc::now()), 60);
    }

    #[test]
    fn test_future_connect_timestamp_clamps_to_zero() {
        let t = AgentTelemetry {
            active: true,
            connected_at: Some(Utc::now() + Duration::seconds(90)),
            total_duration_seconds: 10,
        };
        assert_eq!(current_duration_seconds(&t, Utc::now()), 10);
    }

    #[test]
    fn test_cost_rounds_up_to_whole_minutes() {
        assert_eq!(cost_for_seconds(0, 0.10), 0.0);
        assert!((cost_for_seconds(1, 0.10) - 0.10).abs() < 1e-9);
        assert!((cost_for_seconds(60, 0.10) - 0.10).abs() < 1e-9);
        assert!((cost_for_seconds(61, 0.10) - 0.20).abs() < 1e-9);
        assert!((cost_for_seconds(65, 0.10) - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_cost_never_negative() {
        assert_eq!(cost_for_seconds(-30, 0.10), 0.0);
    }
}
