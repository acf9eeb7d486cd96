use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A finished voice session. Immutable once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSession {
    pub channel_name: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: DateTime<Utc>,
    pub duration_ms: i64,
}

/// Running aggregates plus the full ledger for one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStats {
    /// Sum of `duration_ms` over `sessions`.
    pub total_ms: i64,
    /// Number of completed sessions; equals `sessions.len()`.
    pub session_count: u32,
    /// Completed sessions in completion order.
    pub sessions: Vec<CompletedSession>,
}

/// Per-user ledger of completed sessions, keyed by user id.
///
/// Users are remembered in the order their first session completed so that
/// exports come out in a stable order. Nothing is persisted across restarts.
#[derive(Debug, Default)]
pub struct HistoryStore {
    stats: HashMap<u64, UserStats>,
    order: Vec<u64>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a session to the user's ledger and update the aggregates.
    pub fn record(&mut self, user_id: u64, session: CompletedSession) {
        let entry = self.stats.entry(user_id).or_insert_with(|| {
            self.order.push(user_id);
            UserStats::default()
        });
        entry.total_ms += session.duration_ms;
        entry.session_count += 1;
        entry.sessions.push(session);
    }

    /// `None` for users that never completed a session.
    pub fn get(&self, user_id: u64) -> Option<&UserStats> {
        self.stats.get(&user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Copy-on-read view in user insertion order; later writes do not touch
    /// a snapshot already taken.
    pub fn snapshot(&self) -> Vec<(u64, UserStats)> {
        self.order
            .iter()
            .filter_map(|id| self.stats.get(id).map(|s| (*id, s.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(channel: &str, start_s: u32, duration_ms: i64) -> CompletedSession {
        let joined_at = Utc.with_ymd_and_hms(2025, 5, 17, 10, 0, start_s).unwrap();
        let left_at = joined_at + chrono::Duration::milliseconds(duration_ms);
        CompletedSession {
            channel_name: channel.to_string(),
            joined_at,
            left_at,
            duration_ms,
        }
    }

    #[test]
    fn totals_match_the_ledger() {
        let mut store = HistoryStore::new();
        store.record(1, session("General", 0, 5_000));
        store.record(1, session("General", 10, 2_500));
        store.record(1, session("Juegos", 20, 1_500));

        let stats = store.get(1).unwrap();
        assert_eq!(stats.session_count, 3);
        assert_eq!(stats.sessions.len(), 3);
        let sum: i64 = stats.sessions.iter().map(|s| s.duration_ms).sum();
        assert_eq!(stats.total_ms, sum);
        assert_eq!(stats.total_ms, 9_000);
    }

    #[test]
    fn unknown_user_has_no_stats() {
        let store = HistoryStore::new();
        assert!(store.get(42).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_keeps_first_completion_order() {
        let mut store = HistoryStore::new();
        store.record(30, session("General", 0, 2_000));
        store.record(10, session("General", 5, 2_000));
        store.record(30, session("Juegos", 10, 2_000));
        store.record(20, session("General", 15, 2_000));

        let ids: Vec<u64> = store.snapshot().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![30, 10, 20]);
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let mut store = HistoryStore::new();
        store.record(1, session("General", 0, 2_000));
        let snap = store.snapshot();

        store.record(1, session("General", 10, 3_000));
        assert_eq!(snap[0].1.session_count, 1);
        assert_eq!(store.get(1).unwrap().session_count, 2);
    }
}
