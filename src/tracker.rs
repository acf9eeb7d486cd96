use crate::clock::Clock;
use crate::history::{CompletedSession, HistoryStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

/// Sessions shorter than this are treated as reconnect noise and dropped.
pub const MIN_SESSION_MS: i64 = 1_000;

/// How long a user's leave stays guarded against duplicate delivery.
pub const LEAVE_COOLDOWN: Duration = Duration::from_secs(2);

/// A user currently sitting in a voice channel.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub channel_name: String,
    pub joined_at: DateTime<Utc>,
}

/// What a voice-state update means for session bookkeeping.
///
/// Only the fully-absent/fully-present boundary counts: moving between two
/// channels of the same server, mute/deafen toggles, and updates with no
/// channel change are all `Unchanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Joined,
    Left,
    Unchanged,
}

pub fn classify(old_channel: Option<u64>, new_channel: Option<u64>) -> Transition {
    match (old_channel, new_channel) {
        (None, Some(_)) => Transition::Joined,
        (Some(_), None) => Transition::Left,
        _ => Transition::Unchanged,
    }
}

/// Result of feeding a leave transition into the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaveOutcome {
    /// Session accepted and committed to history.
    Completed(CompletedSession),
    /// Below [`MIN_SESSION_MS`]; active session cleared, nothing recorded.
    TooShort,
    /// A leave for this user is still inside the cooldown window.
    Guarded,
    /// Leave with no matching join; nothing to do.
    NoSession,
}

struct TrackerState {
    active: HashMap<u64, ActiveSession>,
    // user id -> abort handle of the pending cooldown release
    guarded: HashMap<u64, AbortHandle>,
}

/// Voice session state machine.
///
/// Owns the active-session table and the cooldown guards; completed sessions
/// land in the shared [`HistoryStore`]. All map mutations for one event run
/// under a single lock acquisition, so the guard check, the session consume
/// and the history commit cannot interleave with another event for the same
/// user.
pub struct VoiceTracker {
    state: Arc<Mutex<TrackerState>>,
    history: Arc<Mutex<HistoryStore>>,
    clock: Arc<dyn Clock>,
    min_session_ms: i64,
    cooldown: Duration,
}

impl VoiceTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_policy(clock, MIN_SESSION_MS, LEAVE_COOLDOWN)
    }

    pub fn with_policy(clock: Arc<dyn Clock>, min_session_ms: i64, cooldown: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState {
                active: HashMap::new(),
                guarded: HashMap::new(),
            })),
            history: Arc::new(Mutex::new(HistoryStore::new())),
            clock,
            min_session_ms,
            cooldown,
        }
    }

    pub fn history(&self) -> Arc<Mutex<HistoryStore>> {
        Arc::clone(&self.history)
    }

    /// Start an active session for `user_id`.
    ///
    /// A join while a session is already active keeps the original
    /// `joined_at`; overwriting would silently lose connected time.
    pub async fn record_join(&self, user_id: u64, channel_name: String) {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.active.get(&user_id) {
            tracing::warn!(
                user_id,
                channel = %existing.channel_name,
                "join for a user already in voice, keeping original session"
            );
            return;
        }
        state.active.insert(
            user_id,
            ActiveSession {
                channel_name,
                joined_at: self.clock.now(),
            },
        );
    }

    /// Close the active session for `user_id`, if any.
    ///
    /// Accepted sessions are committed to history before this returns; the
    /// caller is responsible for announcing/exporting and must not feed the
    /// outcome back into the tracker.
    pub async fn record_leave(&self, user_id: u64) -> LeaveOutcome {
        let mut state = self.state.lock().await;
        if state.guarded.contains_key(&user_id) {
            tracing::debug!(user_id, "leave ignored, cooldown still active");
            return LeaveOutcome::Guarded;
        }
        let Some(active) = state.active.remove(&user_id) else {
            return LeaveOutcome::NoSession;
        };

        let release = self.schedule_release(user_id);
        state.guarded.insert(user_id, release);

        let left_at = self.clock.now();
        let duration_ms = (left_at - active.joined_at).num_milliseconds();
        if duration_ms < self.min_session_ms {
            tracing::debug!(user_id, duration_ms, "session below minimum, dropped");
            return LeaveOutcome::TooShort;
        }

        let session = CompletedSession {
            channel_name: active.channel_name,
            joined_at: active.joined_at,
            left_at,
            duration_ms,
        };
        self.history.lock().await.record(user_id, session.clone());
        LeaveOutcome::Completed(session)
    }

    fn schedule_release(&self, user_id: u64) -> AbortHandle {
        let state = Arc::clone(&self.state);
        let delay = self.cooldown;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.lock().await.guarded.remove(&user_id);
        })
        .abort_handle()
    }

    /// Clear the cooldown guard. Only ever clears the flag; the leave logic
    /// is never re-run.
    pub async fn release_guard(&self, user_id: u64) {
        self.state.lock().await.guarded.remove(&user_id);
    }

    /// Abort every pending cooldown release and drop the guards, so shutdown
    /// does not leak timers.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        for (_, handle) in state.guarded.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex as StdMutex;

    struct ManualClock(StdMutex<DateTime<Utc>>);

    impl ManualClock {
        fn starting_at(dt: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(StdMutex::new(dt)))
        }

        fn advance_ms(&self, ms: i64) {
            let mut now = self.0.lock().unwrap();
            *now += chrono::Duration::milliseconds(ms);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn setup() -> (Arc<VoiceTracker>, Arc<ManualClock>) {
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 5, 17, 10, 0, 0).unwrap());
        let tracker = Arc::new(VoiceTracker::new(clock.clone()));
        (tracker, clock)
    }

    #[test]
    fn only_the_absent_present_boundary_counts() {
        assert_eq!(classify(None, Some(1)), Transition::Joined);
        assert_eq!(classify(Some(1), None), Transition::Left);
        assert_eq!(classify(None, None), Transition::Unchanged);
        assert_eq!(classify(Some(1), Some(1)), Transition::Unchanged);
        // same-server channel switch is not a leave+join pair
        assert_eq!(classify(Some(1), Some(2)), Transition::Unchanged);
    }

    #[tokio::test]
    async fn join_then_leave_records_one_session() {
        let (tracker, clock) = setup();
        tracker.record_join(1, "General".into()).await;
        clock.advance_ms(5_000);

        let outcome = tracker.record_leave(1).await;
        let LeaveOutcome::Completed(session) = outcome else {
            panic!("expected a completed session, got {outcome:?}");
        };
        assert_eq!(session.channel_name, "General");
        assert_eq!(session.duration_ms, 5_000);
        assert!(session.left_at > session.joined_at);

        let history = tracker.history();
        let history = history.lock().await;
        let stats = history.get(1).unwrap();
        assert_eq!(stats.session_count, 1);
        assert_eq!(stats.total_ms, 5_000);
    }

    #[tokio::test]
    async fn short_session_is_dropped_but_cleared() {
        let (tracker, clock) = setup();
        tracker.record_join(1, "General".into()).await;
        clock.advance_ms(500);

        assert_eq!(tracker.record_leave(1).await, LeaveOutcome::TooShort);
        assert!(tracker.history().lock().await.is_empty());

        // the active session is gone: after the guard clears, another leave
        // finds nothing to close
        tracker.release_guard(1).await;
        assert_eq!(tracker.record_leave(1).await, LeaveOutcome::NoSession);
    }

    #[tokio::test]
    async fn duplicate_leave_is_guarded() {
        let (tracker, clock) = setup();
        tracker.record_join(1, "General".into()).await;
        clock.advance_ms(5_000);

        assert!(matches!(
            tracker.record_leave(1).await,
            LeaveOutcome::Completed(_)
        ));
        assert_eq!(tracker.record_leave(1).await, LeaveOutcome::Guarded);
        assert_eq!(tracker.history().lock().await.get(1).unwrap().session_count, 1);
    }

    #[tokio::test]
    async fn guard_clears_after_the_cooldown() {
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 5, 17, 10, 0, 0).unwrap());
        let tracker = Arc::new(VoiceTracker::with_policy(
            clock.clone(),
            MIN_SESSION_MS,
            Duration::from_millis(10),
        ));

        tracker.record_join(1, "General".into()).await;
        clock.advance_ms(5_000);
        assert!(matches!(
            tracker.record_leave(1).await,
            LeaveOutcome::Completed(_)
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tracker.record_leave(1).await, LeaveOutcome::NoSession);
    }

    #[tokio::test]
    async fn leave_without_join_is_a_no_op() {
        let (tracker, _clock) = setup();
        assert_eq!(tracker.record_leave(1).await, LeaveOutcome::NoSession);
        // the benign no-op sets no guard
        assert_eq!(tracker.record_leave(1).await, LeaveOutcome::NoSession);
    }

    #[tokio::test]
    async fn second_join_keeps_the_original_start() {
        let (tracker, clock) = setup();
        tracker.record_join(1, "General".into()).await;
        clock.advance_ms(3_000);
        tracker.record_join(1, "Juegos".into()).await;
        clock.advance_ms(2_000);

        let LeaveOutcome::Completed(session) = tracker.record_leave(1).await else {
            panic!("expected a completed session");
        };
        assert_eq!(session.channel_name, "General");
        assert_eq!(session.duration_ms, 5_000);
    }

    #[tokio::test]
    async fn users_are_tracked_independently() {
        let (tracker, clock) = setup();
        tracker.record_join(1, "General".into()).await;
        tracker.record_join(2, "Juegos".into()).await;
        clock.advance_ms(2_000);

        assert!(matches!(
            tracker.record_leave(1).await,
            LeaveOutcome::Completed(_)
        ));
        // user 2 is untouched by user 1's guard
        clock.advance_ms(1_000);
        let LeaveOutcome::Completed(session) = tracker.record_leave(2).await else {
            panic!("expected a completed session");
        };
        assert_eq!(session.duration_ms, 3_000);
    }

    #[tokio::test]
    async fn shutdown_drops_pending_guards() {
        let (tracker, clock) = setup();
        tracker.record_join(1, "General".into()).await;
        clock.advance_ms(5_000);
        tracker.record_leave(1).await;

        tracker.shutdown().await;
        assert!(tracker.state.lock().await.guarded.is_empty());
    }
}
