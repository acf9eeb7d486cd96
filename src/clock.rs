use chrono::{DateTime, Utc};

/// Source of wall-clock time for the tracker, so session durations can be
/// tested against a manual clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
