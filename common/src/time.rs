//! Time utilities and the shared clock for Synthex.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// Time defaults.
pub mod constants {
    use super::Duration;

    /// Default settlement waiting period (3 minutes).
    pub fn default_waiting_period() -> Duration {
        Duration::seconds(180)
    }

    /// Default age after which an oracle rate is stale (3 hours).
    pub fn default_rate_stale_period() -> Duration {
        Duration::hours(3)
    }

    /// How far ahead of the clock a rate update may be timestamped (10 minutes).
    pub fn future_rate_tolerance() -> Duration {
        Duration::minutes(10)
    }
}

/// A timestamp with timezone (always UTC for Synthex).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Source of the current time.
///
/// Every operation reads the clock once and uses that instant throughout.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used by tests and the simulator.
#[derive(Debug)]
pub struct ManualClock {
    current: RwLock<Timestamp>,
}

impl ManualClock {
    /// Create a new manual clock at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: RwLock::new(start),
        }
    }

    /// Create a manual clock frozen at the current wall-clock time.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.write();
        *current += by;
    }

    /// Move the clock forward by whole seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    /// Jump to an absolute instant.
    pub fn set(&self, to: Timestamp) {
        *self.current.write() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.read()
    }
}

/// Whole seconds elapsed from `earlier` to `later`, never negative.
pub fn secs_between(earlier: Timestamp, later: Timestamp) -> u64 {
    u64::try_from((later - earlier).num_seconds()).unwrap_or(0)
}
