//! Injectable clock source for the evaluation engine.

use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

/// A source of processing-time "now". The engine anchors window eviction and
/// cooldown decisions to this clock rather than to event timestamps, so it is
/// injectable for deterministic tests.
#[cfg_attr(test, automock)]
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The default wall-clock source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
