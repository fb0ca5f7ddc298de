//! Mock clock for deterministic expiry tests
//!
//! ```
//! use std::time::Duration;
//!
//! use sessionkit_common::testing::MockClock;
//! use sessionkit_common::time::Clock;
//!
//! let clock = MockClock::at_millis(1_000);
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.millis_since_epoch(), 6_000);
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::time::Clock;

/// Mock clock whose current instant only moves when told to
///
/// Clones share the same underlying instant, so a clone handed to a client
/// can be advanced from the test body.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock frozen at the current real time
    #[must_use]
    pub fn new() -> Self {
        Self { now: Arc::new(Mutex::new(Utc::now())) }
    }

    /// Create a mock clock frozen at `millis` since the Unix epoch
    #[must_use]
    pub fn at_millis(millis: i64) -> Self {
        let now = Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now);
        Self { now: Arc::new(Mutex::new(now)) }
    }

    /// Advance the clock by a duration
    pub fn advance(&self, duration: Duration) {
        let delta = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        let mut now = self.now.lock();
        *now += delta;
    }

    /// Set the clock to an absolute instant
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for testing::time.
    use super::*;

    /// Validates `MockClock::advance` behavior for the advance scenario.
    ///
    /// Assertions:
    /// - Confirms the clock moved by exactly the advanced amount.
    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::at_millis(10_000);
        clock.advance(Duration::from_millis(2_500));
        assert_eq!(clock.millis_since_epoch(), 12_500);
    }

    /// Validates `MockClock::clone` behavior for the shared instant scenario.
    ///
    /// Assertions:
    /// - Confirms advancing a clone is observed through the original.
    #[test]
    fn test_clones_share_instant() {
        let clock = MockClock::at_millis(0);
        let handle = clock.clone();
        handle.advance(Duration::from_secs(1));
        assert_eq!(clock.millis_since_epoch(), 1_000);
    }
}
