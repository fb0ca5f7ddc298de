//! Clock abstraction
//!
//! Token expiry is computed against wall-clock milliseconds since the Unix
//! epoch. Going through [`Clock`] instead of calling `Utc::now()` directly
//! lets tests pin the current instant (see `testing::MockClock`).
//!
//! ```
//! use sessionkit_common::time::{Clock, SystemClock};
//!
//! let clock = SystemClock;
//! assert!(clock.millis_since_epoch() > 0);
//! ```

use chrono::{DateTime, Utc};

/// Trait for wall-clock time operations
pub trait Clock: Send + Sync {
    /// Get the current wall-clock time
    fn now(&self) -> DateTime<Utc>;

    /// Get milliseconds since the Unix epoch
    fn millis_since_epoch(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Real system clock. Use this in production code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for time.
    use super::*;

    /// Validates `SystemClock` behavior for the monotonic-enough reading
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures a later reading is never before an earlier one.
    #[test]
    fn test_system_clock_readings_advance() {
        let clock = SystemClock;
        let first = clock.millis_since_epoch();
        let second = clock.millis_since_epoch();
        assert!(second >= first);
    }
}
