//! Testing utilities and helpers
//!
//! - **[`mocks`]**: Mock storage medium with failure injection
//! - **[`time`]**: Mock clock
//!
//! ## Usage
//!
//! ```rust
//! use sessionkit_common::testing::{init_test_tracing, MockClock};
//! use sessionkit_common::time::Clock;
//!
//! init_test_tracing();
//! let clock = MockClock::at_millis(0);
//! clock.advance(std::time::Duration::from_secs(5));
//! assert_eq!(clock.millis_since_epoch(), 5_000);
//! ```

pub mod mocks;
pub mod time;

pub use mocks::{MockStorage, StorageOp};
pub use time::MockClock;

/// Install a test-friendly tracing subscriber
///
/// Honours `RUST_LOG` (default `warn`) and writes through the test harness
/// so output is captured per test. Safe to call from every test.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}
