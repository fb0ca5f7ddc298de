//! Shared primitives for the sessionkit crates.
//!
//! # Safety and Quality
//!
//! This crate enforces strict safety and quality standards; library code
//! never panics on recoverable conditions.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error classification, observable cells, clock abstraction
//! - `runtime`: namespaced persistent storage (logs through `tracing`)
//! - `observability`: tracing (pulled in by `runtime`)
//! - `test-utils`: mock clock, storage fixtures and tracing setup for tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod signal;
#[cfg(feature = "foundation")]
pub mod time;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod storage;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(feature = "test-utils")]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{ErrorClassification, ErrorSeverity};
#[cfg(feature = "foundation")]
pub use signal::{ReadOnlyCell, Signal, Subscription};
#[cfg(feature = "runtime")]
pub use storage::{FileStorage, MemoryStorage, PersistentStore, StorageError, StorageMedium};
#[cfg(feature = "foundation")]
pub use time::{Clock, SystemClock};
