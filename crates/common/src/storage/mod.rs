//! Namespaced persistent storage
//!
//! A [`PersistentStore`] prefixes every key with its namespace and writes
//! into a shared [`StorageMedium`]. Two media ship with the crate:
//! [`MemoryStorage`] for process-local state and [`FileStorage`] for a JSON
//! document on disk.

pub mod error;
pub mod medium;
pub mod store;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use medium::{FileStorage, MemoryStorage, StorageMedium};
pub use store::PersistentStore;
