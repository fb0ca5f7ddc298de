//! Mock implementations of common traits
//!
//! Provides mock objects for testing purposes.

// Test mocks keep their error surface obvious from the signatures
#![allow(clippy::missing_errors_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::{StorageError, StorageMedium, StorageResult};

type StorageData = Arc<Mutex<HashMap<String, String>>>;
type OperationLog = Arc<Mutex<Vec<StorageOp>>>;

/// Operation recorded by [`MockStorage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Get(String),
    Set(String, String),
    Remove(String),
}

/// Mock storage medium for testing
///
/// Records every operation and can be flipped into a failing mode where
/// writes (or all operations) return [`StorageError::Unavailable`].
///
/// # Examples
///
/// ```
/// use sessionkit_common::storage::StorageMedium;
/// use sessionkit_common::testing::mocks::MockStorage;
///
/// let storage = MockStorage::new();
/// storage.set_item("key1", "value1").unwrap();
///
/// assert_eq!(storage.get_item("key1").unwrap(), Some("value1".to_string()));
///
/// storage.fail_writes(true);
/// assert!(storage.set_item("key2", "value2").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockStorage {
    data: StorageData,
    operations: OperationLog,
    fail_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

impl MockStorage {
    /// Create a new mock storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write and removal fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Check if a key exists
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Get all keys
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.lock().keys().cloned().collect()
    }

    /// Raw value without recording an operation
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.data.lock().get(key).cloned()
    }

    /// All recorded operations, oldest first
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp> {
        self.operations.lock().clone()
    }

    /// Number of recorded writes (sets and removals)
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.operations.lock().iter().filter(|op| !matches!(op, StorageOp::Get(_))).count()
    }

    /// Clear all data and recorded operations
    pub fn clear(&self) {
        self.data.lock().clear();
        self.operations.lock().clear();
    }

    fn check_writable(&self, key: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("writes disabled for '{key}'")));
        }
        Ok(())
    }
}

impl StorageMedium for MockStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.operations.lock().push(StorageOp::Get(key.to_string()));
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("reads disabled for '{key}'")));
        }
        Ok(self.data.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.operations.lock().push(StorageOp::Set(key.to_string(), value.to_string()));
        self.check_writable(key)?;
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.operations.lock().push(StorageOp::Remove(key.to_string()));
        self.check_writable(key)?;
        self.data.lock().remove(key);
        Ok(())
    }
}
