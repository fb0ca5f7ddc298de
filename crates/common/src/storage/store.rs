//! Namespaced key/value store

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

use super::error::StorageResult;
use super::medium::StorageMedium;

/// Key/value store whose keys are prefixed with `"<namespace>--"`
///
/// Several stores with different namespaces may share one medium without
/// interfering with each other.
#[derive(Clone)]
pub struct PersistentStore {
    prefix: String,
    medium: Arc<dyn StorageMedium>,
}

impl fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentStore")
            .field("prefix", &self.prefix)
            .field("medium", &self.medium)
            .finish()
    }
}

impl PersistentStore {
    /// Create a store writing into `medium` under `namespace`
    pub fn new(namespace: impl AsRef<str>, medium: Arc<dyn StorageMedium>) -> Self {
        Self { prefix: format!("{}--", namespace.as_ref()), medium }
    }

    /// Key prefix applied to every read and write
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Read a raw string value
    ///
    /// # Errors
    /// Returns an error if the medium cannot be read
    pub fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.medium.get_item(&self.key(key))
    }

    /// Write a raw string value; `None` removes the key
    ///
    /// # Errors
    /// Returns an error if the medium rejects the write
    pub fn set_item(&self, key: &str, value: Option<&str>) -> StorageResult<()> {
        match value {
            Some(value) => self.medium.set_item(&self.key(key), value),
            None => self.remove_item(key),
        }
    }

    /// Remove a key
    ///
    /// # Errors
    /// Returns an error if the medium rejects the removal
    pub fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.medium.remove_item(&self.key(key))
    }

    /// Read and decode a JSON value
    ///
    /// Absent keys, empty strings, unreadable media and undecodable values
    /// all yield `None`; the latter two are logged.
    pub fn get_object<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.get_item(key) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => return None,
            Err(err) => {
                error!(key = %self.key(key), error = %err, "failed to read stored object");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                error!(key = %self.key(key), error = %err, "failed to decode stored object");
                None
            }
        }
    }

    /// Encode and write a JSON value; `None` removes the key
    ///
    /// # Errors
    /// Returns an error if encoding fails or the medium rejects the write
    pub fn set_object<T: Serialize>(&self, key: &str, value: Option<&T>) -> StorageResult<()> {
        match value {
            Some(value) => {
                let encoded = serde_json::to_string(value)?;
                self.set_item(key, Some(&encoded))
            }
            None => self.remove_item(key),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage::store.
    use serde::Deserialize;

    use super::*;
    use crate::storage::MemoryStorage;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    fn store(namespace: &str, medium: &MemoryStorage) -> PersistentStore {
        PersistentStore::new(namespace, Arc::new(medium.clone()))
    }

    /// Validates `PersistentStore::set_item` behavior for the namespace
    /// prefix scenario.
    ///
    /// Assertions:
    /// - Confirms the medium key carries the `"<namespace>--"` prefix.
    /// - Confirms two namespaces on one medium do not collide.
    #[test]
    fn test_namespaces_are_isolated() {
        let medium = MemoryStorage::new();
        let a = store("app-a", &medium);
        let b = store("app-b", &medium);

        a.set_item("token", Some("one")).unwrap();
        b.set_item("token", Some("two")).unwrap();

        assert_eq!(medium.get_item("app-a--token").unwrap(), Some("one".to_string()));
        assert_eq!(a.get_item("token").unwrap(), Some("one".to_string()));
        assert_eq!(b.get_item("token").unwrap(), Some("two".to_string()));
    }

    /// Validates `PersistentStore::set_item` behavior for the absent value
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms writing `None` removes the key.
    #[test]
    fn test_set_item_none_removes() {
        let medium = MemoryStorage::new();
        let store = store("ns", &medium);

        store.set_item("k", Some("v")).unwrap();
        store.set_item("k", None).unwrap();

        assert_eq!(store.get_item("k").unwrap(), None);
        assert!(medium.is_empty());
    }

    /// Validates `PersistentStore::get_object` behavior for the typed value
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms a stored object decodes back to the same value.
    /// - Confirms `set_object(None)` removes it.
    #[test]
    fn test_object_round_trip_and_removal() {
        let medium = MemoryStorage::new();
        let store = store("ns", &medium);
        let sample = Sample { name: "bench".into(), count: 3 };

        store.set_object("sample", Some(&sample)).unwrap();
        assert_eq!(store.get_object::<Sample>("sample"), Some(sample));

        store.set_object::<Sample>("sample", None).unwrap();
        assert_eq!(store.get_object::<Sample>("sample"), None);
    }

    /// Validates `PersistentStore::get_object` behavior for the undecodable
    /// value scenario.
    ///
    /// Assertions:
    /// - Ensures malformed JSON yields `None`.
    /// - Ensures an empty string yields `None`.
    #[test]
    fn test_get_object_tolerates_bad_values() {
        let medium = MemoryStorage::new();
        let store = store("ns", &medium);

        store.set_item("bad", Some("{oops")).unwrap();
        store.set_item("empty", Some("")).unwrap();

        assert_eq!(store.get_object::<Sample>("bad"), None);
        assert_eq!(store.get_object::<Sample>("empty"), None);
        assert_eq!(store.get_object::<Sample>("missing"), None);
    }
}
