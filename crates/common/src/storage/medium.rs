//! Storage media backing a [`PersistentStore`](super::PersistentStore)
//!
//! A medium is a flat string-to-string map shared by every namespace that
//! writes into it.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error};

use super::error::StorageResult;

/// Flat key/value storage medium
///
/// Implementations must be safe to share between client instances; keys
/// arrive already namespaced.
pub trait StorageMedium: Send + Sync + Debug {
    /// Read a value, `Ok(None)` when the key is absent
    ///
    /// # Errors
    /// Returns an error if the medium cannot be read
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one
    ///
    /// # Errors
    /// Returns an error if the medium rejects the write
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a key; removing an absent key is not an error
    ///
    /// # Errors
    /// Returns an error if the medium rejects the removal
    fn remove_item(&self, key: &str) -> StorageResult<()>;
}

/// Process-local storage medium
///
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty medium
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored keys, including their namespace prefix
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the medium is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Remove every key
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl StorageMedium for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }
}

/// JSON-file storage medium
///
/// The whole map lives in memory and is written back to a single JSON
/// document after every mutation (temp file + rename). A missing file opens
/// as an empty medium; an unreadable or corrupt file is logged and replaced
/// on the next write.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the medium at `path`
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let data = load_document(&path);
        debug!(path = %path.display(), keys = data.len(), "opened file storage");

        Ok(Self { path, data: RwLock::new(data) })
    }

    /// Location of the backing document
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> StorageResult<()> {
        let encoded = serde_json::to_vec_pretty(data)?;
        let tmp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

/// Undo an in-memory mutation whose write-back failed
fn restore(data: &mut BTreeMap<String, String>, key: &str, previous: Option<String>) {
    match previous {
        Some(value) => data.insert(key.to_string(), value),
        None => data.remove(key),
    };
}

fn load_document(path: &Path) -> BTreeMap<String, String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to read storage file");
            return BTreeMap::new();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|err| {
        error!(path = %path.display(), error = %err, "storage file is corrupt, starting empty");
        BTreeMap::new()
    })
}

impl StorageMedium for FileStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.write();
        let previous = data.insert(key.to_string(), value.to_string());
        self.persist(&data).inspect_err(|_| restore(&mut data, key, previous))
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let mut data = self.data.write();
        if let Some(previous) = data.remove(key) {
            self.persist(&data).inspect_err(|_| restore(&mut data, key, Some(previous)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage::medium.
    use super::*;

    /// Validates `MemoryStorage` behavior for the shared clone scenario.
    ///
    /// Assertions:
    /// - Confirms a write through one clone is visible through another.
    /// - Confirms removal of an absent key succeeds.
    #[test]
    fn test_memory_storage_clones_share_data() {
        let storage = MemoryStorage::new();
        let other = storage.clone();

        storage.set_item("a", "1").unwrap();
        assert_eq!(other.get_item("a").unwrap(), Some("1".to_string()));

        other.remove_item("a").unwrap();
        other.remove_item("missing").unwrap();
        assert!(storage.is_empty());
    }

    /// Validates `FileStorage::open` behavior for the reopen scenario.
    ///
    /// Assertions:
    /// - Confirms values written before reopening are read back.
    /// - Confirms removed keys stay removed after reopening.
    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        {
            let storage = FileStorage::open(&path).unwrap();
            storage.set_item("app--token", "{\"a\":1}").unwrap();
            storage.set_item("app--verifier", "abc").unwrap();
            storage.remove_item("app--verifier").unwrap();
        }

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get_item("app--token").unwrap(), Some("{\"a\":1}".to_string()));
        assert_eq!(reopened.get_item("app--verifier").unwrap(), None);
    }

    /// Validates `FileStorage::open` behavior for the corrupt document
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures a corrupt file opens as an empty medium.
    #[test]
    fn test_file_storage_corrupt_document_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.get_item("anything").unwrap(), None);

        storage.set_item("k", "v").unwrap();
        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get_item("k").unwrap(), Some("v".to_string()));
    }

    /// Validates `FileStorage::set_item` behavior for the failed write-back
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures a failed write leaves the previous value readable.
    /// - Ensures a failed removal keeps the key.
    #[test]
    fn test_file_storage_failed_write_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = FileStorage::open(&path).unwrap();
        storage.set_item("k", "old").unwrap();

        fs::create_dir(path.with_extension("tmp")).unwrap();

        assert!(storage.set_item("k", "new").is_err());
        assert!(storage.set_item("added", "x").is_err());
        assert!(storage.remove_item("k").is_err());

        assert_eq!(storage.get_item("k").unwrap(), Some("old".to_string()));
        assert_eq!(storage.get_item("added").unwrap(), None);
        assert_eq!(FileStorage::open(&path).unwrap().get_item("k").unwrap(), Some("old".to_string()));
    }
}
