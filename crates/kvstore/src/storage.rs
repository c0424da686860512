//! Storage trait and implementations

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::{Result, StoreError};

pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&mut self, key: &str, value: &str) -> Result<()>;
}

/// In-memory storage (for testing and demos)
#[derive(Clone)]
pub struct InMemoryStorage {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for InMemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let data = self.data.read().map_err(|_| StoreError::Poisoned)?;
        Ok(data.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.write().map_err(|_| StoreError::Poisoned)?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Single JSON object on disk, rewritten on every put.
///
/// Writes go to `<path>.tmp` first and are renamed over the real file, so a
/// crash mid-write leaves the previous contents intact.
pub struct FileBackedStorage {
    path: PathBuf,
    data: BTreeMap<String, String>,
}

impl FileBackedStorage {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match std::fs::read(&path) {
            Ok(bytes) if bytes.iter().all(|b| b.is_ascii_whitespace()) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, data: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec_pretty(data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Storage for FileBackedStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.get(key).cloned())
    }

    /// The in-memory map only changes once the new contents are on disk.
    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        let mut next = self.data.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        self.data = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_clones_share_data() {
        let mut a = InMemoryStorage::new();
        let b = a.clone();
        a.put("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_file_backed_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut store = FileBackedStorage::open(&path).unwrap();
        assert_eq!(store.get("ht_usage_count").unwrap(), None);
        store.put("ht_usage_count", "3").unwrap();
        drop(store);

        let reopened = FileBackedStorage::open(&path).unwrap();
        assert_eq!(reopened.get("ht_usage_count").unwrap(), Some("3".to_string()));
    }

    #[test]
    fn test_file_backed_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/store.json");

        let mut store = FileBackedStorage::open(&path).unwrap();
        store.put("a", "1").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_file_backed_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        let path = blocker.join("store.json");

        let mut store = FileBackedStorage::open(&path).unwrap();
        store.put("ht_usage_count", "1").unwrap();

        // A plain file where the parent directory should be makes every write fail.
        std::fs::remove_dir_all(&blocker).unwrap();
        std::fs::write(&blocker, b"").unwrap();

        assert!(store.put("ht_usage_count", "2").is_err());
        assert_eq!(store.get("ht_usage_count").unwrap(), Some("1".to_string()));
        assert!(store.put("fresh", "x").is_err());
        assert_eq!(store.get("fresh").unwrap(), None);
    }

    #[test]
    fn test_file_backed_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"{not json").unwrap();

        match FileBackedStorage::open(&path) {
            Err(StoreError::Corrupt { .. }) => {}
            other => panic!("expected corrupt error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_file_backed_empty_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"\n").unwrap();

        let store = FileBackedStorage::open(&path).unwrap();
        assert_eq!(store.get("anything").unwrap(), None);
    }
}
