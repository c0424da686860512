//! Durable usage counter and issued-code registry.

use std::collections::HashMap;
use std::sync::Mutex;

use kvstore::{Storage, StoreError};
use tracing::{info, warn};

pub const USAGE_KEY: &str = "ht_usage_count";
pub const CODES_KEY: &str = "ht_custom_codes";
pub const METADATA_KEY: &str = "ht_code_metadata";

pub trait SessionStore: Send + Sync {
    fn usage_count(&self) -> kvstore::Result<u64>;

    /// Atomic read-increment-write. Returns the new value.
    fn increment_usage(&self) -> kvstore::Result<u64>;

    fn issued_codes(&self) -> kvstore::Result<Vec<String>>;

    fn code_durations(&self) -> kvstore::Result<HashMap<String, u64>>;

    /// Appends `code` with its duration. Returns `false` and writes nothing
    /// when the code is already registered.
    fn record_code(&self, code: &str, duration_ms: u64) -> kvstore::Result<bool>;
}

pub struct KvSessionStore<S: Storage> {
    inner: Mutex<S>,
}

impl<S: Storage> KvSessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { inner: Mutex::new(storage) }
    }

    fn lock(&self) -> kvstore::Result<std::sync::MutexGuard<'_, S>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn read_usage<S: Storage>(storage: &S) -> kvstore::Result<u64> {
    match storage.get(USAGE_KEY)? {
        None => Ok(0),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(n) => Ok(n),
            Err(_) => {
                warn!(value=%raw, "usage counter is not a number, treating as 0");
                Ok(0)
            }
        },
    }
}

fn read_codes<S: Storage>(storage: &S) -> kvstore::Result<Vec<String>> {
    match storage.get(CODES_KEY)? {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            path: CODES_KEY.to_string(),
            message: e.to_string(),
        }),
    }
}

fn read_durations<S: Storage>(storage: &S) -> kvstore::Result<HashMap<String, u64>> {
    match storage.get(METADATA_KEY)? {
        None => Ok(HashMap::new()),
        Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            path: METADATA_KEY.to_string(),
            message: e.to_string(),
        }),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> kvstore::Result<String> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl<S: Storage> SessionStore for KvSessionStore<S> {
    fn usage_count(&self) -> kvstore::Result<u64> {
        let storage = self.lock()?;
        read_usage(&*storage)
    }

    fn increment_usage(&self) -> kvstore::Result<u64> {
        let mut storage = self.lock()?;
        let next = read_usage(&*storage)?.saturating_add(1);
        storage.put(USAGE_KEY, &next.to_string())?;
        info!(usage = next, "usage counter incremented");
        Ok(next)
    }

    fn issued_codes(&self) -> kvstore::Result<Vec<String>> {
        let storage = self.lock()?;
        read_codes(&*storage)
    }

    fn code_durations(&self) -> kvstore::Result<HashMap<String, u64>> {
        let storage = self.lock()?;
        read_durations(&*storage)
    }

    fn record_code(&self, code: &str, duration_ms: u64) -> kvstore::Result<bool> {
        let mut storage = self.lock()?;
        let mut codes = read_codes(&*storage)?;
        if codes.iter().any(|c| c == code) {
            return Ok(false);
        }
        let mut durations = read_durations(&*storage)?;
        if durations.contains_key(code) {
            return Ok(false);
        }

        codes.push(code.to_string());
        durations.insert(code.to_string(), duration_ms);

        // Metadata first: a code without metadata still resolves to the default.
        storage.put(METADATA_KEY, &to_json(&durations)?)?;
        storage.put(CODES_KEY, &to_json(&codes)?)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvstore::InMemoryStorage;
    use std::sync::Arc;

    #[test]
    fn test_usage_starts_at_zero_and_increments() {
        let store = KvSessionStore::new(InMemoryStorage::new());
        assert_eq!(store.usage_count().unwrap(), 0);
        assert_eq!(store.increment_usage().unwrap(), 1);
        assert_eq!(store.increment_usage().unwrap(), 2);
        assert_eq!(store.usage_count().unwrap(), 2);
    }

    #[test]
    fn test_non_numeric_usage_reads_as_zero() {
        let mut raw = InMemoryStorage::new();
        raw.put(USAGE_KEY, "banana").unwrap();
        let store = KvSessionStore::new(raw);
        assert_eq!(store.usage_count().unwrap(), 0);
        assert_eq!(store.increment_usage().unwrap(), 1);
    }

    #[test]
    fn test_record_code_refuses_duplicates() {
        let store = KvSessionStore::new(InMemoryStorage::new());
        assert!(store.record_code("ALICE-1234", 86_400_000).unwrap());
        assert!(!store.record_code("ALICE-1234", 1).unwrap());

        assert_eq!(store.issued_codes().unwrap(), vec!["ALICE-1234".to_string()]);
        assert_eq!(store.code_durations().unwrap()["ALICE-1234"], 86_400_000);
    }

    #[test]
    fn test_persisted_layout() {
        let raw = InMemoryStorage::new();
        let store = KvSessionStore::new(raw.clone());
        store.increment_usage().unwrap();
        store.record_code("BOB-4321", 172_800_000).unwrap();

        assert_eq!(raw.get(USAGE_KEY).unwrap().as_deref(), Some("1"));
        assert_eq!(raw.get(CODES_KEY).unwrap().as_deref(), Some(r#"["BOB-4321"]"#));
        assert_eq!(
            raw.get(METADATA_KEY).unwrap().as_deref(),
            Some(r#"{"BOB-4321":172800000}"#)
        );
    }

    #[test]
    fn test_failed_usage_write_does_not_count() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("state");
        let store = KvSessionStore::new(kvstore::FileBackedStorage::open(blocker.join("store.json")).unwrap());
        assert_eq!(store.increment_usage().unwrap(), 1);

        std::fs::remove_dir_all(&blocker).unwrap();
        std::fs::write(&blocker, b"").unwrap();

        assert!(store.increment_usage().is_err());
        assert_eq!(store.usage_count().unwrap(), 1);
        assert!(store.record_code("CAROL-1111", 1).is_err());
        assert!(store.issued_codes().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_registry_is_an_error() {
        let mut raw = InMemoryStorage::new();
        raw.put(CODES_KEY, "[not json").unwrap();
        let store = KvSessionStore::new(raw);
        assert!(matches!(store.issued_codes(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(KvSessionStore::new(InMemoryStorage::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        s.increment_usage().unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.usage_count().unwrap(), 200);
    }
}
