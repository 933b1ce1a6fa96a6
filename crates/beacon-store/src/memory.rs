//! In-memory store implementations
//!
//! Used by tests and by dry runs. Nothing survives the process, but the
//! behavior matches the durable adapters: modification times strictly
//! increase, and deleting a missing key is not an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use beacon_core::ports::{IKeyValueStore, IKeyedDurableStore, RecordInfo};

use crate::validate_key;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct MemoryRecords {
    records: BTreeMap<String, (Vec<u8>, DateTime<Utc>)>,
    last_modified: Option<DateTime<Utc>>,
}

/// Keyed durable store held in memory
#[derive(Debug, Default)]
pub struct MemoryDurableStore {
    inner: Mutex<MemoryRecords>,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        lock(&self.inner).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces a record's bytes without touching its modification time
    ///
    /// Lets tests simulate on-disk corruption.
    pub fn corrupt(&self, key: &str, bytes: &[u8]) -> bool {
        match lock(&self.inner).records.get_mut(key) {
            Some(entry) => {
                entry.0 = bytes.to_vec();
                true
            }
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl IKeyedDurableStore for MemoryDurableStore {
    async fn put(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        validate_key(key)?;
        let mut inner = lock(&self.inner);
        let now = Utc::now();
        let modified = match inner.last_modified {
            Some(last) if last >= now => last + Duration::microseconds(1),
            _ => now,
        };
        inner.last_modified = Some(modified);
        inner.records.insert(key.to_string(), (value.to_vec(), modified));
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(lock(&self.inner).records.get(key).map(|(v, _)| v.clone()))
    }

    async fn list(&self) -> anyhow::Result<Vec<RecordInfo>> {
        Ok(lock(&self.inner)
            .records
            .iter()
            .map(|(key, (value, modified_at))| RecordInfo {
                key: key.clone(),
                modified_at: *modified_at,
                size_bytes: value.len() as u64,
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        Ok(lock(&self.inner).records.remove(key).is_some())
    }
}

/// Key-value store held in memory
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `key = value`
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        lock(&store.values).insert(key.into(), value.into());
        store
    }

    /// Synchronous read, for assertions
    pub fn value(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }
}

#[async_trait::async_trait]
impl IKeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }
}
