//! Offline crash store
//!
//! A capacity-bounded queue of undelivered crash reports on top of an
//! [`IKeyedDurableStore`]. Each crash is one record keyed by its
//! [`StorageId`]. The store owns eviction and corruption handling; retry
//! policy lives in the retry scheduler.
//!
//! Writes (store, retry-count update) are serialized by an internal lock so
//! that eviction decisions are taken against a stable listing.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use beacon_core::domain::{CrashPayload, StorageId, StoredCrash};
use beacon_core::ports::{IKeyedDurableStore, RecordInfo};

use crate::error::OfflineStoreError;
use crate::metrics::AgentMetrics;

/// Entry limit when none is configured
pub const DEFAULT_MAX_ENTRIES: usize = 100;

pub type Result<T> = std::result::Result<T, OfflineStoreError>;

pub struct OfflineCrashStore {
    store: Arc<dyn IKeyedDurableStore>,
    max_entries: usize,
    write_lock: Mutex<()>,
    metrics: Option<Arc<AgentMetrics>>,
}

impl OfflineCrashStore {
    pub fn new(store: Arc<dyn IKeyedDurableStore>, max_entries: usize) -> Self {
        Self {
            store,
            max_entries: max_entries.max(1),
            write_lock: Mutex::new(()),
            metrics: None,
        }
    }

    /// Reports entry counts, evictions and corruption to `metrics`
    pub fn with_metrics(mut self, metrics: Arc<AgentMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    // ========================================================================
    // Write path
    // ========================================================================

    /// Persists `payload` with fresh retry metadata
    ///
    /// Evicts the oldest entries first when the write would push the store
    /// past its capacity.
    pub async fn store_crash(&self, payload: &CrashPayload) -> Result<StorageId> {
        let _guard = self.write_lock.lock().await;

        let now = Utc::now();
        let id = StorageId::generate(now);
        let bytes = StoredCrash::new(payload.clone(), id.clone(), now).to_bytes()?;

        let remaining = self.evict_for_insert().await?;
        self.store
            .put(id.as_str(), &bytes)
            .await
            .map_err(OfflineStoreError::storage)?;

        if let Some(metrics) = &self.metrics {
            metrics.set_offline_entries(remaining + 1);
        }
        info!(
            storage_id = %id,
            fingerprint = %payload.fingerprint(),
            entries = remaining + 1,
            "Crash stored for later delivery"
        );
        Ok(id)
    }

    /// Deletes the oldest records until one more fits; returns how many remain
    async fn evict_for_insert(&self) -> Result<usize> {
        let mut records = self.store.list().await.map_err(OfflineStoreError::storage)?;
        if records.len() < self.max_entries {
            return Ok(records.len());
        }

        records.sort_by(|a, b| {
            a.modified_at
                .cmp(&b.modified_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        let excess = records.len() + 1 - self.max_entries;
        let mut remaining = records.len();

        for record in records.iter().take(excess) {
            match self.store.delete(&record.key).await {
                Ok(_) => {
                    remaining -= 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.offline_evictions_total.inc();
                    }
                    debug!(storage_id = %record.key, "Evicted oldest stored crash");
                }
                Err(e) => {
                    warn!(storage_id = %record.key, error = %e, "Failed to evict stored crash");
                }
            }
        }

        Ok(remaining)
    }

    /// Rewrites the retry metadata of a stored crash
    pub async fn update_retry_count(&self, id: &StorageId, retry_count: u32) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut crash = self
            .get_crash(id)
            .await?
            .ok_or_else(|| OfflineStoreError::NotFound(id.clone()))?;
        crash.record_retry(retry_count, Utc::now());

        let bytes = crash.to_bytes()?;
        self.store
            .put(id.as_str(), &bytes)
            .await
            .map_err(OfflineStoreError::storage)?;

        debug!(storage_id = %id, retry_count, "Updated retry count");
        Ok(())
    }

    /// Removes a stored crash; missing ids are not an error
    pub async fn delete_crash(&self, id: &StorageId) -> Result<bool> {
        let existed = self
            .store
            .delete(id.as_str())
            .await
            .map_err(OfflineStoreError::storage)?;
        debug!(storage_id = %id, existed, "Deleted stored crash");
        Ok(existed)
    }

    /// Removes every stored crash; returns the number removed
    pub async fn clear_all(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let records = self.store.list().await.map_err(OfflineStoreError::storage)?;
        let mut removed = 0;
        for record in records {
            if self
                .store
                .delete(&record.key)
                .await
                .map_err(OfflineStoreError::storage)?
            {
                removed += 1;
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.set_offline_entries(0);
        }
        info!(removed, "Cleared offline crash store");
        Ok(removed)
    }

    // ========================================================================
    // Read path
    // ========================================================================

    /// All stored crashes, newest first
    ///
    /// Records that cannot be decoded are deleted and left out.
    pub async fn list_stored_crashes(&self) -> Result<Vec<StoredCrash>> {
        let records = self.store.list().await.map_err(OfflineStoreError::storage)?;

        let mut crashes = Vec::with_capacity(records.len());
        for record in records {
            if let Some(crash) = self.load_record(&record).await? {
                crashes.push(crash);
            }
        }

        crashes.sort_by(|a, b| {
            b.stored_at()
                .cmp(&a.stored_at())
                .then_with(|| b.id().cmp(a.id()))
        });

        if let Some(metrics) = &self.metrics {
            metrics.set_offline_entries(crashes.len());
        }
        Ok(crashes)
    }

    /// Reads one stored crash
    ///
    /// A corrupt record is deleted and reported as [`OfflineStoreError::Corrupt`].
    pub async fn get_crash(&self, id: &StorageId) -> Result<Option<StoredCrash>> {
        let Some(bytes) = self
            .store
            .get(id.as_str())
            .await
            .map_err(OfflineStoreError::storage)?
        else {
            return Ok(None);
        };

        match StoredCrash::from_bytes(&bytes) {
            Ok(crash) => Ok(Some(crash.with_id(id.clone()))),
            Err(e) => {
                let reason = e.to_string();
                self.discard_corrupt(id.as_str(), &reason).await;
                Err(OfflineStoreError::Corrupt {
                    id: id.clone(),
                    reason,
                })
            }
        }
    }

    /// Number of decodable stored crashes
    pub async fn count(&self) -> Result<usize> {
        Ok(self.list_stored_crashes().await?.len())
    }

    async fn load_record(&self, record: &RecordInfo) -> Result<Option<StoredCrash>> {
        let id = match StorageId::new(record.key.as_str()) {
            Ok(id) => id,
            Err(e) => {
                self.discard_corrupt(&record.key, &e.to_string()).await;
                return Ok(None);
            }
        };

        match self.get_crash(&id).await {
            Ok(crash) => Ok(crash),
            Err(OfflineStoreError::Corrupt { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn discard_corrupt(&self, key: &str, reason: &str) {
        warn!(storage_id = %key, reason, "Removing corrupt stored crash");
        if let Some(metrics) = &self.metrics {
            metrics.offline_corrupt_total.inc();
        }
        if let Err(e) = self.store.delete(key).await {
            warn!(storage_id = %key, error = %e, "Failed to remove corrupt stored crash");
        }
    }
}

impl std::fmt::Debug for OfflineCrashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineCrashStore")
            .field("max_entries", &self.max_entries)
            .finish_non_exhaustive()
    }
}
