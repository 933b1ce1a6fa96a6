//! Profile version counter
//!
//! Monotonic counter attached to every user-profile mutation so the backend
//! can order them. The value survives restarts through an
//! [`IKeyValueStore`]; an absent or unreadable value restarts the count at 0.
//!
//! [`ProfileVersionCounter::next`] returns immediately. The new value is
//! written in the background, and writes never move the persisted value
//! backwards even when they complete out of order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use beacon_core::domain::ProfileVersion;
use beacon_core::ports::IKeyValueStore;

use crate::schedule::TaskScheduler;

/// Key under which the counter is persisted
pub const PROFILE_VERSION_KEY: &str = "profile_version";

pub struct ProfileVersionCounter {
    store: Arc<dyn IKeyValueStore>,
    scheduler: TaskScheduler,
    current: AtomicU64,
    /// Highest value known to be on disk
    persisted: Arc<Mutex<u64>>,
}

impl ProfileVersionCounter {
    pub fn new(store: Arc<dyn IKeyValueStore>, scheduler: TaskScheduler) -> Self {
        Self {
            store,
            scheduler,
            current: AtomicU64::new(0),
            persisted: Arc::new(Mutex::new(0)),
        }
    }

    /// Reads the persisted value; anything unusable counts as 0
    pub async fn load(&self) -> ProfileVersion {
        let value = match self.store.get(PROFILE_VERSION_KEY).await {
            Ok(Some(raw)) => match raw.parse::<ProfileVersion>() {
                Ok(version) => version.value(),
                Err(e) => {
                    warn!(raw = %raw, error = %e, "Persisted profile version is unreadable, starting at 0");
                    0
                }
            },
            Ok(None) => {
                debug!("No persisted profile version, starting at 0");
                0
            }
            Err(e) => {
                warn!(error = %e, "Failed to read profile version, starting at 0");
                0
            }
        };

        *self.persisted.lock().await = value;
        self.current.store(value, Ordering::SeqCst);
        debug!(profile_version = value, "Profile version loaded");
        ProfileVersion::new(value)
    }

    /// Increments the counter and persists the new value in the background
    pub fn next(&self) -> ProfileVersion {
        let value = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let store = self.store.clone();
        let persisted = self.persisted.clone();
        self.scheduler.spawn(persist(store, persisted, value));
        ProfileVersion::new(value)
    }

    pub fn current(&self) -> ProfileVersion {
        ProfileVersion::new(self.current.load(Ordering::SeqCst))
    }

    /// Waits until the current value is persisted (best effort)
    pub async fn flush(&self) {
        let value = self.current.load(Ordering::SeqCst);
        persist(self.store.clone(), self.persisted.clone(), value).await;
    }
}

async fn persist(store: Arc<dyn IKeyValueStore>, persisted: Arc<Mutex<u64>>, value: u64) {
    let mut on_disk = persisted.lock().await;
    if value <= *on_disk {
        return;
    }
    match store.set(PROFILE_VERSION_KEY, &value.to_string()).await {
        Ok(()) => {
            *on_disk = value;
            debug!(profile_version = value, "Profile version persisted");
        }
        Err(e) => {
            warn!(profile_version = value, error = %e, "Failed to persist profile version");
        }
    }
}

impl std::fmt::Debug for ProfileVersionCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileVersionCounter")
            .field("current", &self.current.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
