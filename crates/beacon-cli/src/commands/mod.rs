//! CLI subcommands
//!
//! Every command reads the configuration file named by `--config` (or the
//! default path) and works on the stores and endpoint it describes.

pub mod config;
pub mod crashes;
pub mod profile;

use std::sync::Arc;

use anyhow::{Context, Result};

use beacon_agent::agent::SQLITE_FILE_NAME;
use beacon_agent::OfflineCrashStore;
use beacon_core::config::{Config, StorageBackend};
use beacon_core::ports::IKeyedDurableStore;
use beacon_store::{DatabasePool, FileDurableStore, SqliteDurableStore};

/// Opens the offline crash store configured in `offline`
pub async fn open_offline_store(config: &Config) -> Result<OfflineCrashStore> {
    let durable: Arc<dyn IKeyedDurableStore> = match config.offline.backend {
        StorageBackend::Filesystem => {
            Arc::new(FileDurableStore::new(config.offline.directory.clone()))
        }
        StorageBackend::Sqlite => {
            let path = config.offline.directory.join(SQLITE_FILE_NAME);
            let pool = DatabasePool::new(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Arc::new(SqliteDurableStore::new(pool.pool().clone()))
        }
    };
    Ok(OfflineCrashStore::new(durable, config.offline.max_entries))
}
