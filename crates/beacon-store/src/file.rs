//! Filesystem implementation of IKeyedDurableStore
//!
//! Each record is a `<key>.json` file in a single directory. Writes go to a
//! hidden temporary file first and are renamed into place, so a crash during
//! a write never leaves a truncated record behind. The file's modification
//! time is the record's modification time.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;

use beacon_core::ports::{IKeyedDurableStore, RecordInfo};

use crate::validate_key;

const RECORD_EXTENSION: &str = "json";

/// Directory-backed keyed durable store
#[derive(Debug, Clone)]
pub struct FileDurableStore {
    dir: PathBuf,
}

impl FileDurableStore {
    /// Creates a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Returns the default crash directory.
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("beacon")
            .join("crashes")
    }

    /// Returns the storage directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{RECORD_EXTENSION}"))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{key}.{RECORD_EXTENSION}.tmp"))
    }
}

#[async_trait::async_trait]
impl IKeyedDurableStore for FileDurableStore {
    async fn put(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        validate_key(key)?;
        fs::create_dir_all(&self.dir).await?;

        let tmp = self.temp_path(key);
        fs::write(&tmp, value).await?;
        if let Err(e) = fs::rename(&tmp, self.record_path(key)).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::trace!(key, size = value.len(), "Wrote record file");
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        validate_key(key)?;
        match fs::read(self.record_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> anyhow::Result<Vec<RecordInfo>> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |e| e != RECORD_EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };
            if key.starts_with('.') {
                continue;
            }

            // Deleted between read_dir and stat
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let modified_at: DateTime<Utc> = metadata.modified()?.into();

            records.push(RecordInfo {
                key,
                modified_at,
                size_bytes: metadata.len(),
            });
        }
        Ok(records)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        validate_key(key)?;
        match fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
