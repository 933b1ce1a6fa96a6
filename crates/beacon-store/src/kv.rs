//! Filesystem implementation of IKeyValueStore
//!
//! One small text file per key. Writes are atomic (temp file + rename).

use std::path::{Path, PathBuf};

use tokio::fs;

use beacon_core::ports::IKeyValueStore;

use crate::validate_key;

/// Directory-backed key-value store for small persisted state
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait::async_trait]
impl IKeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        validate_key(key)?;
        match fs::read_to_string(self.dir.join(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        validate_key(key)?;
        fs::create_dir_all(&self.dir).await?;

        let tmp = self.dir.join(format!(".{key}.tmp"));
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, self.dir.join(key)).await?;
        Ok(())
    }
}
