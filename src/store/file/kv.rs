//! File-based key-value store for a single data domain.
//!
//! Each record is one JSON document at `{dir}/{key}.json`. Writes go through
//! a temp file and an atomic rename.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;

use crate::store::error::{StorageError, StorageResult};
use crate::store::kv::KvStore;

/// File-based implementation of `KvStore`.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Create a new file store rooted at `dir`.
    ///
    /// The directory is created when the first record is written.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

/// Reject keys that could escape the store directory or collide with the
/// temp-file suffix.
fn validate_key(key: &str) -> StorageResult<()> {
    let ok = !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        && !key.contains("..");
    if ok {
        Ok(())
    } else {
        Err(StorageError::invalid_key(key))
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let path = self.record_path(key)?;

        let contents = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::file_io(&path, e)),
        };

        let value = serde_json::from_str(&contents)
            .map_err(|e| StorageError::file_deserialization(&path, e.to_string()))?;

        Ok(Some(value))
    }

    async fn put(&self, key: &str, value: &Value) -> StorageResult<()> {
        let final_path = self.record_path(key)?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::file_io(&self.dir, e))?;

        let json = serde_json::to_string(value)
            .map_err(|e| StorageError::serialization(e.to_string()))?;

        let temp_path = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&temp_path, json.as_bytes())
            .await
            .map_err(|e| StorageError::file_io(&temp_path, e))?;

        fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| StorageError::file_io(&final_path, e))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let path = self.record_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::file_io(&path, e)),
        }
    }
}
