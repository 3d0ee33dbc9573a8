//! Key record storage.
//!
//! Records are stored per user:
//! ```text
//! {keys_dir}/
//!   {user_id}/
//!     {key_id}.json
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::store::error::{StorageError, StorageResult};

use super::record::EncryptedKeyRecord;

/// Storage interface for encrypted key records.
#[async_trait]
pub trait KeyRecordStore: Send + Sync {
    /// Load a record. Returns `Ok(None)` if it does not exist.
    async fn load(
        &self,
        user_id: &str,
        record_id: &str,
    ) -> StorageResult<Option<EncryptedKeyRecord>>;

    /// Save a record, replacing any existing one with the same id.
    ///
    /// Must be atomic - either fully succeeds or has no effect.
    async fn save(&self, record: &EncryptedKeyRecord) -> StorageResult<()>;

    /// Delete a record. Returns `true` if a record was removed.
    async fn delete(&self, user_id: &str, record_id: &str) -> StorageResult<bool>;

    /// List all records belonging to a user.
    async fn list(&self, user_id: &str) -> StorageResult<Vec<EncryptedKeyRecord>>;

    /// List every record in the store. Used for KEK rotation.
    async fn list_all(&self) -> StorageResult<Vec<EncryptedKeyRecord>>;
}

/// File-based implementation of `KeyRecordStore`.
#[derive(Debug, Clone)]
pub struct FileKeyRecordStore {
    keys_dir: PathBuf,
}

impl FileKeyRecordStore {
    pub fn new(keys_dir: impl Into<PathBuf>) -> Self {
        Self {
            keys_dir: keys_dir.into(),
        }
    }

    fn user_dir(&self, user_id: &str) -> StorageResult<PathBuf> {
        validate_component(user_id)?;
        Ok(self.keys_dir.join(user_id))
    }

    fn record_path(&self, user_id: &str, record_id: &str) -> StorageResult<PathBuf> {
        validate_component(record_id)?;
        Ok(self.user_dir(user_id)?.join(format!("{record_id}.json")))
    }

    async fn read_record(&self, path: &PathBuf) -> StorageResult<Option<EncryptedKeyRecord>> {
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::file_io(path, e)),
        };

        let record = serde_json::from_str(&contents)
            .map_err(|e| StorageError::file_deserialization(path, e.to_string()))?;
        Ok(Some(record))
    }

    async fn list_dir(&self, dir: &PathBuf) -> StorageResult<Vec<EncryptedKeyRecord>> {
        let mut records = Vec::new();

        let mut entries = match fs::read_dir(dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::file_io(dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::file_io(dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(record) = self.read_record(&path).await? {
                    records.push(record);
                }
            }
        }

        Ok(records)
    }
}

/// Reject path components that could escape the store directory.
fn validate_component(component: &str) -> StorageResult<()> {
    let ok = !component.is_empty()
        && component.len() <= 128
        && component
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !component.contains("..");
    if ok {
        Ok(())
    } else {
        Err(StorageError::invalid_key(component))
    }
}

#[async_trait]
impl KeyRecordStore for FileKeyRecordStore {
    async fn load(
        &self,
        user_id: &str,
        record_id: &str,
    ) -> StorageResult<Option<EncryptedKeyRecord>> {
        let path = self.record_path(user_id, record_id)?;
        self.read_record(&path).await
    }

    async fn save(&self, record: &EncryptedKeyRecord) -> StorageResult<()> {
        let dir = self.user_dir(&record.user_id)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::file_io(&dir, e))?;

        let final_path = self.record_path(&record.user_id, &record.id)?;
        let temp_path = dir.join(format!("{}.json.tmp", record.id));

        let json = serde_json::to_string(record)
            .map_err(|e| StorageError::serialization(e.to_string()))?;

        fs::write(&temp_path, json.as_bytes())
            .await
            .map_err(|e| StorageError::file_io(&temp_path, e))?;

        fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| StorageError::file_io(&final_path, e))?;

        Ok(())
    }

    async fn delete(&self, user_id: &str, record_id: &str) -> StorageResult<bool> {
        let path = self.record_path(user_id, record_id)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::file_io(&path, e)),
        }
    }

    async fn list(&self, user_id: &str) -> StorageResult<Vec<EncryptedKeyRecord>> {
        let dir = self.user_dir(user_id)?;
        self.list_dir(&dir).await
    }

    async fn list_all(&self) -> StorageResult<Vec<EncryptedKeyRecord>> {
        let mut records = Vec::new();

        let mut entries = match fs::read_dir(&self.keys_dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::file_io(&self.keys_dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::file_io(&self.keys_dir, e))?
        {
            let path = entry.path();
            if path.is_dir() {
                records.extend(self.list_dir(&path).await?);
            }
        }

        Ok(records)
    }
}
