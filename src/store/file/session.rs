//! File-based session state storage.
//!
//! Snapshots are stored as YAML, one file per session:
//! ```text
//! {sessions_dir}/
//!   {session_id}.yaml
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::session::SessionSnapshot;
use crate::store::error::{StorageError, StorageResult};
use crate::store::session::SessionStateStore;

/// File-based implementation of `SessionStateStore`.
#[derive(Debug, Clone)]
pub struct FileSessionStateStore {
    sessions_dir: PathBuf,
}

impl FileSessionStateStore {
    /// Create a new file session store.
    ///
    /// The sessions directory is created when the first snapshot is saved.
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
        }
    }

    fn snapshot_path(&self, session_id: &str) -> StorageResult<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.sessions_dir.join(format!("{session_id}.yaml")))
    }
}

/// Reject identifiers that could escape the sessions directory. Session ids
/// arrive from URL path segments, which axum percent-decodes.
fn validate_session_id(session_id: &str) -> StorageResult<()> {
    let ok = !session_id.is_empty()
        && session_id.len() <= 128
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !session_id.contains("..");
    if ok {
        Ok(())
    } else {
        Err(StorageError::invalid_key(session_id))
    }
}

#[async_trait]
impl SessionStateStore for FileSessionStateStore {
    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut sessions = Vec::new();

        let mut entries = match fs::read_dir(&self.sessions_dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::file_io(&self.sessions_dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::file_io(&self.sessions_dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "yaml") {
                if let Some(stem) = path.file_stem() {
                    sessions.push(stem.to_string_lossy().to_string());
                }
            }
        }

        Ok(sessions)
    }

    async fn load(&self, session_id: &str) -> StorageResult<Option<SessionSnapshot>> {
        let path = self.snapshot_path(session_id)?;

        let contents = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::file_io(&path, e)),
        };

        let snapshot: SessionSnapshot = serde_yaml::from_str(&contents)
            .map_err(|e| StorageError::file_deserialization(&path, e.to_string()))?;

        if !snapshot.is_compatible() {
            return Err(StorageError::file_incompatible_schema(
                &path,
                SessionSnapshot::SCHEMA_VERSION,
                &snapshot.schema_version,
            ));
        }

        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> StorageResult<()> {
        let final_path = self.snapshot_path(&snapshot.session_id)?;

        fs::create_dir_all(&self.sessions_dir)
            .await
            .map_err(|e| StorageError::file_io(&self.sessions_dir, e))?;
        let temp_path = self
            .sessions_dir
            .join(format!("{}.yaml.tmp", snapshot.session_id));

        let yaml = serde_yaml::to_string(snapshot)
            .map_err(|e| StorageError::serialization(e.to_string()))?;

        fs::write(&temp_path, yaml.as_bytes())
            .await
            .map_err(|e| StorageError::file_io(&temp_path, e))?;

        fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| StorageError::file_io(&final_path, e))?;

        Ok(())
    }

    async fn delete(&self, session_id: &str) -> StorageResult<()> {
        let path = self.snapshot_path(session_id)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::file_io(&path, e)),
        }
    }
}
