//! Session state storage trait.
//!
//! Defines the interface for persisting session snapshots. The session
//! actor writes a snapshot after every committed operation; the directory
//! reads them back to rehydrate evicted sessions.

use async_trait::async_trait;

use crate::session::SessionSnapshot;

use super::error::StorageResult;

/// Storage interface for durable session state.
#[async_trait]
pub trait SessionStateStore: Send + Sync {
    /// List all session IDs with durable state.
    async fn list(&self) -> StorageResult<Vec<String>>;

    /// Load the snapshot for a session.
    ///
    /// Returns `Ok(None)` if the session has no durable state.
    async fn load(&self, session_id: &str) -> StorageResult<Option<SessionSnapshot>>;

    /// Save a snapshot for a session.
    ///
    /// Must be atomic - either fully succeeds or has no effect.
    async fn save(&self, snapshot: &SessionSnapshot) -> StorageResult<()>;

    /// Delete a session's durable state.
    async fn delete(&self, session_id: &str) -> StorageResult<()>;
}
