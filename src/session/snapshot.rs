//! Session snapshot schema.
//!
//! Snapshots are the sole durable form of session state, written as YAML
//! after every committed operation and read back to rehydrate evicted
//! sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{SessionStatus, Turn};

/// Durable snapshot of one session's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Schema version for forward compatibility.
    pub schema_version: String,
    pub session_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    /// When this snapshot was taken.
    pub snapshot_at: DateTime<Utc>,
    /// Last time an operation touched the session.
    pub last_activity: DateTime<Utc>,
    /// Current course/context reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Full conversation history in turn order.
    pub turns: Vec<Turn>,
    /// Sequence number of the last appended turn.
    pub last_seq: u64,
}

impl SessionSnapshot {
    /// Current schema version.
    pub const SCHEMA_VERSION: &'static str = "1";

    /// Check if this snapshot is compatible with the current schema.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == Self::SCHEMA_VERSION
    }
}
