//! Shared API types used by the gateway handlers.
//!
//! These types define the wire contract between server and client. The
//! schemas in `contract::routes` mirror them; changes here must be made in
//! both places.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// ID Prefixes
// ============================================================================

/// ID prefix for sessions.
pub const SESSION_ID_PREFIX: &str = "session_";

/// ID prefix for credential key records.
pub const KEY_ID_PREFIX: &str = "key_";

// ============================================================================
// Session Types
// ============================================================================

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session is active and accepting operations.
    Active,
    /// Session passed the inactivity window; still addressable.
    Idle,
    /// Session was closed (explicitly or by the idle sweep); state is
    /// durable and the in-memory instance may be evicted.
    Closed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Tutor,
}

/// One turn in a session's conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Monotonic per-session sequence number, starting at 1.
    pub seq: u64,
    pub role: TurnRole,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// Request to create a new session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {}

/// Response for session creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub status: SessionStatus,
    pub created_at: String,
}

/// Summary of a session in list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub turn_count: u64,
    pub created_at: String,
}

/// Response for listing sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

/// Response for getting a single session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSessionResponse {
    pub session_id: String,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub turn_count: u64,
    pub created_at: String,
    pub updated_at: String,
}

/// Request to append a turn to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendTurnRequest {
    pub role: TurnRole,
    pub content: String,
}

/// Response after appending a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendTurnResponse {
    pub seq: u64,
    pub status: SessionStatus,
}

/// Response for listing a session's turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTurnsResponse {
    pub turns: Vec<Turn>,
}

/// Request to update a session's course context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateContextRequest {
    pub course_id: String,
}

/// Response after updating a session's course context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateContextResponse {
    pub context: String,
    pub status: SessionStatus,
}

/// Response after closing a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseSessionResponse {
    pub session_id: String,
    pub status: SessionStatus,
}

// ============================================================================
// Credential Key Types
// ============================================================================

/// Request to submit a bring-your-own-key provider credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreKeyRequest {
    pub provider: String,
    pub api_key: String,
}

/// Response after storing a provider credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreKeyResponse {
    pub key_id: String,
    pub provider: String,
    pub created_at: String,
}

/// Key record metadata in list responses. Never carries key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySummary {
    pub key_id: String,
    pub provider: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<String>,
}

/// Response for listing a user's stored keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListKeysResponse {
    pub keys: Vec<KeySummary>,
}

// ============================================================================
// Domain Record Types
// ============================================================================

/// Request to write a record into one of the data domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutRecordRequest {
    pub value: serde_json::Value,
}

/// Response for reading a record from a data domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResponse {
    pub domain: String,
    pub key: String,
    pub value: serde_json::Value,
}
