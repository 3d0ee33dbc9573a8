//! Session actor types and protocol.
//!
//! Defines the command protocol for communicating with session actors,
//! along with configuration and error types.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::api::{SessionStatus, Turn, TurnRole};
use crate::store::SessionStateStore;

// ============================================================================
// Session Command
// ============================================================================

/// Commands that can be sent to a session actor.
///
/// Each carries a oneshot reply channel; the actor processes commands one
/// at a time in arrival order.
pub enum SessionCommand {
    // Write operations
    AppendTurn {
        role: TurnRole,
        content: String,
        reply: oneshot::Sender<Result<u64, ActorError>>,
    },
    UpdateContext {
        course_id: String,
        reply: oneshot::Sender<Result<(), ActorError>>,
    },
    MarkIdle {
        reply: oneshot::Sender<Result<(), ActorError>>,
    },
    Close {
        reply: oneshot::Sender<Result<(), ActorError>>,
    },

    // Read operations
    GetView {
        reply: oneshot::Sender<Result<SessionView, ActorError>>,
    },
    GetMetadata {
        reply: oneshot::Sender<Result<SessionMetadata, ActorError>>,
    },

    // Durability
    ForceSnapshot {
        reply: oneshot::Sender<Result<(), ActorError>>,
    },
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors from actor operations.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The actor has shut down.
    #[error("actor has shut down")]
    ActorShutdown,

    /// Session not found.
    #[error("session not found: {0}")]
    NotFound(String),

    /// Operation rejected because the session is closed. State unchanged.
    #[error("session is closed: {0}")]
    SessionClosed(String),

    /// Turn content was empty after trimming. State unchanged.
    #[error("turn content is empty")]
    EmptyTurn,

    /// Durable write failed after the bounded retry. In-memory state was
    /// rolled back; the session remains consistent.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

// ============================================================================
// Read Models
// ============================================================================

/// Metadata about a session (returned by `GetMetadata`).
#[derive(Debug, Clone)]
pub struct SessionMetadata {
    pub id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub turn_count: u64,
    pub context: Option<String>,
}

/// Full state view of a session (returned by `GetView`).
#[derive(Debug, Clone)]
pub struct SessionView {
    pub id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub context: Option<String>,
    pub turns: Vec<Turn>,
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for spawning a new actor.
pub struct ActorConfig {
    pub id: String,
    pub store: Arc<dyn SessionStateStore>,
}

// ============================================================================
// Constants
// ============================================================================

/// Channel capacity for commands. Senders block when full, providing
/// backpressure per session.
pub const CHANNEL_CAPACITY: usize = 64;

/// Attempts for a durable snapshot write before surfacing
/// `PersistenceFailure`.
pub const PERSIST_ATTEMPTS: u32 = 3;

/// Base delay between persistence retries; doubles per attempt.
pub const PERSIST_RETRY_BASE: Duration = Duration::from_millis(50);
