//! Session handle for communicating with a session actor.
//!
//! `SessionHandle` is a thin wrapper around an `mpsc::Sender<SessionCommand>`.
//! It provides async methods for all session operations and is cheap to clone.

use tokio::sync::{mpsc, oneshot};

use crate::api::TurnRole;

use super::actor_types::{ActorError, SessionCommand, SessionMetadata, SessionView};

/// Handle for interacting with a session actor.
///
/// All methods communicate with the actor via message passing; the actor
/// applies operations one at a time in arrival order.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    id: String,
}

impl SessionHandle {
    pub(crate) fn new(tx: mpsc::Sender<SessionCommand>, id: String) -> Self {
        Self { tx, id }
    }

    /// Get the session ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    // ------------------------------------------------------------------------
    // Write Operations
    // ------------------------------------------------------------------------

    /// Append a conversation turn.
    ///
    /// Returns the turn's sequence number on success.
    pub async fn append_turn(&self, role: TurnRole, content: String) -> Result<u64, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::AppendTurn {
                role,
                content,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ActorError::ActorShutdown)?;

        reply_rx.await.map_err(|_| ActorError::ActorShutdown)?
    }

    /// Set the session's course context.
    pub async fn update_context(&self, course_id: String) -> Result<(), ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::UpdateContext {
                course_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ActorError::ActorShutdown)?;

        reply_rx.await.map_err(|_| ActorError::ActorShutdown)?
    }

    /// Transition the session to idle. Used by the lifecycle sweep.
    pub async fn mark_idle(&self) -> Result<(), ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::MarkIdle { reply: reply_tx })
            .await
            .map_err(|_| ActorError::ActorShutdown)?;

        reply_rx.await.map_err(|_| ActorError::ActorShutdown)?
    }

    /// Close the session, flushing a final snapshot.
    pub async fn close(&self) -> Result<(), ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Close { reply: reply_tx })
            .await
            .map_err(|_| ActorError::ActorShutdown)?;

        reply_rx.await.map_err(|_| ActorError::ActorShutdown)?
    }

    // ------------------------------------------------------------------------
    // Read Operations
    // ------------------------------------------------------------------------

    /// Get the full state view of the session.
    pub async fn view(&self) -> Result<SessionView, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::GetView { reply: reply_tx })
            .await
            .map_err(|_| ActorError::ActorShutdown)?;

        reply_rx.await.map_err(|_| ActorError::ActorShutdown)?
    }

    /// Get session metadata.
    pub async fn metadata(&self) -> Result<SessionMetadata, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::GetMetadata { reply: reply_tx })
            .await
            .map_err(|_| ActorError::ActorShutdown)?;

        reply_rx.await.map_err(|_| ActorError::ActorShutdown)?
    }

    // ------------------------------------------------------------------------
    // Durability
    // ------------------------------------------------------------------------

    /// Force an immediate snapshot write.
    pub async fn force_snapshot(&self) -> Result<(), ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::ForceSnapshot { reply: reply_tx })
            .await
            .map_err(|_| ActorError::ActorShutdown)?;

        reply_rx.await.map_err(|_| ActorError::ActorShutdown)?
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish()
    }
}
