//! Per-session actor for serialized state mutations.
//!
//! Each session gets a dedicated actor task that:
//! - Serializes all mutations via message passing (no locks)
//! - Owns both in-memory state and disk persistence
//! - Commits an operation only after its snapshot is durable
//!
//! An operation either fully commits or has no effect: the mutation is
//! applied, the snapshot is written with a bounded retry, and on exhaustion
//! the mutation is rolled back before the error is reported. Because every
//! committed operation is durable before its reply, actor exit needs no
//! flush - and must not write one, or a dying instance could overwrite a
//! rehydrated successor's newer state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::api::{SessionStatus, Turn, TurnRole};
use crate::store::SessionStateStore;

use super::actor_types::{
    ActorConfig, ActorError, SessionCommand, SessionMetadata, SessionView, CHANNEL_CAPACITY,
    PERSIST_ATTEMPTS, PERSIST_RETRY_BASE,
};
use super::snapshot::SessionSnapshot;

// ============================================================================
// Session Actor
// ============================================================================

/// Per-session actor that owns state and handles mutations.
pub struct SessionActor {
    // Identity
    id: String,

    // State
    status: SessionStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    context: Option<String>,
    turns: Vec<Turn>,
    last_seq: u64,

    // Persistence
    store: Arc<dyn SessionStateStore>,

    // Communication
    command_rx: mpsc::Receiver<SessionCommand>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SessionActor {
    /// Spawn a new session actor for a fresh session.
    ///
    /// Returns the command sender and a JoinHandle for the actor task. The
    /// caller is expected to confirm durability via `ForceSnapshot` before
    /// treating the session as created.
    pub fn spawn(
        config: ActorConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (mpsc::Sender<SessionCommand>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let now = Utc::now();

        let actor = Self {
            id: config.id,
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
            last_activity: now,
            context: None,
            turns: Vec::new(),
            last_seq: 0,
            store: config.store,
            command_rx: rx,
            shutdown_rx,
        };

        let handle = tokio::spawn(actor.run());
        (tx, handle)
    }

    /// Spawn an actor rehydrated from a snapshot.
    ///
    /// A closed session comes back active with its history intact.
    pub fn spawn_rehydrated(
        snapshot: SessionSnapshot,
        store: Arc<dyn SessionStateStore>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (mpsc::Sender<SessionCommand>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let status = match snapshot.status {
            SessionStatus::Closed => SessionStatus::Active,
            other => other,
        };

        let actor = Self {
            id: snapshot.session_id,
            status,
            created_at: snapshot.created_at,
            updated_at: snapshot.snapshot_at,
            last_activity: Utc::now(),
            context: snapshot.context,
            turns: snapshot.turns,
            last_seq: snapshot.last_seq,
            store,
            command_rx: rx,
            shutdown_rx,
        };

        let handle = tokio::spawn(actor.run());
        (tx, handle)
    }

    /// Main command processing loop.
    async fn run(mut self) {
        debug!(session_id = %self.id, "session actor started");

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        debug!(session_id = %self.id, "session actor received shutdown signal");
                        self.drain_commands().await;
                        break;
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            debug!(session_id = %self.id, "all handles dropped, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!(session_id = %self.id, "session actor stopped");
    }

    /// Drain and process all remaining commands in the queue.
    async fn drain_commands(&mut self) {
        while let Ok(cmd) = self.command_rx.try_recv() {
            self.handle_command(cmd).await;
        }
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::AppendTurn {
                role,
                content,
                reply,
            } => {
                let result = self.append_turn(role, content).await;
                let _ = reply.send(result);
            }
            SessionCommand::UpdateContext { course_id, reply } => {
                let result = self.update_context(course_id).await;
                let _ = reply.send(result);
            }
            SessionCommand::MarkIdle { reply } => {
                let result = self.set_status(SessionStatus::Idle).await;
                let _ = reply.send(result);
            }
            SessionCommand::Close { reply } => {
                let result = self.set_status(SessionStatus::Closed).await;
                let _ = reply.send(result);
            }
            SessionCommand::GetView { reply } => {
                let _ = reply.send(Ok(SessionView {
                    id: self.id.clone(),
                    status: self.status,
                    created_at: self.created_at,
                    updated_at: self.updated_at,
                    context: self.context.clone(),
                    turns: self.turns.clone(),
                }));
            }
            SessionCommand::GetMetadata { reply } => {
                let _ = reply.send(Ok(self.metadata()));
            }
            SessionCommand::ForceSnapshot { reply } => {
                let result = self.persist().await;
                let _ = reply.send(result);
            }
        }
    }

    fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            id: self.id.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_activity: self.last_activity,
            turn_count: self.turns.len() as u64,
            context: self.context.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Write Operations
    // ------------------------------------------------------------------------

    async fn append_turn(&mut self, role: TurnRole, content: String) -> Result<u64, ActorError> {
        if self.status == SessionStatus::Closed {
            return Err(ActorError::SessionClosed(self.id.clone()));
        }
        if content.trim().is_empty() {
            return Err(ActorError::EmptyTurn);
        }

        let now = Utc::now();
        let seq = self.last_seq + 1;
        let previous_status = self.status;
        let previous_updated = self.updated_at;
        let previous_activity = self.last_activity;

        self.turns.push(Turn {
            seq,
            role,
            content,
            at: now,
        });
        self.last_seq = seq;
        // Activity on an idle session reactivates it.
        self.status = SessionStatus::Active;
        self.updated_at = now;
        self.last_activity = now;

        if let Err(e) = self.persist().await {
            self.turns.pop();
            self.last_seq = seq - 1;
            self.status = previous_status;
            self.updated_at = previous_updated;
            self.last_activity = previous_activity;
            return Err(e);
        }

        Ok(seq)
    }

    async fn update_context(&mut self, course_id: String) -> Result<(), ActorError> {
        if self.status == SessionStatus::Closed {
            return Err(ActorError::SessionClosed(self.id.clone()));
        }

        let now = Utc::now();
        let previous_context = self.context.take();
        let previous_status = self.status;
        let previous_updated = self.updated_at;
        let previous_activity = self.last_activity;

        self.context = Some(course_id);
        self.status = SessionStatus::Active;
        self.updated_at = now;
        self.last_activity = now;

        if let Err(e) = self.persist().await {
            self.context = previous_context;
            self.status = previous_status;
            self.updated_at = previous_updated;
            self.last_activity = previous_activity;
            return Err(e);
        }

        Ok(())
    }

    async fn set_status(&mut self, status: SessionStatus) -> Result<(), ActorError> {
        let now = Utc::now();
        let previous_status = self.status;
        let previous_updated = self.updated_at;

        self.status = status;
        self.updated_at = now;

        if let Err(e) = self.persist().await {
            self.status = previous_status;
            self.updated_at = previous_updated;
            return Err(e);
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            schema_version: SessionSnapshot::SCHEMA_VERSION.to_string(),
            session_id: self.id.clone(),
            status: self.status,
            created_at: self.created_at,
            snapshot_at: Utc::now(),
            last_activity: self.last_activity,
            context: self.context.clone(),
            turns: self.turns.clone(),
            last_seq: self.last_seq,
        }
    }

    /// Write the current snapshot with a bounded retry.
    async fn persist(&self) -> Result<(), ActorError> {
        let snapshot = self.snapshot();
        let mut delay = PERSIST_RETRY_BASE;

        for attempt in 1..=PERSIST_ATTEMPTS {
            match self.store.save(&snapshot).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < PERSIST_ATTEMPTS => {
                    warn!(
                        session_id = %self.id,
                        attempt,
                        error = %e,
                        "snapshot write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    warn!(session_id = %self.id, error = %e, "snapshot write failed");
                    return Err(ActorError::PersistenceFailure(e.to_string()));
                }
            }
        }

        unreachable!("retry loop returns on final attempt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::file::FileSessionStateStore;
    use crate::store::{StorageError, StorageResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    /// Store double whose writes can be switched off.
    struct FlakySessionStore {
        inner: FileSessionStateStore,
        fail_writes: AtomicBool,
    }

    impl FlakySessionStore {
        fn new(dir: &std::path::Path) -> Self {
            Self {
                inner: FileSessionStateStore::new(dir),
                fail_writes: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl SessionStateStore for FlakySessionStore {
        async fn list(&self) -> StorageResult<Vec<String>> {
            self.inner.list().await
        }

        async fn load(&self, session_id: &str) -> StorageResult<Option<SessionSnapshot>> {
            self.inner.load(session_id).await
        }

        async fn save(&self, snapshot: &SessionSnapshot) -> StorageResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::serialization("injected write failure"));
            }
            self.inner.save(snapshot).await
        }

        async fn delete(&self, session_id: &str) -> StorageResult<()> {
            self.inner.delete(session_id).await
        }
    }

    async fn send_append(
        tx: &mpsc::Sender<SessionCommand>,
        content: &str,
    ) -> Result<u64, ActorError> {
        let (reply, rx) = oneshot::channel();
        tx.send(SessionCommand::AppendTurn {
            role: TurnRole::User,
            content: content.to_string(),
            reply,
        })
        .await
        .map_err(|_| ActorError::ActorShutdown)?;
        rx.await.map_err(|_| ActorError::ActorShutdown)?
    }

    async fn get_view(tx: &mpsc::Sender<SessionCommand>) -> SessionView {
        let (reply, rx) = oneshot::channel();
        tx.send(SessionCommand::GetView { reply }).await.unwrap();
        rx.await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn append_assigns_sequential_seqs() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileSessionStateStore::new(tmp.path()));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let (tx, _task) = SessionActor::spawn(
            ActorConfig {
                id: "session_t1".to_string(),
                store,
            },
            shutdown_rx,
        );

        assert_eq!(send_append(&tx, "first").await.unwrap(), 1);
        assert_eq!(send_append(&tx, "second").await.unwrap(), 2);

        let view = get_view(&tx).await;
        assert_eq!(view.turns.len(), 2);
        assert_eq!(view.turns[0].seq, 1);
        assert_eq!(view.turns[1].seq, 2);
    }

    #[tokio::test]
    async fn empty_turn_is_a_domain_error_with_no_mutation() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileSessionStateStore::new(tmp.path()));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let (tx, _task) = SessionActor::spawn(
            ActorConfig {
                id: "session_t2".to_string(),
                store,
            },
            shutdown_rx,
        );

        let err = send_append(&tx, "   ").await.unwrap_err();
        assert!(matches!(err, ActorError::EmptyTurn));

        let view = get_view(&tx).await;
        assert!(view.turns.is_empty());
    }

    #[tokio::test]
    async fn closed_session_rejects_writes_without_mutation() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileSessionStateStore::new(tmp.path()));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let (tx, _task) = SessionActor::spawn(
            ActorConfig {
                id: "session_t3".to_string(),
                store,
            },
            shutdown_rx,
        );

        send_append(&tx, "hello").await.unwrap();

        let (reply, rx) = oneshot::channel();
        tx.send(SessionCommand::Close { reply }).await.unwrap();
        rx.await.unwrap().unwrap();

        let err = send_append(&tx, "after close").await.unwrap_err();
        assert!(matches!(err, ActorError::SessionClosed(_)));

        let view = get_view(&tx).await;
        assert_eq!(view.status, SessionStatus::Closed);
        assert_eq!(view.turns.len(), 1);
    }

    #[tokio::test]
    async fn persistence_failure_rolls_back_the_mutation() {
        tokio::time::pause();

        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FlakySessionStore::new(tmp.path()));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let (tx, _task) = SessionActor::spawn(
            ActorConfig {
                id: "session_t4".to_string(),
                store: store.clone(),
            },
            shutdown_rx,
        );

        send_append(&tx, "kept").await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = send_append(&tx, "lost").await.unwrap_err();
        assert!(matches!(err, ActorError::PersistenceFailure(_)));

        store.fail_writes.store(false, Ordering::SeqCst);
        let view = get_view(&tx).await;
        assert_eq!(view.turns.len(), 1);
        assert_eq!(view.turns[0].content, "kept");
        assert_eq!(view.status, SessionStatus::Active);

        // Sequence numbering continues cleanly after the rollback.
        assert_eq!(send_append(&tx, "next").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rehydrated_closed_session_becomes_active() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn SessionStateStore> = Arc::new(FileSessionStateStore::new(tmp.path()));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let now = Utc::now();
        let snapshot = SessionSnapshot {
            schema_version: SessionSnapshot::SCHEMA_VERSION.to_string(),
            session_id: "session_t5".to_string(),
            status: SessionStatus::Closed,
            created_at: now,
            snapshot_at: now,
            last_activity: now,
            context: Some("cs101".to_string()),
            turns: vec![Turn {
                seq: 1,
                role: TurnRole::User,
                content: "hello".to_string(),
                at: now,
            }],
            last_seq: 1,
        };

        let (tx, _task) = SessionActor::spawn_rehydrated(snapshot, store, shutdown_rx);

        let view = get_view(&tx).await;
        assert_eq!(view.status, SessionStatus::Active);
        assert_eq!(view.turns.len(), 1);
        assert_eq!(view.context.as_deref(), Some("cs101"));

        // History continuity: next turn continues the sequence.
        assert_eq!(send_append(&tx, "again").await.unwrap(), 2);
    }
}
