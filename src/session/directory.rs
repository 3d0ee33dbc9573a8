//! Session actor directory.
//!
//! Maps each session identifier to exactly one addressable actor instance:
//! - `locate` creates the instance lazily on first access
//! - `find` resolves existing sessions only, rehydrating evicted ones
//! - the lifecycle sweep transitions `active → idle → closed` and evicts
//! - graceful shutdown flushes every live actor

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::api::{SessionStatus, SESSION_ID_PREFIX};
use crate::store::{SessionStateStore, StorageError};

use super::actor::SessionActor;
use super::actor_types::{ActorConfig, ActorError, SessionMetadata};
use super::handle::SessionHandle;

// ============================================================================
// Constants
// ============================================================================

/// Maximum concurrent metadata fetches for `list()` and the sweep.
const LIST_CONCURRENCY: usize = 32;

// ============================================================================
// Session Directory
// ============================================================================

/// Directory of live session actors.
///
/// Thread-safe and cheap to clone. Each session identifier maps to one
/// actor instance; operations against different sessions never contend.
#[derive(Clone)]
pub struct SessionDirectory {
    /// Live handles by session ID.
    handles: Arc<DashMap<String, SessionHandle>>,
    /// Actor task handles for graceful shutdown.
    task_handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
    /// Durable session state store.
    store: Arc<dyn SessionStateStore>,
    /// Shutdown signal sender.
    shutdown_tx: Arc<watch::Sender<bool>>,
    /// Shutdown signal receiver (cloned for each actor).
    shutdown_rx: watch::Receiver<bool>,
}

/// Result of one lifecycle sweep.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Sessions transitioned `active → idle`.
    pub idled: usize,
    /// Sessions transitioned `idle → closed` and evicted.
    pub closed: usize,
}

impl SessionDirectory {
    pub fn new(store: Arc<dyn SessionStateStore>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            handles: Arc::new(DashMap::new()),
            task_handles: Arc::new(Mutex::new(Vec::new())),
            store,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    // ------------------------------------------------------------------------
    // Core API
    // ------------------------------------------------------------------------

    /// Create a new session with a generated identifier.
    ///
    /// The actor is visible in the directory immediately; the initial
    /// snapshot is confirmed durable before the handle is returned. If
    /// persistence fails the session is rolled back entirely.
    pub async fn create(&self) -> Result<SessionHandle, ActorError> {
        let id = format!("{}{}", SESSION_ID_PREFIX, Ulid::new());
        self.spawn_session(id).await
    }

    /// Locate the actor for a session identifier, creating the instance
    /// lazily on first access.
    ///
    /// Evicted sessions are rehydrated from durable storage with history
    /// continuity; unknown identifiers get a fresh instance.
    pub async fn locate(&self, id: &str) -> Result<SessionHandle, ActorError> {
        if let Some(handle) = self.find(id).await? {
            return Ok(handle);
        }
        self.spawn_session(id.to_string()).await
    }

    /// Resolve an existing session: live handle first, then rehydration
    /// from durable storage. Returns `Ok(None)` for unknown identifiers.
    pub async fn find(&self, id: &str) -> Result<Option<SessionHandle>, ActorError> {
        if let Some(handle) = self.handles.get(id).map(|r| r.clone()) {
            return Ok(Some(handle));
        }
        self.rehydrate(id).await
    }

    /// Get a live session handle without touching durable storage.
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.handles.get(id).map(|r| r.clone())
    }

    /// Check if a session is live in the directory.
    pub fn contains(&self, id: &str) -> bool {
        self.handles.contains_key(id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// List metadata for all live sessions.
    ///
    /// Fetches in parallel with bounded concurrency to avoid O(n)
    /// sequential latency with many sessions.
    pub async fn list(&self) -> Vec<SessionMetadata> {
        // Collect handles first to avoid holding DashMap references across await
        let handles: Vec<_> = self
            .handles
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        stream::iter(handles)
            .map(|handle| async move { handle.metadata().await })
            .buffer_unordered(LIST_CONCURRENCY)
            .filter_map(|result| async move { result.ok() })
            .collect()
            .await
    }

    /// Evict a session from the directory.
    ///
    /// Returns true if a session was evicted. When all clones of the handle
    /// are dropped, the actor flushes and stops; durable state remains for
    /// rehydration.
    pub fn evict(&self, id: &str) -> bool {
        self.handles.remove(id).is_some()
    }

    /// Evict a session and delete its durable state.
    pub async fn delete(&self, id: &str) -> Result<(), ActorError> {
        if let Some((_, handle)) = self.handles.remove(id) {
            let _ = handle.close().await;
        }

        self.store
            .delete(id)
            .await
            .map_err(|e| ActorError::PersistenceFailure(e.to_string()))
    }

    /// Get a reference to the session state store.
    pub fn store(&self) -> &Arc<dyn SessionStateStore> {
        &self.store
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Run one lifecycle sweep.
    ///
    /// Sessions inactive beyond `idle_after` transition `active → idle`;
    /// sessions inactive beyond `close_after` transition `idle → closed`,
    /// flush, and are evicted.
    pub async fn sweep(&self, idle_after: Duration, close_after: Duration) -> SweepStats {
        let now = Utc::now();
        let mut stats = SweepStats::default();

        // Collect handles to avoid holding DashMap refs across await
        let handles: Vec<SessionHandle> = self
            .handles
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for handle in handles {
            let Ok(metadata) = handle.metadata().await else {
                continue;
            };

            let inactive = (now - metadata.last_activity)
                .to_std()
                .unwrap_or(Duration::ZERO);

            match metadata.status {
                SessionStatus::Active if inactive >= idle_after => {
                    if let Err(e) = handle.mark_idle().await {
                        warn!(session_id = %metadata.id, error = %e, "failed to idle session");
                        continue;
                    }
                    debug!(session_id = %metadata.id, "session idled");
                    stats.idled += 1;
                }
                SessionStatus::Idle if inactive >= close_after => {
                    if let Err(e) = handle.close().await {
                        warn!(session_id = %metadata.id, error = %e, "failed to close session");
                        continue;
                    }
                    self.handles.remove(&metadata.id);
                    info!(
                        session_id = %metadata.id,
                        inactive_secs = inactive.as_secs(),
                        "session closed and evicted"
                    );
                    stats.closed += 1;
                }
                _ => {}
            }
        }

        stats
    }

    /// Spawn the background sweep task.
    ///
    /// Runs until shutdown is signalled.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        idle_after: Duration,
        close_after: Duration,
    ) -> JoinHandle<()> {
        let directory = self.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        directory.sweep(idle_after, close_after).await;
                    }
                }
            }
        })
    }

    /// Gracefully shut down all session actors.
    ///
    /// Sends the shutdown signal and waits for every actor to flush.
    pub async fn shutdown(&self) {
        info!("shutting down session directory");

        if self.shutdown_tx.send(true).is_err() {
            warn!("failed to send shutdown signal");
            return;
        }

        let task_handles = {
            let mut handles = self.task_handles.lock().await;
            std::mem::take(&mut *handles)
        };

        for task_handle in task_handles {
            if let Err(e) = task_handle.await {
                warn!(error = ?e, "actor task panicked during shutdown");
            }
        }

        info!("session directory shutdown complete");
    }

    // ------------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------------

    /// Spawn a fresh actor for `id` and confirm its initial snapshot.
    async fn spawn_session(&self, id: String) -> Result<SessionHandle, ActorError> {
        let config = ActorConfig {
            id: id.clone(),
            store: self.store.clone(),
        };

        let (tx, task_handle) = SessionActor::spawn(config, self.shutdown_rx.clone());
        let handle = SessionHandle::new(tx, id.clone());

        // Insert first - makes the session visible immediately for
        // concurrent lookups while the actor is already running.
        self.handles.insert(id.clone(), handle.clone());

        // Confirm the initial snapshot is durable. On failure, roll the
        // session back entirely.
        if let Err(e) = handle.force_snapshot().await {
            warn!(session_id = %id, error = %e, "failed to persist session creation, rolling back");
            self.handles.remove(&id);
            drop(handle);
            task_handle.abort();
            return Err(e);
        }

        self.track_task(task_handle).await;
        Ok(handle)
    }

    /// Rehydrate an evicted session from durable storage.
    async fn rehydrate(&self, id: &str) -> Result<Option<SessionHandle>, ActorError> {
        let snapshot = match self.store.load(id).await {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(None),
            // An identifier the store refuses to address is an unknown
            // session, not a storage fault.
            Err(StorageError::InvalidKey { .. }) => return Ok(None),
            Err(e) => return Err(ActorError::PersistenceFailure(e.to_string())),
        };

        let (tx, task_handle) =
            SessionActor::spawn_rehydrated(snapshot, self.store.clone(), self.shutdown_rx.clone());
        let handle = SessionHandle::new(tx, id.to_string());

        // A concurrent rehydration may have won the race; keep the first
        // instance so the session stays single-writer.
        let resolved = match self.handles.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                drop(handle);
                existing.get().clone()
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(handle.clone());
                self.track_task(task_handle).await;
                info!(session_id = %id, "session rehydrated");
                handle
            }
        };

        Ok(Some(resolved))
    }

    async fn track_task(&self, task_handle: JoinHandle<()>) {
        let mut guard = self.task_handles.lock().await;
        guard.retain(|h| !h.is_finished());
        guard.push(task_handle);
    }
}
