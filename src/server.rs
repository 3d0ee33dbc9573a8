//! Server composition: the binding set, the application state, and the
//! route table.
//!
//! The binding set is constructed once per process from configuration and
//! passed to every component; no component does ambient lookup.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::auth::{self, Authenticator};
use crate::config::{
    self, Config, DEFAULT_COURSES_DIR, DEFAULT_DATA_DIR, DEFAULT_KEYS_DIR, DEFAULT_PRIMARY_DIR,
    DEFAULT_SESSIONS_DIR, DEFAULT_TRANSFERS_DIR,
};
use crate::contract::{routes, ContractRegistry};
use crate::handlers;
use crate::session::SessionDirectory;
use crate::store::file::{FileKvStore, FileSessionStateStore};
use crate::store::StoreRouter;
use crate::vault::{CredentialVault, FileKeyRecordStore, Kek};

// ============================================================================
// Bindings
// ============================================================================

/// Process-wide, read-only handles: the contract registry, the three data
/// domain stores, the session-actor directory, and the credential vault.
///
/// Initialized once per process lifetime; never mutated; every request
/// receives the same handle set. Cheap to clone.
#[derive(Clone)]
pub struct Bindings {
    pub contracts: Arc<ContractRegistry>,
    pub stores: StoreRouter,
    pub sessions: SessionDirectory,
    pub vault: Arc<CredentialVault>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub bindings: Bindings,
    pub auth: Arc<Authenticator>,
}

// ============================================================================
// Router Construction
// ============================================================================

pub fn build_app(state: AppState, request_timeout_seconds: u64, max_connections: usize) -> Router {
    let api_v1 = Router::new()
        .route(
            "/sessions",
            post(handlers::v1::create_session).get(handlers::v1::list_sessions),
        )
        .route(
            "/sessions/{session_id}",
            get(handlers::v1::get_session).delete(handlers::v1::delete_session),
        )
        .route(
            "/sessions/{session_id}/turns",
            post(handlers::v1::append_turn).get(handlers::v1::list_turns),
        )
        .route(
            "/sessions/{session_id}/context",
            put(handlers::v1::update_context),
        )
        .route(
            "/sessions/{session_id}/close",
            post(handlers::v1::close_session),
        )
        .route(
            "/keys",
            post(handlers::v1::store_key).get(handlers::v1::list_keys),
        )
        .route("/keys/{key_id}", delete(handlers::v1::revoke_key))
        .route(
            "/records/{domain}/{key}",
            get(handlers::v1::get_record)
                .put(handlers::v1::put_record)
                .delete(handlers::v1::delete_record),
        )
        .route("/describe", get(handlers::v1::describe_api))
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
        .layer(axum::middleware::from_fn_with_state(
            state,
            auth::require_identity,
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .layer(ConcurrencyLimitLayer::new(max_connections));

    Router::new().nest("/api/v1", api_v1)
}

// ============================================================================
// Bootstrap
// ============================================================================

/// Build the binding set from configuration.
///
/// Fails fast on a broken contract table or missing/invalid KEK material -
/// the server refuses to boot rather than run with a partial binding set.
pub fn build_state(config: &Config, config_path: &Path) -> anyhow::Result<AppState> {
    let registry = routes::v1_registry().context("failed to build contract registry")?;

    let data_dir = resolve_dir(
        config_path,
        config.data_dir.as_deref(),
        Path::new(DEFAULT_DATA_DIR),
    );

    let stores = StoreRouter::new(
        Arc::new(FileKvStore::new(store_dir(
            config_path,
            config.stores.primary_dir.as_deref(),
            &data_dir,
            DEFAULT_PRIMARY_DIR,
        ))),
        Arc::new(FileKvStore::new(store_dir(
            config_path,
            config.stores.courses_dir.as_deref(),
            &data_dir,
            DEFAULT_COURSES_DIR,
        ))),
        Arc::new(FileKvStore::new(store_dir(
            config_path,
            config.stores.transfers_dir.as_deref(),
            &data_dir,
            DEFAULT_TRANSFERS_DIR,
        ))),
    );

    let sessions_dir = store_dir(
        config_path,
        config.stores.sessions_dir.as_deref(),
        &data_dir,
        DEFAULT_SESSIONS_DIR,
    );
    let sessions = SessionDirectory::new(Arc::new(FileSessionStateStore::new(sessions_dir)));

    let kek_material = config
        .vault
        .kek
        .as_deref()
        .context("vault.kek must be configured (reference an environment variable)")?;
    let kek = Kek::from_encoded(kek_material).context("vault.kek is not valid key material")?;

    let keys_dir = store_dir(
        config_path,
        config.vault.keys_dir.as_deref(),
        &data_dir,
        DEFAULT_KEYS_DIR,
    );
    let vault = Arc::new(CredentialVault::new(
        kek,
        Arc::new(FileKeyRecordStore::new(keys_dir)),
    ));

    Ok(AppState {
        bindings: Bindings {
            contracts: Arc::new(registry),
            stores,
            sessions,
            vault,
        },
        auth: Arc::new(Authenticator::new(&config.server.api_tokens)),
    })
}

/// Run the gateway until shutdown.
pub async fn run(
    config_path: &str,
    host_override: Option<IpAddr>,
    port_override: Option<u16>,
) -> anyhow::Result<()> {
    let config = Config::load(config_path).await?;
    let state = build_state(&config, Path::new(config_path))?;

    let sweeper = state.bindings.sessions.spawn_sweeper(
        Duration::from_secs(config.session.sweep_interval_seconds),
        Duration::from_secs(config.session.idle_after_seconds),
        Duration::from_secs(config.session.close_after_seconds),
    );

    let app = build_app(
        state.clone(),
        config.server.request_timeout_seconds,
        config.server.max_connections,
    );

    let host = host_override
        .map(|h| h.to_string())
        .unwrap_or_else(|| config.server.host.clone());
    let port = port_override.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        %addr,
        contracts = state.bindings.contracts.len(),
        "tutor-nexus gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Flush every live session actor before exit.
    state.bindings.sessions.shutdown().await;
    sweeper.abort();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install shutdown handler");
    }
}

fn resolve_dir(config_path: &Path, configured: Option<&Path>, default: &Path) -> PathBuf {
    config::resolve_path(config_path, configured.unwrap_or(default))
}

fn store_dir(
    config_path: &Path,
    configured: Option<&Path>,
    data_dir: &Path,
    default_subdir: &str,
) -> PathBuf {
    match configured {
        Some(dir) => config::resolve_path(config_path, dir),
        None => data_dir.join(default_subdir),
    }
}
