//! Common test utilities.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;

use tutor_nexus::auth::Authenticator;
use tutor_nexus::config::ApiTokenConfig;
use tutor_nexus::contract::routes;
use tutor_nexus::server::{self, AppState, Bindings};
use tutor_nexus::session::SessionDirectory;
use tutor_nexus::store::file::{FileKvStore, FileSessionStateStore};
use tutor_nexus::store::StoreRouter;
use tutor_nexus::vault::{CredentialVault, FileKeyRecordStore, Kek};

/// Create a test `AppState` with the full v1 contract table and file-backed
/// stores under a temp directory.
pub fn test_app_state_with_tokens(tokens: &[ApiTokenConfig]) -> AppState {
    let tmp = TempDir::new().unwrap();
    // Leak the TempDir so it doesn't get cleaned up during the test.
    let tmp = Box::leak(Box::new(tmp));

    let registry = routes::v1_registry().unwrap();

    let stores = StoreRouter::new(
        Arc::new(FileKvStore::new(tmp.path().join("primary"))),
        Arc::new(FileKvStore::new(tmp.path().join("courses"))),
        Arc::new(FileKvStore::new(tmp.path().join("transfers"))),
    );

    let sessions = SessionDirectory::new(Arc::new(FileSessionStateStore::new(
        tmp.path().join("sessions"),
    )));

    let vault = Arc::new(CredentialVault::new(
        Kek::generate(),
        Arc::new(FileKeyRecordStore::new(tmp.path().join("keys"))),
    ));

    AppState {
        bindings: Bindings {
            contracts: Arc::new(registry),
            stores,
            sessions,
            vault,
        },
        auth: Arc::new(Authenticator::new(tokens)),
    }
}

/// Create a test `AppState` in open mode (no tokens, `local` user).
pub fn test_app_state() -> AppState {
    test_app_state_with_tokens(&[])
}

/// Create a test app in open mode.
pub fn test_app() -> Router {
    server::build_app(test_app_state(), 30, 64)
}

/// Create a test app sharing the given state.
pub fn app_with_state(state: AppState) -> Router {
    server::build_app(state, 30, 64)
}
