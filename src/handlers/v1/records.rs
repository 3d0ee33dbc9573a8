//! Domain record HTTP handlers.
//!
//! Stateless reads and writes dispatch through the multi-store router: the
//! domain tag in the path resolves to exactly one store handle, and an
//! unrecognized tag is a 404 before any store is touched.

use axum::extract::{Path as PathExtract, State};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use axum::Json;
use serde_json::Value;
use tracing::error;

use crate::api::{PutRecordRequest, RecordResponse};
use crate::contract::routes;
use crate::gateway;
use crate::handlers::problem_details;
use crate::server::AppState;
use crate::store::{KvStore, StorageError};

fn resolve_store(
    state: &AppState,
    domain: &str,
) -> Result<std::sync::Arc<dyn KvStore>, Response> {
    state
        .bindings
        .stores
        .resolve_tag(domain)
        .map_err(|e| problem_details::not_found(e.to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/records/{domain}/{key}
pub async fn get_record(
    State(state): State<AppState>,
    PathExtract((domain, key)): PathExtract<(String, String)>,
) -> Response {
    let store = match resolve_store(&state, &domain) {
        Ok(store) => store,
        Err(response) => return response,
    };

    match store.get(&key).await {
        Ok(Some(value)) => gateway::respond(
            &state.bindings.contracts,
            &Method::GET,
            routes::RECORDS,
            StatusCode::OK,
            &RecordResponse { domain, key, value },
        ),
        Ok(None) | Err(StorageError::InvalidKey { .. }) => {
            problem_details::not_found("record not found")
        }
        Err(e) => {
            error!(%domain, %key, error = %e, "record read failed");
            problem_details::internal_error("record read failed")
        }
    }
}

/// PUT /api/v1/records/{domain}/{key}
pub async fn put_record(
    State(state): State<AppState>,
    PathExtract((domain, key)): PathExtract<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let req: PutRecordRequest = match gateway::accept(
        &state.bindings.contracts,
        &Method::PUT,
        routes::RECORDS,
        &body,
    ) {
        Ok(req) => req,
        Err(response) => return response,
    };

    let store = match resolve_store(&state, &domain) {
        Ok(store) => store,
        Err(response) => return response,
    };

    match store.put(&key, &req.value).await {
        Ok(()) => {
            gateway::respond_no_content(&state.bindings.contracts, &Method::PUT, routes::RECORDS)
        }
        Err(StorageError::InvalidKey { .. }) => problem_details::bad_request("invalid record key"),
        Err(e) => {
            error!(%domain, %key, error = %e, "record write failed");
            problem_details::internal_error("record write failed")
        }
    }
}

/// DELETE /api/v1/records/{domain}/{key}
pub async fn delete_record(
    State(state): State<AppState>,
    PathExtract((domain, key)): PathExtract<(String, String)>,
) -> Response {
    let store = match resolve_store(&state, &domain) {
        Ok(store) => store,
        Err(response) => return response,
    };

    match store.delete(&key).await {
        Ok(true) => {
            gateway::respond_no_content(&state.bindings.contracts, &Method::DELETE, routes::RECORDS)
        }
        Ok(false) | Err(StorageError::InvalidKey { .. }) => {
            problem_details::not_found("record not found")
        }
        Err(e) => {
            error!(%domain, %key, error = %e, "record delete failed");
            problem_details::internal_error("record delete failed")
        }
    }
}
