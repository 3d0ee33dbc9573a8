//! BYOK credential HTTP handlers.
//!
//! Key records are scoped to the authenticated user. Responses carry record
//! metadata only; decrypted key material never appears on this surface.

use axum::extract::{Path as PathExtract, State};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use axum::{Extension, Json};
use serde_json::Value;
use tracing::error;

use crate::api::{KeySummary, ListKeysResponse, StoreKeyRequest, StoreKeyResponse};
use crate::auth::UserIdentity;
use crate::contract::routes;
use crate::gateway;
use crate::handlers::problem_details;
use crate::server::AppState;
use crate::vault::VaultError;

/// Map a vault error to its HTTP response.
///
/// Crypto failures are logged with record identity only and surface as a
/// generic 500 - no key material, no mismatch detail.
fn vault_error_response(err: &VaultError) -> Response {
    match err {
        VaultError::NotFound { record_id } => {
            problem_details::not_found(format!("key record not found: {record_id}"))
        }
        other => {
            error!(error = %other, "credential vault operation failed");
            problem_details::internal_error("credential operation failed")
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/keys
pub async fn store_key(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(body): Json<Value>,
) -> Response {
    let req: StoreKeyRequest =
        match gateway::accept(&state.bindings.contracts, &Method::POST, routes::KEYS, &body) {
            Ok(req) => req,
            Err(response) => return response,
        };

    let record = match state
        .bindings
        .vault
        .store(&identity.user_id, &req.provider, &req.api_key)
        .await
    {
        Ok(record) => record,
        Err(e) => return vault_error_response(&e),
    };

    gateway::respond(
        &state.bindings.contracts,
        &Method::POST,
        routes::KEYS,
        StatusCode::CREATED,
        &StoreKeyResponse {
            key_id: record.id,
            provider: record.provider,
            created_at: record.created_at.to_rfc3339(),
        },
    )
}

/// GET /api/v1/keys
pub async fn list_keys(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Response {
    let records = match state.bindings.vault.list(&identity.user_id).await {
        Ok(records) => records,
        Err(e) => return vault_error_response(&e),
    };

    let keys = records
        .into_iter()
        .map(|r| KeySummary {
            key_id: r.id,
            provider: r.provider,
            created_at: r.created_at.to_rfc3339(),
            last_used_at: r.last_used_at.map(|t| t.to_rfc3339()),
        })
        .collect();

    gateway::respond(
        &state.bindings.contracts,
        &Method::GET,
        routes::KEYS,
        StatusCode::OK,
        &ListKeysResponse { keys },
    )
}

/// DELETE /api/v1/keys/{key_id}
pub async fn revoke_key(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    PathExtract(key_id): PathExtract<String>,
) -> Response {
    if let Err(e) = state.bindings.vault.revoke(&identity.user_id, &key_id).await {
        return vault_error_response(&e);
    }

    gateway::respond_no_content(&state.bindings.contracts, &Method::DELETE, routes::KEY)
}
