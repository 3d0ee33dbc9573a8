//! Session HTTP handlers.
//!
//! Session-scoped operations dispatch through the session directory: the
//! owning actor serializes every mutation, so these handlers never touch
//! session state directly.

use axum::extract::{Path as PathExtract, State};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use crate::api::{
    AppendTurnRequest, AppendTurnResponse, CloseSessionResponse, CreateSessionRequest,
    CreateSessionResponse, GetSessionResponse, ListSessionsResponse, ListTurnsResponse,
    SessionStatus, SessionSummary, UpdateContextRequest, UpdateContextResponse,
};
use crate::contract::routes;
use crate::gateway;
use crate::handlers::problem_details;
use crate::server::AppState;
use crate::session::{ActorError, SessionHandle};
use crate::store::StorageError;

/// Map an actor error to its HTTP response.
fn actor_error_response(err: &ActorError) -> Response {
    match err {
        ActorError::SessionClosed(_) => problem_details::bad_request("session is closed"),
        ActorError::EmptyTurn => problem_details::bad_request("turn content is empty"),
        ActorError::NotFound(id) => problem_details::not_found(format!("session not found: {id}")),
        ActorError::ActorShutdown | ActorError::PersistenceFailure(_) => {
            error!(error = %err, "session operation failed");
            problem_details::internal_error("session operation failed")
        }
    }
}

/// Resolve an existing session or build the 404 response.
async fn resolve_session(state: &AppState, session_id: &str) -> Result<SessionHandle, Response> {
    match state.bindings.sessions.find(session_id).await {
        Ok(Some(handle)) => Ok(handle),
        Ok(None) => Err(problem_details::not_found("session not found")),
        Err(e) => {
            error!(%session_id, error = %e, "failed to resolve session");
            Err(problem_details::internal_error("failed to resolve session"))
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/sessions
pub async fn create_session(State(state): State<AppState>, body: Option<Json<Value>>) -> Response {
    let body = body.map(|Json(v)| v).unwrap_or_else(|| json!({}));
    let _req: CreateSessionRequest = match gateway::accept(
        &state.bindings.contracts,
        &Method::POST,
        routes::SESSIONS,
        &body,
    ) {
        Ok(req) => req,
        Err(response) => return response,
    };

    let handle = match state.bindings.sessions.create().await {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "failed to create session");
            return problem_details::internal_error("failed to create session");
        }
    };

    let metadata = match handle.metadata().await {
        Ok(m) => m,
        Err(e) => return actor_error_response(&e),
    };

    gateway::respond(
        &state.bindings.contracts,
        &Method::POST,
        routes::SESSIONS,
        StatusCode::CREATED,
        &CreateSessionResponse {
            session_id: metadata.id,
            status: metadata.status,
            created_at: metadata.created_at.to_rfc3339(),
        },
    )
}

/// GET /api/v1/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Response {
    let sessions: Vec<SessionSummary> = state
        .bindings
        .sessions
        .list()
        .await
        .into_iter()
        .map(|m| SessionSummary {
            session_id: m.id,
            status: m.status,
            turn_count: m.turn_count,
            created_at: m.created_at.to_rfc3339(),
        })
        .collect();

    gateway::respond(
        &state.bindings.contracts,
        &Method::GET,
        routes::SESSIONS,
        StatusCode::OK,
        &ListSessionsResponse { sessions },
    )
}

/// GET /api/v1/sessions/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    PathExtract(session_id): PathExtract<String>,
) -> Response {
    let handle = match resolve_session(&state, &session_id).await {
        Ok(h) => h,
        Err(response) => return response,
    };

    let view = match handle.view().await {
        Ok(v) => v,
        Err(e) => return actor_error_response(&e),
    };

    gateway::respond(
        &state.bindings.contracts,
        &Method::GET,
        routes::SESSION,
        StatusCode::OK,
        &GetSessionResponse {
            session_id: view.id,
            status: view.status,
            context: view.context,
            turn_count: view.turns.len() as u64,
            created_at: view.created_at.to_rfc3339(),
            updated_at: view.updated_at.to_rfc3339(),
        },
    )
}

/// POST /api/v1/sessions/{session_id}/turns
pub async fn append_turn(
    State(state): State<AppState>,
    PathExtract(session_id): PathExtract<String>,
    Json(body): Json<Value>,
) -> Response {
    let req: AppendTurnRequest = match gateway::accept(
        &state.bindings.contracts,
        &Method::POST,
        routes::SESSION_TURNS,
        &body,
    ) {
        Ok(req) => req,
        Err(response) => return response,
    };

    let handle = match resolve_session(&state, &session_id).await {
        Ok(h) => h,
        Err(response) => return response,
    };

    let seq = match handle.append_turn(req.role, req.content).await {
        Ok(seq) => seq,
        Err(e) => return actor_error_response(&e),
    };

    let status = match handle.metadata().await {
        Ok(m) => m.status,
        Err(e) => return actor_error_response(&e),
    };

    gateway::respond(
        &state.bindings.contracts,
        &Method::POST,
        routes::SESSION_TURNS,
        StatusCode::OK,
        &AppendTurnResponse { seq, status },
    )
}

/// GET /api/v1/sessions/{session_id}/turns
pub async fn list_turns(
    State(state): State<AppState>,
    PathExtract(session_id): PathExtract<String>,
) -> Response {
    let handle = match resolve_session(&state, &session_id).await {
        Ok(h) => h,
        Err(response) => return response,
    };

    let view = match handle.view().await {
        Ok(v) => v,
        Err(e) => return actor_error_response(&e),
    };

    gateway::respond(
        &state.bindings.contracts,
        &Method::GET,
        routes::SESSION_TURNS,
        StatusCode::OK,
        &ListTurnsResponse { turns: view.turns },
    )
}

/// PUT /api/v1/sessions/{session_id}/context
pub async fn update_context(
    State(state): State<AppState>,
    PathExtract(session_id): PathExtract<String>,
    Json(body): Json<Value>,
) -> Response {
    let req: UpdateContextRequest = match gateway::accept(
        &state.bindings.contracts,
        &Method::PUT,
        routes::SESSION_CONTEXT,
        &body,
    ) {
        Ok(req) => req,
        Err(response) => return response,
    };

    let handle = match resolve_session(&state, &session_id).await {
        Ok(h) => h,
        Err(response) => return response,
    };

    if let Err(e) = handle.update_context(req.course_id.clone()).await {
        return actor_error_response(&e);
    }

    let status = match handle.metadata().await {
        Ok(m) => m.status,
        Err(e) => return actor_error_response(&e),
    };

    gateway::respond(
        &state.bindings.contracts,
        &Method::PUT,
        routes::SESSION_CONTEXT,
        StatusCode::OK,
        &UpdateContextResponse {
            context: req.course_id,
            status,
        },
    )
}

/// POST /api/v1/sessions/{session_id}/close
pub async fn close_session(
    State(state): State<AppState>,
    PathExtract(session_id): PathExtract<String>,
) -> Response {
    let handle = match resolve_session(&state, &session_id).await {
        Ok(h) => h,
        Err(response) => return response,
    };

    if let Err(e) = handle.close().await {
        return actor_error_response(&e);
    }

    // State is durable; the in-memory instance can go. A later locate
    // rehydrates the session back to active.
    state.bindings.sessions.evict(&session_id);

    gateway::respond(
        &state.bindings.contracts,
        &Method::POST,
        routes::SESSION_CLOSE,
        StatusCode::OK,
        &CloseSessionResponse {
            session_id,
            status: SessionStatus::Closed,
        },
    )
}

/// DELETE /api/v1/sessions/{session_id}
pub async fn delete_session(
    State(state): State<AppState>,
    PathExtract(session_id): PathExtract<String>,
) -> Response {
    // Existence check without spinning up an actor just to tear it down.
    let exists = state.bindings.sessions.contains(&session_id)
        || match state.bindings.sessions.store().load(&session_id).await {
            Ok(found) => found.is_some(),
            Err(StorageError::InvalidKey { .. }) => false,
            Err(e) => {
                error!(%session_id, error = %e, "failed to check session state");
                return problem_details::internal_error("failed to delete session");
            }
        };

    if !exists {
        return problem_details::not_found("session not found");
    }

    if let Err(e) = state.bindings.sessions.delete(&session_id).await {
        error!(%session_id, error = %e, "failed to delete session");
        return problem_details::internal_error("failed to delete session");
    }

    gateway::respond_no_content(&state.bindings.contracts, &Method::DELETE, routes::SESSION)
}
