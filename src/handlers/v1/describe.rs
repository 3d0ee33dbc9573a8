//! Contract description handler.
//!
//! Exposes `ContractRegistry::describe()` - the sole surface consumed by
//! external API-documentation tooling.

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::Response;

use crate::contract::routes;
use crate::gateway;
use crate::server::AppState;

/// GET /api/v1/describe
pub async fn describe_api(State(state): State<AppState>) -> Response {
    let description = state.bindings.contracts.describe();

    gateway::respond(
        &state.bindings.contracts,
        &Method::GET,
        routes::DESCRIBE,
        StatusCode::OK,
        &description,
    )
}
