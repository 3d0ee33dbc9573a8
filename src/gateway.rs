//! Gateway composition helpers.
//!
//! Every handler runs the same sequence: validate the request against the
//! route's contract, do the work, validate the response on the way out.
//! These helpers keep that flow in one place and independent of any
//! particular handler, so the contract path is unit-testable without a
//! live server.
//!
//! An outbound contract violation is a server defect: it is logged with
//! full detail and the client receives a generic 500, never the mismatch
//! itself.

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::contract::{ContractRegistry, RequestError};
use crate::handlers::problem_details;

/// Validate an inbound body against the route's contract and decode it.
///
/// Returns the ready-to-use typed request, or the complete error response
/// to short-circuit with (field-level 400 detail for schema violations).
pub fn accept<T: DeserializeOwned>(
    contracts: &ContractRegistry,
    method: &Method,
    route: &str,
    body: &Value,
) -> Result<T, Response> {
    let normalized = match contracts.validate_request(method, route, body) {
        Ok(value) => value,
        Err(RequestError::Invalid(validation)) => {
            return Err(problem_details::validation_failed(&validation.violations));
        }
        Err(err @ RequestError::UnknownRoute { .. }) => {
            error!(error = %err, "handler validated against an unregistered route");
            return Err(problem_details::internal_error("internal contract error"));
        }
    };

    serde_json::from_value(normalized).map_err(|e| {
        // Schema and type drifted apart - a server defect, not client input.
        error!(route, error = %e, "validated request failed typed decode");
        problem_details::internal_error("internal contract error")
    })
}

/// Serialize a payload, validate it against the route's declared schema for
/// `status`, and build the response.
pub fn respond<T: Serialize>(
    contracts: &ContractRegistry,
    method: &Method,
    route: &str,
    status: StatusCode,
    payload: &T,
) -> Response {
    let value = match serde_json::to_value(payload) {
        Ok(v) => v,
        Err(e) => {
            error!(route, error = %e, "response payload failed serialization");
            return problem_details::internal_error("internal error");
        }
    };

    match contracts.validate_response(method, route, status.as_u16(), &value) {
        Ok(()) => (status, Json(value)).into_response(),
        Err(e) => {
            error!(%method, route, error = %e, "response contract violation");
            problem_details::internal_error("internal contract violation")
        }
    }
}

/// Validate and build an empty 204 response.
pub fn respond_no_content(contracts: &ContractRegistry, method: &Method, route: &str) -> Response {
    match contracts.validate_response(method, route, 204, &Value::Null) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!(%method, route, error = %e, "response contract violation");
            problem_details::internal_error("internal contract violation")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ContractRegistry, RouteContract};
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Debug, Deserialize)]
    struct EchoRequest {
        message: String,
    }

    #[derive(Serialize)]
    struct EchoResponse {
        message: String,
    }

    fn echo_registry() -> ContractRegistry {
        let mut registry = ContractRegistry::new();
        registry
            .register(RouteContract {
                method: Method::POST,
                path: "/echo".to_string(),
                description: "echo".to_string(),
                requires_auth: false,
                request_schema: Some(json!({
                    "type": "object",
                    "required": ["message"],
                    "properties": {"message": {"type": "string"}}
                })),
                response_schemas: BTreeMap::from([(
                    200,
                    json!({
                        "type": "object",
                        "required": ["message"],
                        "properties": {"message": {"type": "string"}}
                    }),
                )]),
            })
            .unwrap();
        registry
    }

    #[test]
    fn accept_decodes_valid_input() {
        let registry = echo_registry();

        let req: EchoRequest = accept(
            &registry,
            &Method::POST,
            "/echo",
            &json!({"message": "hi"}),
        )
        .unwrap();
        assert_eq!(req.message, "hi");
    }

    #[test]
    fn accept_rejects_invalid_input_with_400() {
        let registry = echo_registry();

        let response = accept::<EchoRequest>(&registry, &Method::POST, "/echo", &json!({}))
            .err()
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn respond_passes_conforming_payload() {
        let registry = echo_registry();

        let response = respond(
            &registry,
            &Method::POST,
            "/echo",
            StatusCode::OK,
            &EchoResponse {
                message: "hi".to_string(),
            },
        );
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn respond_downgrades_violation_to_generic_500() {
        let registry = echo_registry();

        // Undeclared status: the violation must not leak to the client.
        let response = respond(
            &registry,
            &Method::POST,
            "/echo",
            StatusCode::CREATED,
            &EchoResponse {
                message: "hi".to_string(),
            },
        );
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
