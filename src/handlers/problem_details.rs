//! Uniform error response bodies.
//!
//! Every non-2xx response the gateway produces comes from these builders,
//! so the error shape is the one the contracts declare: `{status, detail}`
//! plus field-level `violations` on validation failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::contract::FieldViolation;

pub fn response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "status": status.as_u16(),
            "detail": detail.into(),
        })),
    )
        .into_response()
}

pub fn bad_request(detail: impl Into<String>) -> Response {
    response(StatusCode::BAD_REQUEST, detail)
}

pub fn not_found(detail: impl Into<String>) -> Response {
    response(StatusCode::NOT_FOUND, detail)
}

pub fn internal_error(detail: impl Into<String>) -> Response {
    response(StatusCode::INTERNAL_SERVER_ERROR, detail)
}

/// 400 with the full list of field-level violations.
pub fn validation_failed(violations: &[FieldViolation]) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "status": 400,
            "detail": "request failed contract validation",
            "violations": violations,
        })),
    )
        .into_response()
}
