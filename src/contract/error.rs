//! Error taxonomy for the contract registry.
//!
//! `ValidationError` is client-facing (400 with field-level detail).
//! `ContractViolation` is a server defect (500, logged, never exposed
//! verbatim). Registration errors are startup-fatal.

use serde::Serialize;
use thiserror::Error;

/// A single field-level schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// JSON pointer to the offending field (`/content`, `/turns/0/role`).
    pub path: String,
    /// What the contract expected at that path.
    pub expected: String,
    /// What was actually received.
    pub received: String,
}

/// Client input does not match the route's declared request schema.
#[derive(Debug, Error)]
#[error("request failed contract validation with {} violation(s)", violations.len())]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

/// The server produced a response violating its own declared contract.
#[derive(Debug, Error)]
#[error("{method} {path} produced a response violating its declared contract for status {status}")]
pub struct ContractViolation {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub violations: Vec<FieldViolation>,
}

/// Errors raised while building the registry. Both are programmer errors
/// and fatal at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate route registration: {method} {path}")]
    DuplicateRoute { method: String, path: String },

    #[error("invalid schema for {method} {path}: {message}")]
    InvalidSchema {
        method: String,
        path: String,
        message: String,
    },
}

/// Errors from validating an inbound request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The handler asked for a route that was never registered.
    #[error("no contract registered for {method} {path}")]
    UnknownRoute { method: String, path: String },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Errors from validating an outbound response.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// The handler asked for a route that was never registered.
    #[error("no contract registered for {method} {path}")]
    UnknownRoute { method: String, path: String },

    #[error(transparent)]
    Violation(#[from] ContractViolation),
}
