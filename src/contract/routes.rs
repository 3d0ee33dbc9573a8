//! The v1 route table.
//!
//! Every route the gateway mounts is declared here, schema first. The
//! templates double as the handler-side lookup keys, so a route cannot be
//! served without a contract.

use std::collections::BTreeMap;

use axum::http::Method;
use serde_json::{json, Value};

use super::error::RegistryError;
use super::registry::{ContractRegistry, RouteContract};

// ============================================================================
// Route Templates
// ============================================================================

pub const SESSIONS: &str = "/api/v1/sessions";
pub const SESSION: &str = "/api/v1/sessions/{session_id}";
pub const SESSION_TURNS: &str = "/api/v1/sessions/{session_id}/turns";
pub const SESSION_CONTEXT: &str = "/api/v1/sessions/{session_id}/context";
pub const SESSION_CLOSE: &str = "/api/v1/sessions/{session_id}/close";
pub const KEYS: &str = "/api/v1/keys";
pub const KEY: &str = "/api/v1/keys/{key_id}";
pub const RECORDS: &str = "/api/v1/records/{domain}/{key}";
pub const DESCRIBE: &str = "/api/v1/describe";

// ============================================================================
// Registry Construction
// ============================================================================

/// Build the contract registry for the whole v1 surface.
///
/// A registration failure here (duplicate route, bad schema) is a startup
/// fatal - the server refuses to boot on a broken contract table.
pub fn v1_registry() -> Result<ContractRegistry, RegistryError> {
    let mut registry = ContractRegistry::new();

    // ---- Sessions -----------------------------------------------------------

    registry.register(RouteContract {
        method: Method::POST,
        path: SESSIONS.to_string(),
        description: "Create a tutoring session".to_string(),
        requires_auth: true,
        request_schema: Some(json!({
            "type": "object",
            "additionalProperties": false
        })),
        response_schemas: BTreeMap::from([
            (
                201,
                json!({
                    "type": "object",
                    "required": ["session_id", "status", "created_at"],
                    "properties": {
                        "session_id": {"type": "string", "pattern": "^session_"},
                        "status": session_status_schema(),
                        "created_at": {"type": "string"}
                    }
                }),
            ),
            (500, problem_schema()),
        ]),
    })?;

    registry.register(RouteContract {
        method: Method::GET,
        path: SESSIONS.to_string(),
        description: "List sessions".to_string(),
        requires_auth: true,
        request_schema: None,
        response_schemas: BTreeMap::from([(
            200,
            json!({
                "type": "object",
                "required": ["sessions"],
                "properties": {
                    "sessions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["session_id", "status", "turn_count", "created_at"],
                            "properties": {
                                "session_id": {"type": "string"},
                                "status": session_status_schema(),
                                "turn_count": {"type": "integer", "minimum": 0},
                                "created_at": {"type": "string"}
                            }
                        }
                    }
                }
            }),
        )]),
    })?;

    registry.register(RouteContract {
        method: Method::GET,
        path: SESSION.to_string(),
        description: "Get one session's state view".to_string(),
        requires_auth: true,
        request_schema: None,
        response_schemas: BTreeMap::from([
            (
                200,
                json!({
                    "type": "object",
                    "required": ["session_id", "status", "turn_count", "created_at", "updated_at"],
                    "properties": {
                        "session_id": {"type": "string"},
                        "status": session_status_schema(),
                        "context": {"type": "string"},
                        "turn_count": {"type": "integer", "minimum": 0},
                        "created_at": {"type": "string"},
                        "updated_at": {"type": "string"}
                    }
                }),
            ),
            (404, problem_schema()),
        ]),
    })?;

    registry.register(RouteContract {
        method: Method::POST,
        path: SESSION_TURNS.to_string(),
        description: "Append a conversation turn to a session".to_string(),
        requires_auth: true,
        request_schema: Some(json!({
            "type": "object",
            "required": ["role", "content"],
            "additionalProperties": false,
            "properties": {
                "role": {"type": "string", "enum": ["user", "tutor"]},
                "content": {"type": "string", "minLength": 1, "maxLength": 32768}
            }
        })),
        response_schemas: BTreeMap::from([
            (
                200,
                json!({
                    "type": "object",
                    "required": ["seq", "status"],
                    "properties": {
                        "seq": {"type": "integer", "minimum": 1},
                        "status": session_status_schema()
                    }
                }),
            ),
            (400, problem_schema()),
            (404, problem_schema()),
        ]),
    })?;

    registry.register(RouteContract {
        method: Method::GET,
        path: SESSION_TURNS.to_string(),
        description: "List a session's conversation turns".to_string(),
        requires_auth: true,
        request_schema: None,
        response_schemas: BTreeMap::from([
            (
                200,
                json!({
                    "type": "object",
                    "required": ["turns"],
                    "properties": {
                        "turns": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["seq", "role", "content", "at"],
                                "properties": {
                                    "seq": {"type": "integer", "minimum": 1},
                                    "role": {"type": "string", "enum": ["user", "tutor"]},
                                    "content": {"type": "string"},
                                    "at": {"type": "string"}
                                }
                            }
                        }
                    }
                }),
            ),
            (404, problem_schema()),
        ]),
    })?;

    registry.register(RouteContract {
        method: Method::PUT,
        path: SESSION_CONTEXT.to_string(),
        description: "Set a session's course context".to_string(),
        requires_auth: true,
        request_schema: Some(json!({
            "type": "object",
            "required": ["course_id"],
            "additionalProperties": false,
            "properties": {
                "course_id": {"type": "string", "minLength": 1, "maxLength": 256}
            }
        })),
        response_schemas: BTreeMap::from([
            (
                200,
                json!({
                    "type": "object",
                    "required": ["context", "status"],
                    "properties": {
                        "context": {"type": "string"},
                        "status": session_status_schema()
                    }
                }),
            ),
            (400, problem_schema()),
            (404, problem_schema()),
        ]),
    })?;

    registry.register(RouteContract {
        method: Method::POST,
        path: SESSION_CLOSE.to_string(),
        description: "Close a session and flush its state".to_string(),
        requires_auth: true,
        request_schema: None,
        response_schemas: BTreeMap::from([
            (
                200,
                json!({
                    "type": "object",
                    "required": ["session_id", "status"],
                    "properties": {
                        "session_id": {"type": "string"},
                        "status": {"type": "string", "enum": ["closed"]}
                    }
                }),
            ),
            (404, problem_schema()),
        ]),
    })?;

    registry.register(RouteContract {
        method: Method::DELETE,
        path: SESSION.to_string(),
        description: "Delete a session and its durable state".to_string(),
        requires_auth: true,
        request_schema: None,
        response_schemas: BTreeMap::from([(204, json!({"type": "null"})), (404, problem_schema())]),
    })?;

    // ---- BYOK keys ----------------------------------------------------------

    registry.register(RouteContract {
        method: Method::POST,
        path: KEYS.to_string(),
        description: "Store a bring-your-own-key provider credential".to_string(),
        requires_auth: true,
        request_schema: Some(json!({
            "type": "object",
            "required": ["provider", "api_key"],
            "additionalProperties": false,
            "properties": {
                "provider": {"type": "string", "minLength": 1, "maxLength": 64},
                "api_key": {"type": "string", "minLength": 1, "maxLength": 4096}
            }
        })),
        response_schemas: BTreeMap::from([
            (
                201,
                json!({
                    "type": "object",
                    "required": ["key_id", "provider", "created_at"],
                    "properties": {
                        "key_id": {"type": "string", "pattern": "^key_"},
                        "provider": {"type": "string"},
                        "created_at": {"type": "string"}
                    },
                    "additionalProperties": false
                }),
            ),
            (400, problem_schema()),
            (500, problem_schema()),
        ]),
    })?;

    registry.register(RouteContract {
        method: Method::GET,
        path: KEYS.to_string(),
        description: "List stored key records (metadata only)".to_string(),
        requires_auth: true,
        request_schema: None,
        response_schemas: BTreeMap::from([(
            200,
            json!({
                "type": "object",
                "required": ["keys"],
                "properties": {
                    "keys": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["key_id", "provider", "created_at"],
                            "properties": {
                                "key_id": {"type": "string"},
                                "provider": {"type": "string"},
                                "created_at": {"type": "string"},
                                "last_used_at": {"type": "string"}
                            },
                            "additionalProperties": false
                        }
                    }
                }
            }),
        )]),
    })?;

    registry.register(RouteContract {
        method: Method::DELETE,
        path: KEY.to_string(),
        description: "Revoke a stored key record".to_string(),
        requires_auth: true,
        request_schema: None,
        response_schemas: BTreeMap::from([(204, json!({"type": "null"})), (404, problem_schema())]),
    })?;

    // ---- Domain records -----------------------------------------------------

    registry.register(RouteContract {
        method: Method::GET,
        path: RECORDS.to_string(),
        description: "Read a record from one data domain".to_string(),
        requires_auth: true,
        request_schema: None,
        response_schemas: BTreeMap::from([
            (
                200,
                json!({
                    "type": "object",
                    "required": ["domain", "key", "value"],
                    "properties": {
                        "domain": {"type": "string", "enum": ["primary", "courses", "transfers"]},
                        "key": {"type": "string"},
                        "value": {}
                    }
                }),
            ),
            (404, problem_schema()),
        ]),
    })?;

    registry.register(RouteContract {
        method: Method::PUT,
        path: RECORDS.to_string(),
        description: "Write a record into one data domain".to_string(),
        requires_auth: true,
        request_schema: Some(json!({
            "type": "object",
            "required": ["value"],
            "additionalProperties": false,
            "properties": {
                "value": {"type": "object"}
            }
        })),
        response_schemas: BTreeMap::from([
            (204, json!({"type": "null"})),
            (400, problem_schema()),
            (404, problem_schema()),
        ]),
    })?;

    registry.register(RouteContract {
        method: Method::DELETE,
        path: RECORDS.to_string(),
        description: "Delete a record from one data domain".to_string(),
        requires_auth: true,
        request_schema: None,
        response_schemas: BTreeMap::from([(204, json!({"type": "null"})), (404, problem_schema())]),
    })?;

    // ---- Description --------------------------------------------------------

    registry.register(RouteContract {
        method: Method::GET,
        path: DESCRIBE.to_string(),
        description: "Machine-readable description of every route contract".to_string(),
        requires_auth: true,
        request_schema: None,
        response_schemas: BTreeMap::from([(
            200,
            json!({
                "type": "object",
                "required": ["name", "version", "routes"],
                "properties": {
                    "name": {"type": "string"},
                    "version": {"type": "string"},
                    "routes": {"type": "array", "items": {"type": "object"}}
                }
            }),
        )]),
    })?;

    Ok(registry)
}

// ============================================================================
// Shared Schema Fragments
// ============================================================================

fn session_status_schema() -> Value {
    json!({"type": "string", "enum": ["active", "idle", "closed"]})
}

/// Error body shape shared by every non-2xx response.
fn problem_schema() -> Value {
    json!({
        "type": "object",
        "required": ["status", "detail"],
        "properties": {
            "status": {"type": "integer"},
            "detail": {"type": "string"},
            "violations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["path", "expected", "received"],
                    "properties": {
                        "path": {"type": "string"},
                        "expected": {"type": "string"},
                        "received": {"type": "string"}
                    }
                }
            }
        },
        "additionalProperties": false
    })
}
