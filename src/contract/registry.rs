//! Schema contract registry.
//!
//! Single source of truth for what every route accepts and returns,
//! enforced at runtime in both directions. Contracts are declared as JSON
//! Schema (Draft 7) and compiled once at registration; validation itself is
//! synchronous and framework-independent so the registry can be exercised
//! without a live server.

use std::collections::BTreeMap;

use axum::http::Method;
use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::{Draft, JSONSchema};
use serde::Serialize;
use serde_json::Value;

use super::error::{
    ContractViolation, FieldViolation, RegistryError, RequestError, ResponseError, ValidationError,
};

// ============================================================================
// Route Contract
// ============================================================================

/// Declaration of one route's wire contract.
///
/// Immutable once registered. `(method, path)` pairs must be unique across
/// the registry; the path is the route template as mounted in the router
/// (`/api/v1/sessions/{session_id}`).
#[derive(Debug, Clone)]
pub struct RouteContract {
    pub method: Method,
    pub path: String,
    pub description: String,
    pub requires_auth: bool,
    /// Request body schema. `None` for routes without a body.
    pub request_schema: Option<Value>,
    /// Response body schema per declared status code.
    pub response_schemas: BTreeMap<u16, Value>,
}

struct CompiledContract {
    contract: RouteContract,
    request: Option<JSONSchema>,
    responses: BTreeMap<u16, JSONSchema>,
}

// ============================================================================
// Registry
// ============================================================================

/// Registry of all route contracts, keyed by (path, method).
///
/// Built once at startup and read-only afterwards.
#[derive(Default)]
pub struct ContractRegistry {
    routes: BTreeMap<(String, String), CompiledContract>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route contract.
    ///
    /// Fails with `DuplicateRoute` if the (method, path) pair is already
    /// registered, or `InvalidSchema` if a declared schema does not compile.
    pub fn register(&mut self, contract: RouteContract) -> Result<(), RegistryError> {
        let key = route_key(&contract.method, &contract.path);
        if self.routes.contains_key(&key) {
            return Err(RegistryError::DuplicateRoute {
                method: contract.method.to_string(),
                path: contract.path.clone(),
            });
        }

        let request = contract
            .request_schema
            .as_ref()
            .map(|schema| compile(schema, &contract))
            .transpose()?;

        let mut responses = BTreeMap::new();
        for (status, schema) in &contract.response_schemas {
            responses.insert(*status, compile(schema, &contract)?);
        }

        self.routes.insert(
            key,
            CompiledContract {
                contract,
                request,
                responses,
            },
        );
        Ok(())
    }

    /// Look up a route's declaration.
    pub fn contract(&self, method: &Method, path: &str) -> Option<&RouteContract> {
        self.routes
            .get(&route_key(method, path))
            .map(|c| &c.contract)
    }

    /// Number of registered contracts.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Validate an inbound request body against the route's input schema.
    ///
    /// On success returns the normalized value; on failure returns the full
    /// list of field-level violations, never a single opaque message.
    pub fn validate_request(
        &self,
        method: &Method,
        path: &str,
        input: &Value,
    ) -> Result<Value, RequestError> {
        let compiled = self
            .routes
            .get(&route_key(method, path))
            .ok_or_else(|| RequestError::UnknownRoute {
                method: method.to_string(),
                path: path.to_string(),
            })?;

        let Some(schema) = &compiled.request else {
            // Route declares no body; accept and normalize to null.
            return Ok(Value::Null);
        };

        let violations = collect_violations(schema, input);
        if violations.is_empty() {
            Ok(input.clone())
        } else {
            Err(ValidationError { violations }.into())
        }
    }

    /// Validate an outbound response body against the route's declared
    /// schema for `status`.
    ///
    /// A mismatch is a programmer error surfaced as `ContractViolation`,
    /// distinct from the client-facing `ValidationError`. Producing a status
    /// code the contract never declared is a violation too.
    pub fn validate_response(
        &self,
        method: &Method,
        path: &str,
        status: u16,
        output: &Value,
    ) -> Result<(), ResponseError> {
        let compiled = self
            .routes
            .get(&route_key(method, path))
            .ok_or_else(|| ResponseError::UnknownRoute {
                method: method.to_string(),
                path: path.to_string(),
            })?;

        let Some(schema) = compiled.responses.get(&status) else {
            return Err(ContractViolation {
                method: method.to_string(),
                path: path.to_string(),
                status,
                violations: vec![FieldViolation {
                    path: "/".to_string(),
                    expected: format!(
                        "one of the declared status codes {:?}",
                        compiled.responses.keys().collect::<Vec<_>>()
                    ),
                    received: status.to_string(),
                }],
            }
            .into());
        };

        let violations = collect_violations(schema, output);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ContractViolation {
                method: method.to_string(),
                path: path.to_string(),
                status,
                violations,
            }
            .into())
        }
    }

    /// Produce a serializable description of every registered contract.
    ///
    /// Pure function of registry state; this is the sole surface consumed by
    /// external documentation tooling.
    pub fn describe(&self) -> ApiDescription {
        ApiDescription {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            routes: self
                .routes
                .values()
                .map(|compiled| {
                    let c = &compiled.contract;
                    RouteDescription {
                        method: c.method.to_string(),
                        path: c.path.clone(),
                        description: c.description.clone(),
                        requires_auth: c.requires_auth,
                        request: c.request_schema.clone(),
                        responses: c
                            .response_schemas
                            .iter()
                            .map(|(status, schema)| (status.to_string(), schema.clone()))
                            .collect(),
                    }
                })
                .collect(),
        }
    }
}

// ============================================================================
// Description Types
// ============================================================================

/// Machine-readable description of the whole API surface.
#[derive(Debug, Clone, Serialize)]
pub struct ApiDescription {
    pub name: String,
    pub version: String,
    pub routes: Vec<RouteDescription>,
}

/// Description of one route's contract.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDescription {
    pub method: String,
    pub path: String,
    pub description: String,
    pub requires_auth: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    pub responses: BTreeMap<String, Value>,
}

// ============================================================================
// Helpers
// ============================================================================

fn route_key(method: &Method, path: &str) -> (String, String) {
    (path.to_string(), method.to_string())
}

fn compile(schema: &Value, contract: &RouteContract) -> Result<JSONSchema, RegistryError> {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|e| RegistryError::InvalidSchema {
            method: contract.method.to_string(),
            path: contract.path.clone(),
            message: e.to_string(),
        })
}

fn collect_violations(schema: &JSONSchema, instance: &Value) -> Vec<FieldViolation> {
    match schema.validate(instance) {
        Ok(()) => Vec::new(),
        Err(errors) => errors.map(|e| violation_from(&e)).collect(),
    }
}

fn violation_from(err: &jsonschema::ValidationError<'_>) -> FieldViolation {
    let base = err.instance_path.to_string();

    match &err.kind {
        ValidationErrorKind::Required { property } => {
            let name = property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string());
            FieldViolation {
                path: format!("{base}/{name}"),
                expected: "required field".to_string(),
                received: "missing".to_string(),
            }
        }
        ValidationErrorKind::Type { kind } => FieldViolation {
            path: pointer_or_root(base),
            expected: type_kind_name(kind),
            received: json_type_name(&err.instance).to_string(),
        },
        _ => FieldViolation {
            path: pointer_or_root(base),
            expected: err.to_string(),
            received: json_type_name(&err.instance).to_string(),
        },
    }
}

fn pointer_or_root(path: String) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path
    }
}

fn type_kind_name(kind: &TypeKind) -> String {
    match kind {
        TypeKind::Single(t) => format!("{t:?}").to_lowercase(),
        TypeKind::Multiple(types) => (*types)
            .into_iter()
            .map(|t| format!("{t:?}").to_lowercase())
            .collect::<Vec<_>>()
            .join(" or "),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn turn_contract() -> RouteContract {
        RouteContract {
            method: Method::POST,
            path: "/api/v1/sessions/{session_id}/turns".to_string(),
            description: "Append a turn".to_string(),
            requires_auth: true,
            request_schema: Some(json!({
                "type": "object",
                "required": ["role", "content"],
                "additionalProperties": false,
                "properties": {
                    "role": {"type": "string", "enum": ["user", "tutor"]},
                    "content": {"type": "string", "minLength": 1}
                }
            })),
            response_schemas: BTreeMap::from([(
                200,
                json!({
                    "type": "object",
                    "required": ["seq", "status"],
                    "properties": {
                        "seq": {"type": "integer", "minimum": 1},
                        "status": {"type": "string", "enum": ["active", "idle", "closed"]}
                    }
                }),
            )]),
        }
    }

    fn registry_with_turns() -> ContractRegistry {
        let mut registry = ContractRegistry::new();
        registry.register(turn_contract()).unwrap();
        registry
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = registry_with_turns();

        let err = registry.register(turn_contract()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRoute { .. }));

        // Same path, different method is fine.
        let mut get_turns = turn_contract();
        get_turns.method = Method::GET;
        get_turns.request_schema = None;
        registry.register(get_turns).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn valid_request_normalizes_idempotently() {
        let registry = registry_with_turns();
        let method = Method::POST;
        let path = "/api/v1/sessions/{session_id}/turns";
        let input = json!({"role": "user", "content": "What transfers to Cal?"});

        let first = registry.validate_request(&method, path, &input).unwrap();
        let second = registry.validate_request(&method, path, &first).unwrap();
        assert_eq!(first, second);
        assert_eq!(second, input);
    }

    #[test]
    fn missing_required_field_names_the_path() {
        let registry = registry_with_turns();

        let err = registry
            .validate_request(
                &Method::POST,
                "/api/v1/sessions/{session_id}/turns",
                &json!({"role": "user"}),
            )
            .unwrap_err();

        let RequestError::Invalid(validation) = err else {
            panic!("expected validation error");
        };
        assert_eq!(validation.violations.len(), 1);
        assert_eq!(validation.violations[0].path, "/content");
        assert_eq!(validation.violations[0].received, "missing");
    }

    #[test]
    fn type_mismatch_reports_expected_and_received() {
        let registry = registry_with_turns();

        let err = registry
            .validate_request(
                &Method::POST,
                "/api/v1/sessions/{session_id}/turns",
                &json!({"role": "user", "content": 42}),
            )
            .unwrap_err();

        let RequestError::Invalid(validation) = err else {
            panic!("expected validation error");
        };
        let violation = &validation.violations[0];
        assert_eq!(violation.path, "/content");
        assert_eq!(violation.expected, "string");
        assert_eq!(violation.received, "number");
    }

    #[test]
    fn unknown_route_is_distinct_from_invalid_input() {
        let registry = registry_with_turns();

        let err = registry
            .validate_request(&Method::POST, "/api/v1/nope", &json!({}))
            .unwrap_err();
        assert!(matches!(err, RequestError::UnknownRoute { .. }));
    }

    #[test]
    fn response_violation_is_surfaced_not_coerced() {
        let registry = registry_with_turns();
        let method = Method::POST;
        let path = "/api/v1/sessions/{session_id}/turns";

        registry
            .validate_response(&method, path, 200, &json!({"seq": 1, "status": "active"}))
            .unwrap();

        let err = registry
            .validate_response(&method, path, 200, &json!({"seq": "one", "status": "active"}))
            .unwrap_err();
        let ResponseError::Violation(violation) = err else {
            panic!("expected contract violation");
        };
        assert_eq!(violation.status, 200);
        assert_eq!(violation.violations[0].path, "/seq");
    }

    #[test]
    fn undeclared_status_is_a_contract_violation() {
        let registry = registry_with_turns();

        let err = registry
            .validate_response(
                &Method::POST,
                "/api/v1/sessions/{session_id}/turns",
                418,
                &json!({}),
            )
            .unwrap_err();
        assert!(matches!(err, ResponseError::Violation(v) if v.status == 418));
    }

    #[test]
    fn describe_is_pure_and_serializable() {
        let registry = registry_with_turns();

        let first = serde_json::to_value(registry.describe()).unwrap();
        let second = serde_json::to_value(registry.describe()).unwrap();
        assert_eq!(first, second);

        let routes = first["routes"].as_array().unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0]["method"], "POST");
        assert_eq!(routes[0]["path"], "/api/v1/sessions/{session_id}/turns");
        assert!(routes[0]["responses"]["200"].is_object());
    }

    #[test]
    fn invalid_schema_is_a_registration_error() {
        let mut registry = ContractRegistry::new();
        let mut contract = turn_contract();
        contract.request_schema = Some(json!({"type": "not-a-type"}));

        let err = registry.register(contract).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
    }
}
