//! Bearer token authentication.
//!
//! The gateway treats identity as an external collaborator: this module
//! resolves a request to a `UserIdentity` and everything downstream is
//! scoped by that identity. Tokens are compared through SHA-256 digests so
//! the comparison is constant-time and raw tokens are not held in memory.

use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use crate::config::ApiTokenConfig;
use crate::server::AppState;

/// Authenticated user identity attached to each request.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_id: String,
}

/// User identity assumed when no tokens are configured (open mode).
pub const LOCAL_USER: &str = "local";

/// Token table resolving bearer tokens to user identities.
pub struct Authenticator {
    /// (SHA-256 of token, user id) pairs.
    tokens: Vec<([u8; 32], String)>,
}

impl Authenticator {
    pub fn new(entries: &[ApiTokenConfig]) -> Self {
        Self {
            tokens: entries
                .iter()
                .map(|entry| (Sha256::digest(entry.token.as_bytes()).into(), entry.user.clone()))
                .collect(),
        }
    }

    /// Whether any tokens are configured.
    pub fn is_open(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Resolve the request headers to a user identity.
    ///
    /// - Tokens configured: requires a matching `Authorization: Bearer`
    ///   header.
    /// - No tokens configured: every request runs as [`LOCAL_USER`].
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<UserIdentity> {
        if self.is_open() {
            return Some(UserIdentity {
                user_id: LOCAL_USER.to_string(),
            });
        }

        let provided = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))?;
        let digest: [u8; 32] = Sha256::digest(provided.as_bytes()).into();

        self.tokens
            .iter()
            .find(|(expected, _)| *expected == digest)
            .map(|(_, user)| UserIdentity {
                user_id: user.clone(),
            })
    }
}

/// Middleware that guards the API routes.
///
/// On success the resolved `UserIdentity` is attached as a request
/// extension for handlers to consume.
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    match state.auth.authenticate(request.headers()) {
        Some(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}
