//! Error types for the credential vault.
//!
//! Crypto failures carry record identifiers only - never key material.

use thiserror::Error;

use crate::store::StorageError;

/// Errors from vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Underlying cryptographic primitive failed during encryption.
    /// Fatal for the operation; never retried (a retry risks nonce reuse).
    #[error("encryption failure while storing key for provider '{provider}'")]
    EncryptionFailure { provider: String },

    /// Authentication tag mismatch - tamper or corruption. No partial
    /// plaintext is ever returned.
    #[error("authentication failure for key record {record_id}")]
    AuthenticationFailure { record_id: String },

    /// Key record does not exist (or was revoked).
    #[error("key record not found: {record_id}")]
    NotFound { record_id: String },

    /// KEK material could not be decoded into a 32-byte key.
    #[error("invalid key-encryption-key material: {0}")]
    InvalidKek(String),

    /// The KEK lock was poisoned by a panicking thread.
    #[error("vault key lock poisoned")]
    LockPoisoned,

    /// Underlying record store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Convenience type alias for vault results.
pub type VaultResult<T> = Result<T, VaultError>;
