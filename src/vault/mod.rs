//! Credential vault: envelope encryption for user-supplied provider keys.
//!
//! Each record is protected by a fresh per-record data key; the data key is
//! wrapped under the root KEK. Rotating the KEK re-wraps data keys without
//! re-encrypting the payloads. The KEK never leaves this module, and no
//! code path logs plaintext keys, data keys, or the KEK.

mod envelope;
mod error;
mod record;
mod store;

use std::sync::{Arc, RwLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use tracing::{info, warn};
use ulid::Ulid;
use zeroize::Zeroizing;

use crate::api::KEY_ID_PREFIX;

pub use envelope::Kek;
pub use error::{VaultError, VaultResult};
pub use record::EncryptedKeyRecord;
pub use store::{FileKeyRecordStore, KeyRecordStore};

use envelope::{open, seal, DataKey};

// ============================================================================
// Credential Vault
// ============================================================================

/// Vault for bring-your-own-key provider credentials.
///
/// Thread-safe; all cryptographic work is synchronous and in-memory, only
/// record persistence suspends.
pub struct CredentialVault {
    kek: RwLock<Kek>,
    store: Arc<dyn KeyRecordStore>,
}

impl CredentialVault {
    pub fn new(kek: Kek, store: Arc<dyn KeyRecordStore>) -> Self {
        Self {
            kek: RwLock::new(kek),
            store,
        }
    }

    /// Encrypt and persist a provider key for a user.
    ///
    /// Generates a fresh data key, seals the plaintext with it, wraps the
    /// data key under the KEK, and persists only the ciphertexts. Returns
    /// the stored record (which carries no plaintext).
    pub async fn store(
        &self,
        user_id: &str,
        provider: &str,
        plaintext_key: &str,
    ) -> VaultResult<EncryptedKeyRecord> {
        let data_key = DataKey::generate();

        let sealed = seal(&data_key.cipher(), plaintext_key.as_bytes()).ok_or_else(|| {
            VaultError::EncryptionFailure {
                provider: provider.to_string(),
            }
        })?;

        let wrapped = {
            let kek = self.kek.read().map_err(|_| VaultError::LockPoisoned)?;
            seal(&kek.cipher(), data_key.as_bytes()).ok_or_else(|| {
                VaultError::EncryptionFailure {
                    provider: provider.to_string(),
                }
            })?
        };

        let record = EncryptedKeyRecord {
            id: format!("{}{}", KEY_ID_PREFIX, Ulid::new()),
            user_id: user_id.to_string(),
            provider: provider.to_string(),
            ciphertext: BASE64.encode(&sealed.ciphertext),
            nonce: BASE64.encode(sealed.nonce),
            tag: BASE64.encode(sealed.tag),
            wrapped_key: BASE64.encode(&wrapped.ciphertext),
            wrap_nonce: BASE64.encode(wrapped.nonce),
            wrap_tag: BASE64.encode(wrapped.tag),
            created_at: Utc::now(),
            last_used_at: None,
        };

        self.store.save(&record).await?;

        info!(
            record_id = %record.id,
            user_id = %user_id,
            provider = %provider,
            "stored provider key"
        );

        Ok(record)
    }

    /// Decrypt a stored provider key.
    ///
    /// The returned plaintext is zeroized on drop; callers must scope it to
    /// a single request and never cache or log it. Any tag mismatch along
    /// either envelope layer fails with `AuthenticationFailure`.
    pub async fn retrieve(&self, user_id: &str, record_id: &str) -> VaultResult<Zeroizing<String>> {
        let record = self
            .store
            .load(user_id, record_id)
            .await?
            .ok_or_else(|| VaultError::NotFound {
                record_id: record_id.to_string(),
            })?;

        let plaintext = self.unseal(&record)?;

        // Refresh last_used_at; a failed touch never fails the retrieve.
        let mut touched = record;
        touched.last_used_at = Some(Utc::now());
        if let Err(e) = self.store.save(&touched).await {
            warn!(record_id = %record_id, error = %e, "failed to update last_used_at");
        }

        Ok(plaintext)
    }

    /// Delete a record. Subsequent retrievals fail with `NotFound`.
    pub async fn revoke(&self, user_id: &str, record_id: &str) -> VaultResult<()> {
        let removed = self.store.delete(user_id, record_id).await?;
        if !removed {
            return Err(VaultError::NotFound {
                record_id: record_id.to_string(),
            });
        }

        info!(record_id = %record_id, user_id = %user_id, "revoked provider key");
        Ok(())
    }

    /// List a user's records (metadata only).
    pub async fn list(&self, user_id: &str) -> VaultResult<Vec<EncryptedKeyRecord>> {
        let mut records = self.store.list(user_id).await?;
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    /// Rotate the KEK, re-wrapping every record's data key.
    ///
    /// Payload ciphertexts are untouched. All data keys are unwrapped and
    /// re-wrapped in memory before anything is written, so a record that
    /// fails authentication aborts the rotation with no changes.
    pub async fn rotate(&self, new_kek: Kek) -> VaultResult<usize> {
        let records = self.store.list_all().await?;

        let mut rewrapped = Vec::with_capacity(records.len());
        {
            let kek = self.kek.read().map_err(|_| VaultError::LockPoisoned)?;
            for record in records {
                let data_key = unwrap_data_key(&kek, &record)?;
                let wrapped = seal(&new_kek.cipher(), data_key.as_bytes()).ok_or_else(|| {
                    VaultError::EncryptionFailure {
                        provider: record.provider.clone(),
                    }
                })?;

                let mut updated = record;
                updated.wrapped_key = BASE64.encode(&wrapped.ciphertext);
                updated.wrap_nonce = BASE64.encode(wrapped.nonce);
                updated.wrap_tag = BASE64.encode(wrapped.tag);
                rewrapped.push(updated);
            }
        }

        let count = rewrapped.len();
        for record in &rewrapped {
            self.store.save(record).await?;
        }

        *self.kek.write().map_err(|_| VaultError::LockPoisoned)? = new_kek;

        info!(records = count, "rotated key-encryption-key");
        Ok(count)
    }

    fn unseal(&self, record: &EncryptedKeyRecord) -> VaultResult<Zeroizing<String>> {
        let kek = self.kek.read().map_err(|_| VaultError::LockPoisoned)?;
        let data_key = unwrap_data_key(&kek, record)?;

        let nonce = decode_field(&record.nonce, &record.id)?;
        let ciphertext = decode_field(&record.ciphertext, &record.id)?;
        let tag = decode_field(&record.tag, &record.id)?;

        let plaintext = open(&data_key.cipher(), &nonce, &ciphertext, &tag).ok_or_else(|| {
            VaultError::AuthenticationFailure {
                record_id: record.id.clone(),
            }
        })?;

        let text = String::from_utf8(plaintext).map_err(|_| VaultError::AuthenticationFailure {
            record_id: record.id.clone(),
        })?;

        Ok(Zeroizing::new(text))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn unwrap_data_key(kek: &Kek, record: &EncryptedKeyRecord) -> VaultResult<DataKey> {
    let wrap_nonce = decode_field(&record.wrap_nonce, &record.id)?;
    let wrapped_key = decode_field(&record.wrapped_key, &record.id)?;
    let wrap_tag = decode_field(&record.wrap_tag, &record.id)?;

    let key_bytes = open(&kek.cipher(), &wrap_nonce, &wrapped_key, &wrap_tag).ok_or_else(|| {
        VaultError::AuthenticationFailure {
            record_id: record.id.clone(),
        }
    })?;

    DataKey::from_bytes(&key_bytes).ok_or_else(|| VaultError::AuthenticationFailure {
        record_id: record.id.clone(),
    })
}

/// Base64 decode a record field; undecodable fields are treated as
/// corruption, same as a tag mismatch.
fn decode_field(encoded: &str, record_id: &str) -> VaultResult<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|_| VaultError::AuthenticationFailure {
            record_id: record_id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_vault(tmp: &TempDir) -> CredentialVault {
        let store = Arc::new(FileKeyRecordStore::new(tmp.path()));
        CredentialVault::new(Kek::generate(), store)
    }

    #[tokio::test]
    async fn store_retrieve_revoke_scenario() {
        let tmp = TempDir::new().unwrap();
        let vault = test_vault(&tmp);

        let record = vault.store("u1", "openai", "sk-test-123").await.unwrap();
        assert!(record.id.starts_with("key_"));
        assert_eq!(record.provider, "openai");

        let plaintext = vault.retrieve("u1", &record.id).await.unwrap();
        assert_eq!(plaintext.as_str(), "sk-test-123");

        vault.revoke("u1", &record.id).await.unwrap();

        let err = vault.retrieve("u1", &record.id).await.unwrap_err();
        assert!(matches!(err, VaultError::NotFound { .. }));
    }

    #[tokio::test]
    async fn plaintext_never_persisted() {
        let tmp = TempDir::new().unwrap();
        let vault = test_vault(&tmp);

        let record = vault.store("u1", "openai", "sk-test-123").await.unwrap();

        let path = tmp.path().join("u1").join(format!("{}.json", record.id));
        let on_disk = std::fs::read_to_string(path).unwrap();
        assert!(!on_disk.contains("sk-test-123"));
    }

    #[tokio::test]
    async fn tampered_ciphertext_fails_authentication() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileKeyRecordStore::new(tmp.path()));
        let vault = CredentialVault::new(Kek::generate(), store.clone());

        let record = vault.store("u1", "openai", "sk-test-123").await.unwrap();

        let mut tampered = store.load("u1", &record.id).await.unwrap().unwrap();
        let mut bytes = BASE64.decode(&tampered.ciphertext).unwrap();
        bytes[0] ^= 0x01;
        tampered.ciphertext = BASE64.encode(&bytes);
        store.save(&tampered).await.unwrap();

        let err = vault.retrieve("u1", &record.id).await.unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationFailure { .. }));
    }

    #[tokio::test]
    async fn tampered_tag_fails_authentication() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileKeyRecordStore::new(tmp.path()));
        let vault = CredentialVault::new(Kek::generate(), store.clone());

        let record = vault.store("u1", "openai", "sk-test-123").await.unwrap();

        let mut tampered = store.load("u1", &record.id).await.unwrap().unwrap();
        let mut bytes = BASE64.decode(&tampered.tag).unwrap();
        bytes[0] ^= 0x01;
        tampered.tag = BASE64.encode(&bytes);
        store.save(&tampered).await.unwrap();

        let err = vault.retrieve("u1", &record.id).await.unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationFailure { .. }));
    }

    #[tokio::test]
    async fn records_are_scoped_to_their_user() {
        let tmp = TempDir::new().unwrap();
        let vault = test_vault(&tmp);

        let record = vault.store("u1", "openai", "sk-test-123").await.unwrap();

        let err = vault.retrieve("u2", &record.id).await.unwrap_err();
        assert!(matches!(err, VaultError::NotFound { .. }));
    }

    #[tokio::test]
    async fn retrieve_refreshes_last_used() {
        let tmp = TempDir::new().unwrap();
        let vault = test_vault(&tmp);

        let record = vault.store("u1", "openai", "sk-test-123").await.unwrap();
        assert!(record.last_used_at.is_none());

        vault.retrieve("u1", &record.id).await.unwrap();

        let listed = vault.list("u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn rotation_preserves_decryptability() {
        let tmp = TempDir::new().unwrap();
        let vault = test_vault(&tmp);

        let r1 = vault.store("u1", "openai", "sk-test-123").await.unwrap();
        let r2 = vault.store("u2", "anthropic", "sk-other-456").await.unwrap();

        let rotated = vault.rotate(Kek::generate()).await.unwrap();
        assert_eq!(rotated, 2);

        assert_eq!(
            vault.retrieve("u1", &r1.id).await.unwrap().as_str(),
            "sk-test-123"
        );
        assert_eq!(
            vault.retrieve("u2", &r2.id).await.unwrap().as_str(),
            "sk-other-456"
        );
    }

    #[tokio::test]
    async fn rotation_does_not_touch_payload_ciphertext() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileKeyRecordStore::new(tmp.path()));
        let vault = CredentialVault::new(Kek::generate(), store.clone());

        let record = vault.store("u1", "openai", "sk-test-123").await.unwrap();
        let before = store.load("u1", &record.id).await.unwrap().unwrap();

        vault.rotate(Kek::generate()).await.unwrap();

        let after = store.load("u1", &record.id).await.unwrap().unwrap();
        assert_eq!(before.ciphertext, after.ciphertext);
        assert_eq!(before.nonce, after.nonce);
        assert_eq!(before.tag, after.tag);
        assert_ne!(before.wrapped_key, after.wrapped_key);
    }

    #[tokio::test]
    async fn wrong_kek_fails_authentication() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileKeyRecordStore::new(tmp.path()));

        let vault = CredentialVault::new(Kek::generate(), store.clone());
        let record = vault.store("u1", "openai", "sk-test-123").await.unwrap();

        let other = CredentialVault::new(Kek::generate(), store);
        let err = other.retrieve("u1", &record.id).await.unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationFailure { .. }));
    }
}
