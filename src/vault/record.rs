//! Encrypted key record schema.
//!
//! Only ciphertext and the wrapped data key are stored; the plaintext
//! provider key never persists. Binary fields are base64-encoded for the
//! JSON-at-rest form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One user-owned provider credential, encrypted at rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedKeyRecord {
    /// Record identifier (`key_` prefix).
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Third-party provider name (`openai`, `anthropic`, ...).
    pub provider: String,

    /// Provider key ciphertext (base64), tag detached.
    pub ciphertext: String,
    /// Nonce for the payload encryption (base64, 24 bytes).
    pub nonce: String,
    /// Authentication tag for the payload (base64, 16 bytes).
    pub tag: String,

    /// Data key wrapped under the KEK (base64, tag detached).
    pub wrapped_key: String,
    /// Nonce for the wrap (base64, 24 bytes).
    pub wrap_nonce: String,
    /// Authentication tag for the wrap (base64, 16 bytes).
    pub wrap_tag: String,

    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serialization_roundtrip() {
        let record = EncryptedKeyRecord {
            id: "key_01ABC".to_string(),
            user_id: "u1".to_string(),
            provider: "openai".to_string(),
            ciphertext: "Y2lwaGVy".to_string(),
            nonce: "bm9uY2U=".to_string(),
            tag: "dGFn".to_string(),
            wrapped_key: "d3JhcHBlZA==".to_string(),
            wrap_nonce: "d25vbmNl".to_string(),
            wrap_tag: "d3RhZw==".to_string(),
            created_at: Utc::now(),
            last_used_at: None,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("last_used_at"));

        let parsed: EncryptedKeyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "key_01ABC");
        assert_eq!(parsed.provider, "openai");
        assert!(parsed.last_used_at.is_none());
    }
}
