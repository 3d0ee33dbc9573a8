//! Envelope encryption primitives.
//!
//! Every key record is protected by a freshly generated per-record data
//! key; the data key itself is wrapped under the root key-encryption-key.
//! Both layers use XChaCha20-Poly1305 with random 24-byte nonces. The
//! 16-byte authentication tag is carried as its own field so tampering with
//! either ciphertext or tag fails closed.

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{VaultError, VaultResult};

/// Key length for both the KEK and per-record data keys.
pub const KEY_LEN: usize = 32;
/// XChaCha20-Poly1305 nonce length.
pub const NONCE_LEN: usize = 24;
/// Poly1305 authentication tag length.
pub const TAG_LEN: usize = 16;

// ============================================================================
// Key Types
// ============================================================================

/// Root key-encryption-key.
///
/// Never leaves the vault boundary; zeroized on drop; `Debug` is redacted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Kek([u8; KEY_LEN]);

impl Kek {
    /// Decode KEK material supplied through configuration.
    ///
    /// Accepts standard base64 or hex; the decoded value must be exactly
    /// 32 bytes.
    pub fn from_encoded(encoded: &str) -> VaultResult<Self> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;

        let trimmed = encoded.trim();

        // A 64-char hex string is also valid base64, so accept whichever
        // decoding yields exactly 32 bytes.
        let bytes = match STANDARD.decode(trimmed) {
            Ok(bytes) if bytes.len() == KEY_LEN => bytes,
            _ => hex::decode(trimmed)
                .ok()
                .filter(|bytes| bytes.len() == KEY_LEN)
                .ok_or_else(|| {
                    VaultError::InvalidKek(format!(
                        "expected {KEY_LEN} bytes of base64 or hex"
                    ))
                })?,
        };

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(Self(key))
    }

    /// Generate a fresh random KEK. Used for rotation and tests.
    pub fn generate() -> Self {
        let generated = XChaCha20Poly1305::generate_key(&mut OsRng);
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&generated);
        Self(key)
    }

    pub(crate) fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

impl std::fmt::Debug for Kek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Kek(..)")
    }
}

/// Per-record data key. Exists only in memory, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; KEY_LEN]);

impl DataKey {
    pub(crate) fn generate() -> Self {
        let generated = XChaCha20Poly1305::generate_key(&mut OsRng);
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&generated);
        Self(key)
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != KEY_LEN {
            return None;
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Some(Self(key))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey(..)")
    }
}

// ============================================================================
// Seal / Open
// ============================================================================

/// Output of an authenticated encryption: ciphertext with the nonce and
/// detached tag.
pub(crate) struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

/// Encrypt under a fresh random nonce, detaching the tag.
pub(crate) fn seal(cipher: &XChaCha20Poly1305, plaintext: &[u8]) -> Option<Sealed> {
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let mut combined = cipher.encrypt(&nonce, plaintext).ok()?;

    // AEAD output is ciphertext || tag; split the tag into its own field.
    let split_at = combined.len().checked_sub(TAG_LEN)?;
    let tag_bytes = combined.split_off(split_at);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&tag_bytes);

    let mut nonce_out = [0u8; NONCE_LEN];
    nonce_out.copy_from_slice(&nonce);

    Some(Sealed {
        nonce: nonce_out,
        ciphertext: combined,
        tag,
    })
}

/// Decrypt and authenticate. Returns `None` on any mismatch; no partial
/// plaintext escapes.
pub(crate) fn open(
    cipher: &XChaCha20Poly1305,
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Option<Vec<u8>> {
    if nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
        return None;
    }

    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    cipher
        .decrypt(XNonce::from_slice(nonce), combined.as_slice())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = DataKey::generate();
        let sealed = seal(&key.cipher(), b"sk-test-123").unwrap();

        let opened = open(&key.cipher(), &sealed.nonce, &sealed.ciphertext, &sealed.tag).unwrap();
        assert_eq!(opened, b"sk-test-123");
    }

    #[test]
    fn open_rejects_tampered_ciphertext() {
        let key = DataKey::generate();
        let mut sealed = seal(&key.cipher(), b"sk-test-123").unwrap();
        sealed.ciphertext[0] ^= 0x01;

        assert!(open(&key.cipher(), &sealed.nonce, &sealed.ciphertext, &sealed.tag).is_none());
    }

    #[test]
    fn open_rejects_tampered_tag() {
        let key = DataKey::generate();
        let mut sealed = seal(&key.cipher(), b"sk-test-123").unwrap();
        sealed.tag[0] ^= 0x01;

        assert!(open(&key.cipher(), &sealed.nonce, &sealed.ciphertext, &sealed.tag).is_none());
    }

    #[test]
    fn open_rejects_wrong_key() {
        let key = DataKey::generate();
        let other = DataKey::generate();
        let sealed = seal(&key.cipher(), b"sk-test-123").unwrap();

        assert!(open(&other.cipher(), &sealed.nonce, &sealed.ciphertext, &sealed.tag).is_none());
    }

    #[test]
    fn kek_from_base64_and_hex() {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;

        let raw = [7u8; KEY_LEN];
        let b64 = STANDARD.encode(raw);
        Kek::from_encoded(&b64).unwrap();

        let hex: String = raw.iter().map(|b| format!("{b:02x}")).collect();
        Kek::from_encoded(&hex).unwrap();
    }

    #[test]
    fn kek_rejects_wrong_length() {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;

        let short = STANDARD.encode([7u8; 16]);
        assert!(matches!(
            Kek::from_encoded(&short),
            Err(VaultError::InvalidKek(_))
        ));
        assert!(matches!(
            Kek::from_encoded("not base64!!"),
            Err(VaultError::InvalidKek(_))
        ));
    }

    #[test]
    fn kek_debug_is_redacted() {
        let kek = Kek::generate();
        assert_eq!(format!("{kek:?}"), "Kek(..)");
    }
}
