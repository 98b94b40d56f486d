//! Session Codec
//!
//! Stateless participant tokens. The server stores nothing per participant;
//! the full identity travels sealed inside the token and is recovered on every
//! request.
//!
//! ## Wire Format
//!
//! ```text
//! <base64(seal(json(participant)))> || <hex(nonce)> || <hex(sha256(segment 0))>
//! ```
//!
//! - Segment 0: standard padded base64 of the ChaCha20-Poly1305 ciphertext
//! - Segment 1: lowercase hex of the 12-byte nonce
//! - Segment 2: lowercase hex SHA-256 of the raw text of segment 0
//!
//! ## Verification Order
//!
//! 1. Exactly three segments
//! 2. Nonce is lowercase hex of 12 bytes
//! 3. Digest is 64 hex characters and matches segment 0
//! 4. Segment 0 decodes as base64
//! 5. AEAD open succeeds
//! 6. Plaintext decodes as a participant
//!
//! The digest only rejects corrupted tokens before any decryption work is
//! done. It carries no secret, so anyone can recompute it; the AEAD tag is the
//! authentication boundary.
//!
//! ## Key Lifetime
//!
//! The key is generated once per process and never written anywhere. A
//! restart invalidates every outstanding token and participants join again.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit},
};
use sha2::{Digest, Sha256};

use crate::{
    env::{EntropyError, Environment},
    participant::Participant,
};

/// Symmetric key size in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// AEAD nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// Separator between token segments.
pub const SEGMENT_DELIMITER: &str = "||";

/// Length of the hex-encoded SHA-256 digest segment.
const DIGEST_HEX_LEN: usize = 64;

/// Errors from issuing or verifying tokens.
///
/// Every verification failure means "not authenticated" to the client. The
/// variants exist for server-side logging and tests only and must not be
/// echoed back in a response.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Token does not have the expected shape.
    #[error("malformed token: {reason}")]
    Malformed {
        /// Which structural check failed.
        reason: &'static str,
    },

    /// Digest segment does not match the sealed payload.
    #[error("token digest mismatch")]
    DigestMismatch,

    /// AEAD open failed: wrong key, tampered ciphertext or nonce.
    #[error("token authentication failed")]
    Crypto,

    /// Participant could not be serialized or sealed.
    #[error("failed to seal token: {reason}")]
    Seal {
        /// Underlying failure.
        reason: String,
    },

    /// Randomness source failed while generating a nonce.
    #[error(transparent)]
    Entropy(#[from] EntropyError),
}

impl SessionError {
    /// Returns true if the token failed a structural check, as opposed to an
    /// integrity or authentication check.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    fn malformed(reason: &'static str) -> Self {
        Self::Malformed { reason }
    }
}

/// Process-lifetime symmetric key.
///
/// # Security
///
/// - **Debug Redaction**: the `Debug` impl never prints key material.
/// - **Memory Only**: there is no serialization for this type.
#[derive(Clone)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Generate a fresh key from the environment's entropy source.
    ///
    /// # Errors
    ///
    /// Returns `EntropyError` if no randomness is available. The server treats
    /// this as fatal at startup.
    pub fn generate(env: &impl Environment) -> Result<Self, EntropyError> {
        let mut key = [0u8; KEY_SIZE];
        env.random_bytes(&mut key)?;
        Ok(Self(key))
    }

    /// Wrap existing key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Issues and verifies participant tokens.
pub struct SessionCodec<E> {
    cipher: ChaCha20Poly1305,
    env: E,
}

impl<E> SessionCodec<E>
where
    E: Environment,
{
    /// Create a codec sealing with `key` and drawing nonces from `env`.
    pub fn new(key: &SessionKey, env: E) -> Self {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key.0));
        Self { cipher, env }
    }

    /// Seal `participant` into a token.
    ///
    /// # Errors
    ///
    /// - `SessionError::Entropy` if no nonce could be drawn
    /// - `SessionError::Seal` if serialization or encryption fails
    pub fn issue(&self, participant: &Participant) -> Result<String, SessionError> {
        let plaintext = serde_json::to_vec(participant)
            .map_err(|e| SessionError::Seal { reason: e.to_string() })?;

        let mut nonce = [0u8; NONCE_SIZE];
        self.env.random_bytes(&mut nonce)?;

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| SessionError::Seal { reason: e.to_string() })?;

        let payload = BASE64.encode(sealed);
        let digest = payload_digest(&payload);

        Ok(format!(
            "{payload}{SEGMENT_DELIMITER}{nonce}{SEGMENT_DELIMITER}{digest}",
            nonce = hex::encode(nonce)
        ))
    }

    /// Recover the participant sealed in `token`.
    ///
    /// # Errors
    ///
    /// - `SessionError::Malformed` for shape errors (segment count, nonce or
    ///   digest length, base64, JSON)
    /// - `SessionError::DigestMismatch` if segment 2 does not match segment 0
    /// - `SessionError::Crypto` if the AEAD tag does not verify
    pub fn verify(&self, token: &str) -> Result<Participant, SessionError> {
        let segments: Vec<&str> = token.split(SEGMENT_DELIMITER).collect();
        let [payload, nonce_hex, digest] = segments.as_slice() else {
            return Err(SessionError::malformed("expected 3 segments"));
        };

        // Only the canonical lowercase form is accepted, so one nonce has one
        // spelling.
        if nonce_hex.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(SessionError::malformed("nonce is not lowercase hex"));
        }
        let nonce =
            hex::decode(nonce_hex).map_err(|_| SessionError::malformed("nonce is not hex"))?;
        if nonce.len() != NONCE_SIZE {
            return Err(SessionError::malformed("nonce has wrong length"));
        }

        if digest.len() != DIGEST_HEX_LEN {
            return Err(SessionError::malformed("digest has wrong length"));
        }
        if payload_digest(payload) != *digest {
            return Err(SessionError::DigestMismatch);
        }

        let sealed =
            BASE64.decode(payload).map_err(|_| SessionError::malformed("payload is not base64"))?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), sealed.as_slice())
            .map_err(|_| SessionError::Crypto)?;

        serde_json::from_slice(&plaintext)
            .map_err(|_| SessionError::malformed("payload is not a participant"))
    }
}

impl<E> std::fmt::Debug for SessionCodec<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec").field("cipher", &"<redacted>").finish_non_exhaustive()
    }
}

/// Lowercase hex SHA-256 of the raw segment text.
fn payload_digest(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_lowercase_hex_of_raw_text() {
        let digest = payload_digest("abc");
        assert_eq!(digest, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(digest.len(), DIGEST_HEX_LEN);
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = SessionKey::from_bytes([7u8; KEY_SIZE]);
        let debug = format!("{key:?}");
        assert!(!debug.contains('7'));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn malformed_is_distinct_from_integrity_failures() {
        assert!(SessionError::malformed("x").is_malformed());
        assert!(!SessionError::DigestMismatch.is_malformed());
        assert!(!SessionError::Crypto.is_malformed());
    }
}
