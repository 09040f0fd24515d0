//! Symmetric encryption for configuration at rest.
//!
//! AES-256-GCM with a fresh random 96-bit IV per seal. IV and ciphertext
//! (with the appended tag) are stored base64-encoded:
//!
//! ```json
//! { "algorithm": "aes-256-gcm", "iv": "...", "ciphertext": "..." }
//! ```
//!
//! Key bytes and decrypted plaintext live in [`Zeroizing`] buffers so
//! they are wiped when dropped.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Algorithm identifier written into every blob.
pub const ALGORITHM: &str = "aes-256-gcm";

/// Key length in bytes.
pub const KEY_LEN: usize = 32;

// ============================================================================
// Key
// ============================================================================

/// A 256-bit symmetric key.
#[derive(Clone)]
pub struct SecretKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

impl SecretKey {
    /// Generates a key from the system CSPRNG.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        SystemRandom::new()
            .fill(&mut bytes[..])
            .map_err(|_| CryptoError::Random)?;
        Ok(Self { bytes })
    }

    /// Builds a key from raw bytes.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; KEY_LEN] = raw.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", raw.len()))
        })?;
        Ok(Self {
            bytes: Zeroizing::new(array),
        })
    }

    /// Decodes a base64 key.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let raw = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
        );
        Self::from_bytes(&raw)
    }

    /// Encodes the key as base64.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(&self.bytes[..]))
    }

    fn aead_key(&self) -> Result<LessSafeKey, CryptoError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.bytes[..])
            .map_err(|_| CryptoError::InvalidKey("rejected by cipher".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Encrypts `plaintext` under a fresh IV.
    pub fn seal(&self, plaintext: &[u8]) -> Result<EncryptedBlob, CryptoError> {
        let mut iv = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut iv)
            .map_err(|_| CryptoError::Random)?;

        let mut in_out = plaintext.to_vec();
        self.aead_key()?
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Encrypt)?;

        Ok(EncryptedBlob {
            algorithm: ALGORITHM.to_string(),
            iv: STANDARD.encode(iv),
            ciphertext: STANDARD.encode(&in_out),
        })
    }

    /// Decrypts a blob sealed with this key.
    pub fn open(&self, blob: &EncryptedBlob) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if blob.algorithm != ALGORITHM {
            return Err(CryptoError::UnsupportedAlgorithm(blob.algorithm.clone()));
        }

        let iv = STANDARD
            .decode(&blob.iv)
            .map_err(|e| CryptoError::Malformed(format!("iv: {e}")))?;
        let nonce = Nonce::try_assume_unique_for_key(&iv)
            .map_err(|_| CryptoError::Malformed(format!("iv must be {NONCE_LEN} bytes")))?;

        let mut buffer = Zeroizing::new(
            STANDARD
                .decode(&blob.ciphertext)
                .map_err(|e| CryptoError::Malformed(format!("ciphertext: {e}")))?,
        );

        let plaintext_len = self
            .aead_key()?
            .open_in_place(nonce, Aad::empty(), buffer.as_mut_slice())
            .map_err(|_| CryptoError::Decrypt)?
            .len();
        buffer.truncate(plaintext_len);

        Ok(buffer)
    }

    /// Encrypts a UTF-8 string.
    pub fn seal_str(&self, plaintext: &str) -> Result<EncryptedBlob, CryptoError> {
        self.seal(plaintext.as_bytes())
    }

    /// Decrypts a blob into a UTF-8 string.
    pub fn open_str(&self, blob: &EncryptedBlob) -> Result<Zeroizing<String>, CryptoError> {
        let bytes = self.open(blob)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| CryptoError::Malformed(format!("plaintext is not UTF-8: {e}")))?;
        Ok(Zeroizing::new(text.to_owned()))
    }
}

// ============================================================================
// Blob
// ============================================================================

/// Encrypted payload as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    /// Cipher identifier.
    pub algorithm: String,
    /// Base64 IV.
    pub iv: String,
    /// Base64 ciphertext with the GCM tag appended.
    pub ciphertext: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let key = SecretKey::generate().unwrap();
        let blob = key.seal_str("sk-live-123").unwrap();

        assert_eq!(blob.algorithm, ALGORITHM);
        assert_ne!(blob.ciphertext, "sk-live-123");
        assert_eq!(key.open_str(&blob).unwrap().as_str(), "sk-live-123");
    }

    #[test]
    fn test_fresh_iv_per_seal() {
        let key = SecretKey::generate().unwrap();
        let a = key.seal_str("same").unwrap();
        let b = key.seal_str("same").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = SecretKey::generate().unwrap().seal_str("secret").unwrap();
        let other = SecretKey::generate().unwrap();
        assert!(matches!(other.open(&blob), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = SecretKey::generate().unwrap();
        let mut blob = key.seal_str("secret").unwrap();
        let mut raw = STANDARD.decode(&blob.ciphertext).unwrap();
        raw[0] ^= 0xff;
        blob.ciphertext = STANDARD.encode(raw);
        assert!(matches!(key.open(&blob), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        let key = SecretKey::generate().unwrap();
        let mut blob = key.seal_str("secret").unwrap();
        blob.algorithm = "rot13".to_string();
        assert!(matches!(
            key.open(&blob),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_key_base64_round_trip() {
        let key = SecretKey::generate().unwrap();
        let restored = SecretKey::from_base64(&key.to_base64()).unwrap();
        let blob = key.seal_str("x").unwrap();
        assert_eq!(restored.open_str(&blob).unwrap().as_str(), "x");

        assert!(SecretKey::from_bytes(&[0u8; 16]).is_err());
        assert_eq!(format!("{key:?}"), "SecretKey([REDACTED])");
    }
}
