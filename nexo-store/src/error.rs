//! Store error types.

use thiserror::Error;

/// Encryption and key-handling failures.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The key material has the wrong length or could not be used.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The random source failed.
    #[error("Random number generation failed")]
    Random,

    /// Sealing failed.
    #[error("Encryption failed")]
    Encrypt,

    /// Authentication or decryption failed (wrong key or tampered data).
    #[error("Decryption failed")]
    Decrypt,

    /// The algorithm named in a blob is not supported.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Base64 or UTF-8 decoding failed.
    #[error("Malformed encrypted data: {0}")]
    Malformed(String),
}

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Provider not found.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error (invalid or missing field).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Import/export document has the wrong shape.
    #[error("Format error: {0}")]
    Format(String),

    /// Encryption or decryption failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// System keychain error.
    #[error("Keychain error: {0}")]
    Keychain(String),
}

impl StoreError {
    /// Returns true if the error came from missing or invalid input.
    pub fn is_config_error(&self) -> bool {
        matches!(self, StoreError::Config(_) | StoreError::Format(_))
    }

    /// Returns true if the underlying file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
