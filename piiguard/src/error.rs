//! Error types for `piiguard` operations.

use crate::keyset::PrimitiveKind;
use std::fmt;

/// Main error type for `piiguard` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Key material failed primitive-specific validation
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Per-identity key derivation failed
    #[error("key derivation failed: {0}")]
    Derivation(String),

    /// Encryption operation failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Ciphertext could not be decrypted (truncated, bad padding, bad length)
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Authentication tag verification failed (data may be corrupted or tampered)
    #[error("authentication failed: ciphertext may be corrupted or tampered")]
    AuthenticationFailed,

    /// MAC or blind index verification mismatch
    #[error("integrity check failed: digest does not match value")]
    Integrity,

    /// Stored representation could not be interpreted as the column type
    #[error("decode failed: {0}")]
    Decode(String),

    /// Unrecognized cipher mode tag
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// No key was configured for this primitive family
    #[error("{0} keyset is not configured")]
    NotConfigured(PrimitiveKind),

    /// Heap table name is not a plain SQL identifier
    #[error("invalid heap table name: {0:?}")]
    InvalidTableName(String),

    /// Heap store operation failed
    #[error("heap store error: {0}")]
    Store(String),

    /// Key provider operation failed
    #[error("key provider error: {0}")]
    KeyProvider(#[from] KeyProviderError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors specific to loading key material.
#[derive(Debug)]
pub enum KeyProviderError {
    /// Key file or variable was expected but is missing
    KeyNotFound(String),

    /// Key material is not valid hex or has the wrong shape
    InvalidFormat(String),

    /// Key generation or persistence failed
    CreationFailed(String),

    /// I/O operation failed
    Io(std::io::Error),
}

impl fmt::Display for KeyProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyNotFound(name) => write!(f, "key not found: {name}"),
            Self::InvalidFormat(msg) => write!(f, "invalid key format: {msg}"),
            Self::CreationFailed(msg) => write!(f, "key creation failed: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for KeyProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for KeyProviderError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
