//! Sources of master key material.

use crate::error::KeyProviderError;
use crate::keyset::PrimitiveKind;
use secrecy::SecretVec;
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

/// Default prefix for [`EnvKeyProvider`] variables.
pub const ENV_PREFIX: &str = "PIIGUARD";

/// What a master key is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    /// Column encryption.
    Aead,
    /// Column digests and heap token hashes.
    Mac,
    /// Eight-digit blind indexes.
    BlindIndex,
}

impl KeyPurpose {
    /// Every purpose, in loading order.
    pub const ALL: [Self; 3] = [Self::Aead, Self::Mac, Self::BlindIndex];

    /// Primitive family the key feeds.
    #[must_use]
    pub const fn kind(self) -> PrimitiveKind {
        match self {
            Self::Aead => PrimitiveKind::Aead,
            Self::Mac => PrimitiveKind::Mac,
            Self::BlindIndex => PrimitiveKind::BlindIndex,
        }
    }

    /// File name used by file-backed providers, e.g. `mac.key`.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Aead => "aead.key",
            Self::Mac => "mac.key",
            Self::BlindIndex => "bidx.key",
        }
    }

    /// Environment variable suffix, e.g. `MAC_KEY`.
    #[must_use]
    pub const fn env_suffix(self) -> &'static str {
        match self {
            Self::Aead => "AEAD_KEY",
            Self::Mac => "MAC_KEY",
            Self::BlindIndex => "BIDX_KEY",
        }
    }
}

impl fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind().fmt(f)
    }
}

/// Supplies master keys for each primitive family.
///
/// Implementations must be thread-safe (`Send + Sync`). Returning `Ok(None)`
/// means the family is not configured; features built on it stay disabled
/// and fail with `Error::NotConfigured` when used.
pub trait KeyProvider: Send + Sync {
    /// Returns the master key for `purpose`, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns `KeyProviderError::InvalidFormat` if the stored key cannot be
    /// decoded, or `KeyProviderError::Io` if it cannot be read.
    fn master_key(&self, purpose: KeyPurpose) -> Result<Option<SecretVec<u8>>, KeyProviderError>;
}

impl<P: KeyProvider + ?Sized> KeyProvider for &P {
    fn master_key(&self, purpose: KeyPurpose) -> Result<Option<SecretVec<u8>>, KeyProviderError> {
        (**self).master_key(purpose)
    }
}

/// Decodes a hex-encoded key, ignoring surrounding whitespace.
///
/// # Errors
///
/// Returns `KeyProviderError::InvalidFormat` naming `source` if the text is
/// not valid hex.
pub fn decode_hex_key(source: &str, text: &str) -> Result<SecretVec<u8>, KeyProviderError> {
    hex::decode(text.trim())
        .map(SecretVec::new)
        .map_err(|e| KeyProviderError::InvalidFormat(format!("{source}: {e}")))
}

/// Reads hex keys from `<PREFIX>_AEAD_KEY`, `<PREFIX>_MAC_KEY` and
/// `<PREFIX>_BIDX_KEY`.
///
/// Unset or empty variables mean "not configured".
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
    prefix: String,
}

impl EnvKeyProvider {
    /// Uses the `PIIGUARD_` prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix(ENV_PREFIX)
    }

    /// Reads the same variables under `prefix` instead of `PIIGUARD`.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Variable name consulted for `purpose`.
    #[must_use]
    pub fn variable(&self, purpose: KeyPurpose) -> String {
        format!("{}_{}", self.prefix, purpose.env_suffix())
    }
}

impl Default for EnvKeyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyProvider for EnvKeyProvider {
    fn master_key(&self, purpose: KeyPurpose) -> Result<Option<SecretVec<u8>>, KeyProviderError> {
        let name = self.variable(purpose);
        match std::env::var(&name) {
            Ok(value) => {
                let value = Zeroizing::new(value);
                if value.trim().is_empty() {
                    Ok(None)
                } else {
                    decode_hex_key(&name, &value).map(Some)
                }
            }
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => {
                Err(KeyProviderError::InvalidFormat(format!("{name}: not valid unicode")))
            }
        }
    }
}

/// Keys held in memory, for tests and embedding.
#[derive(Default)]
pub struct StaticKeyProvider {
    keys: HashMap<KeyPurpose, Zeroizing<Vec<u8>>>,
}

impl StaticKeyProvider {
    /// Creates a provider with no keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key for `purpose`.
    #[must_use]
    pub fn with_key(mut self, purpose: KeyPurpose, key: impl Into<Vec<u8>>) -> Self {
        self.keys.insert(purpose, Zeroizing::new(key.into()));
        self
    }
}

impl KeyProvider for StaticKeyProvider {
    fn master_key(&self, purpose: KeyPurpose) -> Result<Option<SecretVec<u8>>, KeyProviderError> {
        Ok(self.keys.get(&purpose).map(|key| SecretVec::new(key.to_vec())))
    }
}

impl fmt::Debug for StaticKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut configured: Vec<_> = self.keys.keys().map(|p| p.kind().label()).collect();
        configured.sort_unstable();
        f.debug_struct("StaticKeyProvider").field("configured", &configured).finish()
    }
}
