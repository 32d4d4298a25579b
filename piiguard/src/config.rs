//! Crypto configuration.

use crate::aead::CipherMode;
use crate::error::Error;
use crate::identity::Identity;
use crate::key_provider::ENV_PREFIX;
use uuid::Uuid;

/// Settings that are not key material.
///
/// `deriver_identity` is the identity used for values that have no row of
/// their own, most notably heap token digests, which must be the same for
/// every row so that searches can find them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CryptoConfig {
    /// Mode used by the AEAD keyset.
    pub cipher_mode: CipherMode,
    /// Identity the heap MAC key is derived for; empty means the MAC master key.
    pub deriver_identity: Identity,
}

impl CryptoConfig {
    /// Reads `PIIGUARD_CIPHER_MODE` and `PIIGUARD_DERIVER_KEY`.
    ///
    /// # Errors
    ///
    /// See [`CryptoConfig::from_env_with_prefix`].
    pub fn from_env() -> Result<Self, Error> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Reads `<PREFIX>_CIPHER_MODE` (`cbc`, `cfb` or `gcm`, default `gcm`)
    /// and `<PREFIX>_DERIVER_KEY` (a UUID, stored as its 16 raw bytes).
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedAlgorithm` for an unknown mode and
    /// `Error::Derivation` if the deriver key is not a UUID.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(mode) = non_empty_var(&format!("{prefix}_CIPHER_MODE")) {
            config.cipher_mode = mode.parse()?;
        }

        let deriver_var = format!("{prefix}_DERIVER_KEY");
        if let Some(deriver) = non_empty_var(&deriver_var) {
            let uuid = Uuid::parse_str(deriver.trim())
                .map_err(|e| Error::Derivation(format!("{deriver_var}: {e}")))?;
            config.deriver_identity = Identity::from(uuid);
        }

        Ok(config)
    }

    /// Sets the AEAD cipher mode.
    #[must_use]
    pub const fn with_cipher_mode(mut self, mode: CipherMode) -> Self {
        self.cipher_mode = mode;
        self
    }

    /// Sets the identity the heap MAC key is derived for.
    #[must_use]
    pub fn with_deriver_identity(mut self, identity: impl Into<Identity>) -> Self {
        self.deriver_identity = identity.into();
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = CryptoConfig::default();
        assert_eq!(config.cipher_mode, CipherMode::Gcm);
        assert!(config.deriver_identity.is_empty());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("PIIGUARD_TEST_CFG_CIPHER_MODE", "CBC");
        std::env::set_var("PIIGUARD_TEST_CFG_DERIVER_KEY", "67e55044-10b1-426f-9247-bb680e5fe0c8");

        let config = CryptoConfig::from_env_with_prefix("PIIGUARD_TEST_CFG").unwrap();
        assert_eq!(config.cipher_mode, CipherMode::Cbc);
        assert_eq!(config.deriver_identity.as_bytes().len(), 16);
        assert_eq!(config.deriver_identity.as_bytes()[0], 0x67);
    }

    #[test]
    fn test_from_env_unset_uses_defaults() {
        let config = CryptoConfig::from_env_with_prefix("PIIGUARD_TEST_CFG_UNSET").unwrap();
        assert_eq!(config, CryptoConfig::default());
    }

    #[test]
    fn test_from_env_rejects_bad_values() {
        std::env::set_var("PIIGUARD_TEST_CFG_BAD_MODE_CIPHER_MODE", "ecb");
        assert!(matches!(
            CryptoConfig::from_env_with_prefix("PIIGUARD_TEST_CFG_BAD_MODE"),
            Err(Error::UnsupportedAlgorithm(_))
        ));

        std::env::set_var("PIIGUARD_TEST_CFG_BAD_UUID_DERIVER_KEY", "not-a-uuid");
        assert!(matches!(
            CryptoConfig::from_env_with_prefix("PIIGUARD_TEST_CFG_BAD_UUID"),
            Err(Error::Derivation(_))
        ));
    }

    #[test]
    fn test_builders() {
        let config = CryptoConfig::default()
            .with_cipher_mode(CipherMode::Cfb)
            .with_deriver_identity("deriver");
        assert_eq!(config.cipher_mode, CipherMode::Cfb);
        assert_eq!(config.deriver_identity.as_bytes(), b"deriver");
    }
}
