//! Keyed digests (HMAC-SHA256) for integrity columns and heap tokens.

use crate::error::Error;
use crate::keyset::{Primitive, PrimitiveKind};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Minimum HMAC key length in bytes.
pub const MIN_MAC_KEY_SIZE: usize = 32;

/// Full HMAC-SHA256 digest size.
pub const DIGEST_SIZE: usize = 32;

/// Length of the truncated hex digest used for heap tokens.
pub const SHORT_DIGEST_LEN: usize = 8;

/// HMAC-SHA256 bound to one key.
#[derive(Clone)]
pub struct MacPrimitive {
    mac: HmacSha256,
}

impl MacPrimitive {
    /// Creates an HMAC-SHA256 primitive.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if the key is shorter than
    /// [`MIN_MAC_KEY_SIZE`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        check_key_len(key)?;
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| Error::InvalidKey(format!("HMAC key rejected: {e}")))?;
        Ok(Self { mac })
    }

    /// Computes the full 32-byte digest of `data`.
    #[must_use]
    pub fn compute(&self, data: &[u8]) -> Vec<u8> {
        self.mac.clone().chain_update(data).finalize().into_bytes().to_vec()
    }

    /// Verifies `digest` against `data` in constant time.
    ///
    /// # Errors
    ///
    /// Returns `Error::Integrity` on mismatch.
    pub fn verify(&self, data: &[u8], digest: &[u8]) -> Result<(), Error> {
        self.mac.clone().chain_update(data).verify_slice(digest).map_err(|_| Error::Integrity)
    }

    /// Last [`SHORT_DIGEST_LEN`] hex characters of the digest (32 bits).
    ///
    /// This is the digest stored for heap tokens and concatenated into the
    /// owning row's index column.
    #[must_use]
    pub fn compute_short(&self, data: &[u8]) -> String {
        let full = hex::encode(self.compute(data));
        full[full.len() - SHORT_DIGEST_LEN..].to_string()
    }
}

impl Primitive for MacPrimitive {
    const KIND: PrimitiveKind = PrimitiveKind::Mac;
}

impl fmt::Debug for MacPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MacPrimitive(HMAC-SHA256)")
    }
}

pub(crate) fn check_key_len(key: &[u8]) -> Result<(), Error> {
    if key.len() < MIN_MAC_KEY_SIZE {
        return Err(Error::InvalidKey(format!(
            "HMAC key too short: {} bytes (min: {MIN_MAC_KEY_SIZE})",
            key.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac() -> MacPrimitive {
        MacPrimitive::new(&[42u8; 32]).unwrap()
    }

    #[test]
    fn test_key_length_boundary() {
        assert!(matches!(MacPrimitive::new(&[0u8; 31]), Err(Error::InvalidKey(_))));
        assert!(MacPrimitive::new(&[0u8; 32]).is_ok());
        assert!(MacPrimitive::new(&[0u8; 64]).is_ok());
    }

    #[test]
    fn test_compute_deterministic() {
        let mac = mac();
        assert_eq!(mac.compute(b"alice"), mac.compute(b"alice"));
        assert_ne!(mac.compute(b"alice"), mac.compute(b"bob"));
        assert_eq!(mac.compute(b"alice").len(), DIGEST_SIZE);
    }

    #[test]
    fn test_compute_matches_plain_hmac() {
        let key = [42u8; 32];
        let expected = HmacSha256::new_from_slice(&key)
            .unwrap()
            .chain_update(b"alice")
            .finalize()
            .into_bytes()
            .to_vec();

        assert_eq!(mac().compute(b"alice"), expected);
    }

    #[test]
    fn test_verify() {
        let mac = mac();
        let digest = mac.compute(b"alice");

        assert!(mac.verify(b"alice", &digest).is_ok());
        assert!(matches!(mac.verify(b"bob", &digest), Err(Error::Integrity)));
        assert!(matches!(mac.verify(b"alice", &digest[..8]), Err(Error::Integrity)));
    }

    #[test]
    fn test_compute_short_is_digest_suffix() {
        let mac = mac();
        let short = mac.compute_short(b"doe");
        let full = hex::encode(mac.compute(b"doe"));

        assert_eq!(short.len(), SHORT_DIGEST_LEN);
        assert!(full.ends_with(&short));
        assert!(short.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
