//! Key derivation using HKDF (HMAC-based Key Derivation Function).
//!
//! Sub-keys are derived from a master key using HKDF with SHA-256. The
//! primitive family label and the identity bytes form the `info` parameter,
//! so the same master never yields the same sub-key for two identities or
//! for two primitive families.

use crate::error::Error;
use crate::keyset::PrimitiveKind;
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretVec};
use sha2::Sha256;

/// Domain separation prefix for every derived key.
const INFO_PREFIX: &[u8] = b"piiguard/v1/";

/// Standard key size in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Derives a sub-key of `len` bytes bound to `identity`.
///
/// The `info` parameter is `piiguard/v1/<kind>/<identity>`.
///
/// # Errors
///
/// Returns `Error::Derivation` if `identity` is empty or if `len` exceeds
/// what HKDF-SHA256 can produce (8160 bytes).
///
/// # Example
///
/// ```
/// use piiguard::kdf::derive_key;
/// use piiguard::keyset::PrimitiveKind;
/// use secrecy::{ExposeSecret, SecretVec};
///
/// let master = SecretVec::new(vec![0u8; 32]);
/// let key = derive_key(&master, PrimitiveKind::Aead, b"row-1", 32).expect("derivation failed");
/// assert_eq!(key.expose_secret().len(), 32);
/// ```
pub fn derive_key(
    master: &SecretVec<u8>,
    kind: PrimitiveKind,
    identity: &[u8],
    len: usize,
) -> Result<SecretVec<u8>, Error> {
    if identity.is_empty() {
        return Err(Error::Derivation("identity must not be empty".to_string()));
    }

    let hkdf = Hkdf::<Sha256>::new(None, master.expose_secret());

    let label = kind.label().as_bytes();
    let mut info = Vec::with_capacity(INFO_PREFIX.len() + label.len() + 1 + identity.len());
    info.extend_from_slice(INFO_PREFIX);
    info.extend_from_slice(label);
    info.push(b'/');
    info.extend_from_slice(identity);

    let mut key = vec![0u8; len];
    hkdf.expand(&info, &mut key)
        .map_err(|_| Error::Derivation(format!("cannot expand {len} bytes")))?;

    Ok(SecretVec::new(key))
}

/// Generates `len` random bytes of key material.
///
/// # Example
///
/// ```
/// use piiguard::kdf::generate_key;
/// use secrecy::ExposeSecret;
///
/// let key = generate_key(32);
/// assert_eq!(key.expose_secret().len(), 32);
/// ```
#[must_use]
pub fn generate_key(len: usize) -> SecretVec<u8> {
    use aes_gcm::aead::{rand_core::RngCore, OsRng};

    let mut key = vec![0u8; len];
    OsRng.fill_bytes(&mut key);
    SecretVec::new(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let master = SecretVec::new(vec![1u8; 32]);

        let key1 = derive_key(&master, PrimitiveKind::Aead, b"tenant_123", KEY_SIZE).unwrap();
        let key2 = derive_key(&master, PrimitiveKind::Aead, b"tenant_123", KEY_SIZE).unwrap();

        assert_eq!(key1.expose_secret(), key2.expose_secret());
    }

    #[test]
    fn test_derive_key_different_identities() {
        let master = SecretVec::new(vec![1u8; 32]);

        let key1 = derive_key(&master, PrimitiveKind::Aead, b"row_1", KEY_SIZE).unwrap();
        let key2 = derive_key(&master, PrimitiveKind::Aead, b"row_2", KEY_SIZE).unwrap();

        assert_ne!(key1.expose_secret(), key2.expose_secret());
    }

    #[test]
    fn test_derive_key_different_kinds() {
        let master = SecretVec::new(vec![1u8; 32]);

        let mac = derive_key(&master, PrimitiveKind::Mac, b"row_1", KEY_SIZE).unwrap();
        let bidx = derive_key(&master, PrimitiveKind::BlindIndex, b"row_1", KEY_SIZE).unwrap();

        assert_ne!(mac.expose_secret(), bidx.expose_secret());
    }

    #[test]
    fn test_derive_key_with_different_masters() {
        let master1 = SecretVec::new(vec![1u8; 32]);
        let master2 = SecretVec::new(vec![2u8; 32]);

        let key1 = derive_key(&master1, PrimitiveKind::Mac, b"row_1", KEY_SIZE).unwrap();
        let key2 = derive_key(&master2, PrimitiveKind::Mac, b"row_1", KEY_SIZE).unwrap();

        assert_ne!(key1.expose_secret(), key2.expose_secret());
    }

    #[test]
    fn test_derive_key_empty_identity_fails() {
        let master = SecretVec::new(vec![1u8; 32]);
        let result = derive_key(&master, PrimitiveKind::Aead, b"", KEY_SIZE);

        assert!(matches!(result, Err(Error::Derivation(_))));
    }

    #[test]
    fn test_derive_key_output_length_follows_request() {
        let master = SecretVec::new(vec![42u8; 16]);

        let key = derive_key(&master, PrimitiveKind::Aead, b"row", 16).unwrap();
        assert_eq!(key.expose_secret().len(), 16);

        let too_long = derive_key(&master, PrimitiveKind::Aead, b"row", 255 * 32 + 1);
        assert!(matches!(too_long, Err(Error::Derivation(_))));
    }

    #[test]
    fn test_generate_key() {
        let key1 = generate_key(KEY_SIZE);
        let key2 = generate_key(KEY_SIZE);

        assert_ne!(key1.expose_secret(), key2.expose_secret());
        assert_eq!(key1.expose_secret().len(), KEY_SIZE);
    }

    // RFC 5869 Test Vector (using HKDF-SHA256)
    // https://tools.ietf.org/html/rfc5869#appendix-A.1
    #[test]
    fn test_hkdf_rfc5869_test_case_1() {
        const IKM_HEX: &str = "0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b";
        const SALT_HEX: &str = "000102030405060708090a0b0c";
        const INFO_HEX: &str = "f0f1f2f3f4f5f6f7f8f9";
        const EXPECTED_OKM_HEX: &str =
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865";

        let ikm = hex::decode(IKM_HEX).unwrap();
        let salt = hex::decode(SALT_HEX).unwrap();
        let info = hex::decode(INFO_HEX).unwrap();
        let expected_okm = hex::decode(EXPECTED_OKM_HEX).unwrap();

        let hkdf = Hkdf::<Sha256>::new(Some(&salt), &ikm);
        let mut okm = vec![0u8; 42];
        hkdf.expand(&info, &mut okm).expect("HKDF expand failed");

        assert_eq!(okm, expected_okm);
    }
}
