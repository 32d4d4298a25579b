//! Master keysets and the primitive construction seam.
//!
//! A [`Keyset`] holds one master secret and a constructor that turns raw key
//! bytes into a live primitive. The constructor is validated against the
//! master key once, when the keyset is created.

use crate::error::Error;
use secrecy::{ExposeSecret, SecretVec};
use std::fmt;

/// The closed set of primitive families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// AES encryption (CBC, CFB or GCM)
    Aead,
    /// HMAC-SHA256 digest and verification
    Mac,
    /// Truncated HMAC-SHA256 for indexed equality columns
    BlindIndex,
}

impl PrimitiveKind {
    /// Label mixed into key derivation so that families never share keys.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Aead => "aead",
            Self::Mac => "mac",
            Self::BlindIndex => "bidx",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A cryptographic object bound to exactly one key.
pub trait Primitive: Sized {
    /// Family this primitive belongs to.
    const KIND: PrimitiveKind;
}

/// Builds a primitive from raw key bytes.
pub type Constructor<P> = fn(&[u8]) -> Result<P, Error>;

/// Anything that can hand out a primitive on demand.
///
/// Column values hold one of these and ask it for a primitive on every
/// encode or decode.
pub trait PrimitiveSource {
    /// The primitive produced.
    type Primitive;

    /// Returns a primitive ready for use.
    ///
    /// # Errors
    ///
    /// Returns whatever error construction or derivation reports, including
    /// `Error::NotConfigured` when the feature has no key.
    fn primitive(&self) -> Result<Self::Primitive, Error>;
}

impl<S: PrimitiveSource + ?Sized> PrimitiveSource for &S {
    type Primitive = S::Primitive;

    fn primitive(&self) -> Result<Self::Primitive, Error> {
        (**self).primitive()
    }
}

// An absent source is a disabled feature: it fails on first use rather than
// at construction time.
impl<S> PrimitiveSource for Option<S>
where
    S: PrimitiveSource,
    S::Primitive: Primitive,
{
    type Primitive = S::Primitive;

    fn primitive(&self) -> Result<Self::Primitive, Error> {
        self.as_ref()
            .ok_or(Error::NotConfigured(<S::Primitive as Primitive>::KIND))?
            .primitive()
    }
}

/// A master key plus the constructor for its primitive.
///
/// # Example
///
/// ```
/// use piiguard::keyset::Keyset;
/// use piiguard::mac::MacPrimitive;
/// use secrecy::SecretVec;
///
/// let keyset = Keyset::new(SecretVec::new(vec![7u8; 32]), MacPrimitive::new).unwrap();
/// let mac = keyset.primitive().unwrap();
/// assert_eq!(mac.compute(b"value").len(), 32);
/// ```
pub struct Keyset<P: Primitive> {
    master_key: SecretVec<u8>,
    constructor: Constructor<P>,
}

impl<P: Primitive> Keyset<P> {
    /// Creates a keyset after checking that `constructor` accepts the master key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if the raw key fails primitive-specific
    /// validation (for example an HMAC key shorter than 32 bytes).
    pub fn new(master_key: SecretVec<u8>, constructor: Constructor<P>) -> Result<Self, Error> {
        constructor(master_key.expose_secret()).map_err(|e| match e {
            Error::InvalidKey(msg) => Error::InvalidKey(msg),
            other => Error::InvalidKey(other.to_string()),
        })?;

        tracing::debug!(kind = %P::KIND, key_len = master_key.expose_secret().len(), "keyset created");

        Ok(Self { master_key, constructor })
    }

    /// Builds a primitive from the stored master key.
    ///
    /// # Errors
    ///
    /// Returns the constructor's error.
    pub fn primitive(&self) -> Result<P, Error> {
        (self.constructor)(self.master_key.expose_secret())
    }

    /// Builds a primitive from an arbitrary key without touching the keyset.
    ///
    /// # Errors
    ///
    /// Returns the constructor's error, typically `Error::InvalidKey`.
    pub fn primitive_with_key(&self, key: &[u8]) -> Result<P, Error> {
        (self.constructor)(key)
    }

    /// Master key length in bytes.
    #[must_use]
    pub fn key_len(&self) -> usize {
        self.master_key.expose_secret().len()
    }

    pub(crate) fn master_key(&self) -> &SecretVec<u8> {
        &self.master_key
    }
}

impl<P: Primitive> PrimitiveSource for Keyset<P> {
    type Primitive = P;

    fn primitive(&self) -> Result<P, Error> {
        Self::primitive(self)
    }
}

impl<P: Primitive> Clone for Keyset<P> {
    fn clone(&self) -> Self {
        Self {
            master_key: SecretVec::new(self.master_key.expose_secret().clone()),
            constructor: self.constructor,
        }
    }
}

impl<P: Primitive> fmt::Debug for Keyset<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyset")
            .field("kind", &P::KIND)
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead::AeadPrimitive;
    use crate::mac::MacPrimitive;

    #[test]
    fn test_mac_keyset_rejects_short_key() {
        let result = Keyset::new(SecretVec::new(vec![1u8; 31]), MacPrimitive::new);
        assert!(matches!(result, Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_mac_keyset_accepts_32_byte_key() {
        let keyset = Keyset::new(SecretVec::new(vec![1u8; 32]), MacPrimitive::new).unwrap();
        assert_eq!(keyset.key_len(), 32);
        assert!(keyset.primitive().is_ok());
    }

    #[test]
    fn test_aead_keyset_rejects_odd_key_size() {
        let result = Keyset::new(SecretVec::new(vec![1u8; 20]), AeadPrimitive::gcm);
        assert!(matches!(result, Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_primitive_with_key_does_not_use_master() {
        let keyset = Keyset::new(SecretVec::new(vec![1u8; 32]), MacPrimitive::new).unwrap();

        let from_master = keyset.primitive().unwrap().compute(b"x");
        let from_other = keyset.primitive_with_key(&[2u8; 32]).unwrap().compute(b"x");

        assert_ne!(from_master, from_other);
        assert!(matches!(keyset.primitive_with_key(&[2u8; 8]), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_absent_source_reports_not_configured() {
        let source: Option<Keyset<MacPrimitive>> = None;
        assert!(matches!(source.primitive(), Err(Error::NotConfigured(PrimitiveKind::Mac))));
    }

    #[test]
    fn test_debug_redacts_master_key() {
        let keyset = Keyset::new(SecretVec::new(vec![9u8; 32]), MacPrimitive::new).unwrap();
        let debug = format!("{keyset:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("9, 9"));
    }
}
