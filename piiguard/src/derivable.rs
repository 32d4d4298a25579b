//! Per-identity key derivation on top of a [`Keyset`].

use crate::error::Error;
use crate::identity::Identity;
use crate::kdf::derive_key;
use crate::keyset::{Keyset, Primitive, PrimitiveSource};
use secrecy::ExposeSecret;

/// Wraps a [`Keyset`] and derives a distinct primitive for every identity.
///
/// Derived keys have the same length as the master key, so an AES-128 master
/// yields AES-128 sub-keys and a 32-byte HMAC master yields 32-byte sub-keys.
/// Nothing is cached: each call derives afresh, which keeps the keyset free of
/// mutable state and safe to share across threads.
///
/// # Example
///
/// ```
/// use piiguard::derivable::DerivableKeyset;
/// use piiguard::keyset::Keyset;
/// use piiguard::aead::AeadPrimitive;
/// use secrecy::SecretVec;
///
/// let keyset = Keyset::new(SecretVec::new(vec![3u8; 32]), AeadPrimitive::gcm).unwrap();
/// let derivable = DerivableKeyset::new(keyset);
///
/// let aead = derivable.primitive_for(b"row-42").unwrap();
/// let sealed = aead.seal(b"secret", b"row-42").unwrap();
/// assert_eq!(aead.open(&sealed, b"row-42").unwrap(), b"secret");
/// ```
#[derive(Debug, Clone)]
pub struct DerivableKeyset<P: Primitive> {
    keyset: Keyset<P>,
}

impl<P: Primitive> DerivableKeyset<P> {
    /// Creates a derivable keyset from a validated base keyset.
    #[must_use]
    pub const fn new(keyset: Keyset<P>) -> Self {
        Self { keyset }
    }

    /// Returns the underlying keyset.
    #[must_use]
    pub const fn keyset(&self) -> &Keyset<P> {
        &self.keyset
    }

    /// Derives the sub-key for `identity` and returns a primitive bound to it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Derivation` if `identity` is empty or if the derived
    /// key is rejected by the primitive constructor.
    pub fn primitive_for(&self, identity: &[u8]) -> Result<P, Error> {
        let master = self.keyset.master_key();
        let derived = derive_key(master, P::KIND, identity, master.expose_secret().len())?;

        self.keyset
            .primitive_with_key(derived.expose_secret())
            .map_err(|e| Error::Derivation(format!("derived {} key rejected: {e}", P::KIND)))
    }

    /// Returns a source that derives for `identity` each time it is asked.
    #[must_use]
    pub fn bind(&self, identity: impl Into<Identity>) -> Bound<'_, P> {
        Bound { keyset: Some(self), identity: identity.into() }
    }
}

/// A primitive source fixed to one identity.
///
/// Holding `None` instead of a keyset models a feature that has no key
/// configured: the source can be built and passed around, and fails with
/// `Error::NotConfigured` only when a primitive is requested.
#[derive(Debug, Clone)]
pub struct Bound<'a, P: Primitive> {
    keyset: Option<&'a DerivableKeyset<P>>,
    identity: Identity,
}

impl<'a, P: Primitive> Bound<'a, P> {
    /// Binds an optional keyset to `identity`.
    #[must_use]
    pub fn new(keyset: Option<&'a DerivableKeyset<P>>, identity: impl Into<Identity>) -> Self {
        Self { keyset, identity: identity.into() }
    }

    /// Identity this source derives for.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns `true` when a keyset is present.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.keyset.is_some()
    }
}

impl<P: Primitive> PrimitiveSource for Bound<'_, P> {
    type Primitive = P;

    fn primitive(&self) -> Result<P, Error> {
        self.keyset
            .ok_or(Error::NotConfigured(P::KIND))?
            .primitive_for(self.identity.as_bytes())
    }
}
