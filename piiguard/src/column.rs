//! Typed column values.
//!
//! A [`ColumnValue`] wraps one plaintext value together with the source of
//! its primitive and the associated data (normally the row identity). The
//! primitive family decides what "encode" means:
//!
//! | Primitive               | Stored form           | Read path            |
//! |-------------------------|-----------------------|----------------------|
//! | [`AeadPrimitive`]       | hex string            | `decode` (decrypt)   |
//! | [`MacPrimitive`]        | raw 32-byte digest    | `verify`             |
//! | [`BlindIndexPrimitive`] | 8-digit string        | `verify`             |
//!
//! The codec is fixed by the type of the source, so choosing the wrong read
//! path for a column is a compile error rather than a runtime check.
//!
//! # Example
//!
//! ```
//! use piiguard::aead::AeadPrimitive;
//! use piiguard::column::ColumnValue;
//! use piiguard::derivable::DerivableKeyset;
//! use piiguard::keyset::Keyset;
//! use secrecy::SecretVec;
//!
//! let keyset = Keyset::new(SecretVec::new(vec![1u8; 32]), AeadPrimitive::gcm).unwrap();
//! let aead = DerivableKeyset::new(keyset);
//!
//! let stored = ColumnValue::new(aead.bind("row-1"), 42i64, "row-1").encode().unwrap();
//! let read = ColumnValue::<i64, _>::decode(aead.bind("row-1"), &stored, "row-1").unwrap();
//! assert_eq!(*read.value(), 42);
//! ```

use crate::aead::AeadPrimitive;
use crate::blind_index::BlindIndexPrimitive;
use crate::convert::{ColumnType, Json};
use crate::derivable::Bound;
use crate::error::Error;
use crate::keyset::{Primitive, PrimitiveSource};
use crate::mac::MacPrimitive;
use chrono::{DateTime, Utc};
use std::fmt;
use zeroize::Zeroizing;

/// The write half of a column codec.
pub trait Codec: Primitive {
    /// Storage representation produced by this codec.
    type Stored;

    /// Turns canonical value bytes into their storage form.
    ///
    /// # Errors
    ///
    /// Returns the primitive's encryption error, if any.
    fn encode(&self, bytes: &[u8], associated_data: &[u8]) -> Result<Self::Stored, Error>;
}

/// Codecs whose storage form can be turned back into the value.
pub trait Reversible: Codec {
    /// Recovers canonical value bytes from the storage form.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode`, `Error::Decryption` or
    /// `Error::AuthenticationFailed` from the primitive.
    fn decode(&self, stored: &Self::Stored, associated_data: &[u8]) -> Result<Vec<u8>, Error>;
}

/// One-way codecs that can only check a value against its storage form.
pub trait Verifiable: Codec {
    /// Checks that `stored` was produced from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Integrity` on mismatch.
    fn verify(&self, bytes: &[u8], associated_data: &[u8], stored: &Self::Stored)
        -> Result<(), Error>;
}

impl Codec for AeadPrimitive {
    type Stored = String;

    fn encode(&self, bytes: &[u8], associated_data: &[u8]) -> Result<String, Error> {
        self.seal(bytes, associated_data)
    }
}

impl Reversible for AeadPrimitive {
    fn decode(&self, stored: &String, associated_data: &[u8]) -> Result<Vec<u8>, Error> {
        self.open(stored, associated_data)
    }
}

impl Codec for MacPrimitive {
    type Stored = Vec<u8>;

    fn encode(&self, bytes: &[u8], _associated_data: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(self.compute(bytes))
    }
}

impl Verifiable for MacPrimitive {
    fn verify(&self, bytes: &[u8], _associated_data: &[u8], stored: &Vec<u8>) -> Result<(), Error> {
        Self::verify(self, bytes, stored)
    }
}

impl Codec for BlindIndexPrimitive {
    type Stored = String;

    fn encode(&self, bytes: &[u8], _associated_data: &[u8]) -> Result<String, Error> {
        Ok(self.compute(bytes))
    }
}

impl Verifiable for BlindIndexPrimitive {
    fn verify(&self, bytes: &[u8], _associated_data: &[u8], stored: &String) -> Result<(), Error> {
        Self::verify(self, bytes, stored)
    }
}

type StoredOf<S> = <<S as PrimitiveSource>::Primitive as Codec>::Stored;

/// A plaintext value bound to a primitive source and associated data.
///
/// Build one per read or write. The value holds per-call associated data and
/// is not meant to be shared between concurrent operations.
pub struct ColumnValue<V, S> {
    source: S,
    value: V,
    associated_data: Vec<u8>,
}

impl<V, S> ColumnValue<V, S> {
    /// Wraps `value` for encoding with primitives from `source`.
    pub fn new(source: S, value: V, associated_data: impl AsRef<[u8]>) -> Self {
        Self { source, value, associated_data: associated_data.as_ref().to_vec() }
    }

    /// The wrapped plaintext value.
    pub const fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the wrapper and returns the plaintext value.
    pub fn into_value(self) -> V {
        self.value
    }

    /// The associated data bound into encryption.
    pub fn associated_data(&self) -> &[u8] {
        &self.associated_data
    }

    /// The primitive source.
    pub const fn source(&self) -> &S {
        &self.source
    }
}

impl<V, S> ColumnValue<V, S>
where
    V: ColumnType,
    S: PrimitiveSource,
    S::Primitive: Codec,
{
    /// Produces the storage form of the value.
    ///
    /// # Errors
    ///
    /// Fails with whatever the source reports (including
    /// `Error::NotConfigured`), with `Error::Decode` if the value has no
    /// canonical encoding, or with the codec's error.
    pub fn encode(&self) -> Result<StoredOf<S>, Error> {
        let primitive = self.source.primitive()?;
        let bytes = Zeroizing::new(self.value.to_bytes()?);
        primitive.encode(&bytes, &self.associated_data)
    }
}

impl<V, S> ColumnValue<V, S>
where
    V: ColumnType,
    S: PrimitiveSource,
    S::Primitive: Reversible,
{
    /// Reads a value back from its storage form.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the stored form or the decrypted bytes
    /// cannot be interpreted, and `Error::Decryption` or
    /// `Error::AuthenticationFailed` from the cipher.
    pub fn decode(
        source: S,
        stored: &StoredOf<S>,
        associated_data: impl AsRef<[u8]>,
    ) -> Result<Self, Error> {
        let associated_data = associated_data.as_ref().to_vec();
        let primitive = source.primitive()?;
        let bytes = Zeroizing::new(primitive.decode(stored, &associated_data)?);
        let value = V::from_bytes(&bytes)?;
        Ok(Self { source, value, associated_data })
    }

    /// Replaces the wrapped value with one read from `stored`.
    ///
    /// On error the current value is left untouched.
    ///
    /// # Errors
    ///
    /// Same as [`ColumnValue::decode`].
    pub fn decode_in_place(&mut self, stored: &StoredOf<S>) -> Result<(), Error> {
        let primitive = self.source.primitive()?;
        let bytes = Zeroizing::new(primitive.decode(stored, &self.associated_data)?);
        self.value = V::from_bytes(&bytes)?;
        Ok(())
    }
}

impl<V, S> ColumnValue<V, S>
where
    V: ColumnType,
    S: PrimitiveSource,
    S::Primitive: Verifiable,
{
    /// Checks the wrapped value against a stored digest or index.
    ///
    /// # Errors
    ///
    /// Returns `Error::Integrity` on mismatch, or the source's error.
    pub fn verify(&self, stored: &StoredOf<S>) -> Result<(), Error> {
        let primitive = self.source.primitive()?;
        let bytes = Zeroizing::new(self.value.to_bytes()?);
        primitive.verify(&bytes, &self.associated_data, stored)
    }
}

impl<V, S> ColumnValue<V, S>
where
    V: ColumnType,
    S: PrimitiveSource<Primitive = MacPrimitive>,
{
    /// The 8-hex-character truncated digest used by heap tokens.
    ///
    /// # Errors
    ///
    /// Returns the source's error or `Error::Decode` from the value encoding.
    pub fn short_digest(&self) -> Result<String, Error> {
        let primitive = self.source.primitive()?;
        let bytes = Zeroizing::new(self.value.to_bytes()?);
        Ok(primitive.compute_short(&bytes))
    }
}

// Plaintext is PII; never print it.
impl<V, S> fmt::Debug for ColumnValue<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnValue")
            .field("type", &std::any::type_name::<V>())
            .field("value", &"[REDACTED]")
            .field("associated_data_len", &self.associated_data.len())
            .finish()
    }
}

/// Encrypted column bound to an identity.
pub type AeadValue<'a, V> = ColumnValue<V, Bound<'a, AeadPrimitive>>;
/// HMAC column bound to an identity.
pub type MacValue<'a, V> = ColumnValue<V, Bound<'a, MacPrimitive>>;
/// Blind index column bound to an identity.
pub type BlindIndexValue<'a, V> = ColumnValue<V, Bound<'a, BlindIndexPrimitive>>;

/// Encrypted text column.
pub type AeadString<'a> = AeadValue<'a, String>;
/// Encrypted boolean column.
pub type AeadBool<'a> = AeadValue<'a, bool>;
/// Encrypted integer column.
pub type AeadInt64<'a> = AeadValue<'a, i64>;
/// Encrypted floating point column.
pub type AeadFloat64<'a> = AeadValue<'a, f64>;
/// Encrypted UTC timestamp column.
pub type AeadTime<'a> = AeadValue<'a, DateTime<Utc>>;
/// Encrypted binary column.
pub type AeadBytes<'a> = AeadValue<'a, Vec<u8>>;
/// Encrypted column holding the JSON form of `T`.
pub type AeadJson<'a, T> = AeadValue<'a, Json<T>>;
/// HMAC digest of a text column.
pub type MacString<'a> = MacValue<'a, String>;
/// Blind index of a text column.
pub type BlindIndexString<'a> = BlindIndexValue<'a, String>;
