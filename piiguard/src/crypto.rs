//! High-level entry point tying keys, configuration and the heap together.

use crate::aead::AeadPrimitive;
use crate::blind_index::BlindIndexPrimitive;
use crate::column::{AeadValue, BlindIndexValue, ColumnValue, MacValue};
use crate::config::CryptoConfig;
use crate::convert::ColumnType;
use crate::derivable::{Bound, DerivableKeyset};
use crate::error::Error;
use crate::heap::{self, HeapIndex, HeapStore, IndexPredicate};
use crate::identity::Identity;
use crate::key_provider::{KeyProvider, KeyPurpose};
use crate::keyset::{Constructor, Keyset, Primitive, PrimitiveKind, PrimitiveSource};
use crate::mac::MacPrimitive;
use crate::tokenizer::Tokenizer;
use std::fmt;

/// Field-level encryption for one application.
///
/// Built once at startup from a [`KeyProvider`] and a [`CryptoConfig`], then
/// shared (it is `Send + Sync`). A primitive family whose key is absent stays
/// disabled: construction succeeds and every use of that family fails with
/// `Error::NotConfigured`.
///
/// # Example
///
/// ```
/// use piiguard::config::CryptoConfig;
/// use piiguard::crypto::FieldCrypto;
/// use piiguard::heap::MemoryHeapStore;
/// use piiguard::key_provider::{KeyPurpose, StaticKeyProvider};
///
/// let keys = StaticKeyProvider::new()
///     .with_key(KeyPurpose::Aead, vec![1u8; 32])
///     .with_key(KeyPurpose::Mac, vec![2u8; 32]);
/// let crypto = FieldCrypto::new(&keys, CryptoConfig::default()).unwrap();
///
/// let stored = crypto.seal("row-1", "Jane Doe".to_string()).unwrap();
/// assert_eq!(crypto.open::<String>("row-1", &stored).unwrap(), "Jane Doe");
///
/// let store = MemoryHeapStore::new();
/// let index = crypto.build_heap("Jane Doe", "name_text_heap").unwrap();
/// crypto.save_to_heap(&store, &index.entries).unwrap();
/// let hashes = crypto.search_contents(&store, "name_text_heap", "jan").unwrap();
/// assert_eq!(hashes.len(), 1);
/// ```
pub struct FieldCrypto {
    aead: Option<DerivableKeyset<AeadPrimitive>>,
    mac: Option<DerivableKeyset<MacPrimitive>>,
    blind_index: Option<DerivableKeyset<BlindIndexPrimitive>>,
    config: CryptoConfig,
    tokenizer: Tokenizer,
}

impl FieldCrypto {
    /// Loads every master key from `provider`.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyProvider` if a key cannot be loaded and
    /// `Error::InvalidKey` if a present key is rejected by its primitive
    /// (for example a MAC key shorter than 32 bytes).
    pub fn new<P: KeyProvider + ?Sized>(provider: &P, config: CryptoConfig) -> Result<Self, Error> {
        let aead = load(provider, KeyPurpose::Aead, config.cipher_mode.constructor())?;
        let mac = load(provider, KeyPurpose::Mac, MacPrimitive::new)?;
        let blind_index = load(provider, KeyPurpose::BlindIndex, BlindIndexPrimitive::new)?;

        tracing::debug!(
            cipher_mode = %config.cipher_mode,
            aead = aead.is_some(),
            mac = mac.is_some(),
            blind_index = blind_index.is_some(),
            "field crypto initialized"
        );

        Ok(Self { aead, mac, blind_index, config, tokenizer: Tokenizer::default() })
    }

    /// Replaces the heap tokenizer.
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Configuration this instance was built with.
    #[must_use]
    pub const fn config(&self) -> &CryptoConfig {
        &self.config
    }

    /// Tokenizer used for heap entries.
    #[must_use]
    pub const fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Returns `true` if `kind` has a key.
    #[must_use]
    pub const fn is_configured(&self, kind: PrimitiveKind) -> bool {
        match kind {
            PrimitiveKind::Aead => self.aead.is_some(),
            PrimitiveKind::Mac => self.mac.is_some(),
            PrimitiveKind::BlindIndex => self.blind_index.is_some(),
        }
    }

    /// Encryption source bound to `identity`.
    #[must_use]
    pub fn aead(&self, identity: impl Into<Identity>) -> Bound<'_, AeadPrimitive> {
        Bound::new(self.aead.as_ref(), identity)
    }

    /// HMAC source bound to `identity`.
    #[must_use]
    pub fn mac(&self, identity: impl Into<Identity>) -> Bound<'_, MacPrimitive> {
        Bound::new(self.mac.as_ref(), identity)
    }

    /// Blind index source bound to `identity`.
    #[must_use]
    pub fn blind_index(&self, identity: impl Into<Identity>) -> Bound<'_, BlindIndexPrimitive> {
        Bound::new(self.blind_index.as_ref(), identity)
    }

    /// Encrypted column value; `identity` is also the associated data.
    #[must_use]
    pub fn aead_value<V>(&self, identity: impl Into<Identity>, value: V) -> AeadValue<'_, V> {
        let identity = identity.into();
        ColumnValue::new(self.aead(&identity), value, identity)
    }

    /// HMAC column value.
    #[must_use]
    pub fn mac_value<V>(&self, identity: impl Into<Identity>, value: V) -> MacValue<'_, V> {
        let identity = identity.into();
        ColumnValue::new(self.mac(&identity), value, identity)
    }

    /// Blind index column value.
    #[must_use]
    pub fn blind_index_value<V>(
        &self,
        identity: impl Into<Identity>,
        value: V,
    ) -> BlindIndexValue<'_, V> {
        let identity = identity.into();
        ColumnValue::new(self.blind_index(&identity), value, identity)
    }

    /// Encrypts `value` for the row `identity`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConfigured` without an AEAD key, `Error::Derivation`
    /// for an empty identity, or the cipher's error.
    pub fn seal<V: ColumnType>(&self, identity: impl Into<Identity>, value: V) -> Result<String, Error> {
        self.aead_value(identity, value).encode()
    }

    /// Decrypts a value sealed for the row `identity`.
    ///
    /// # Errors
    ///
    /// Returns `Error::AuthenticationFailed` or `Error::Decryption` when the
    /// identity or key does not match, and `Error::Decode` when the stored
    /// text or plaintext is malformed.
    pub fn open<V: ColumnType>(&self, identity: impl Into<Identity>, stored: &str) -> Result<V, Error> {
        let identity = identity.into();
        ColumnValue::<V, _>::decode(self.aead(&identity), &stored.to_owned(), &identity)
            .map(ColumnValue::into_value)
    }

    /// The 8-hex-character digest used for heap tokens.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConfigured` without a MAC key.
    pub fn hash_string(&self, value: &str) -> Result<String, Error> {
        Ok(self.heap_mac()?.compute_short(value.as_bytes()))
    }

    /// Tokenizes `value` and hashes its tokens for `table`.
    ///
    /// Token digests use the deriver identity (or the MAC master key when no
    /// deriver identity is configured) so that equal tokens hash equally
    /// across rows.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConfigured` without a MAC key and
    /// `Error::InvalidTableName` for a bad table name.
    pub fn build_heap(&self, value: &str, table: &str) -> Result<HeapIndex, Error> {
        heap::build_heap_entries(&self.heap_mac()?, self.tokenizer.tokenize(value), table)
    }

    /// Like [`FieldCrypto::build_heap`] but with digests scoped to `identity`,
    /// for heaps partitioned per tenant.
    ///
    /// # Errors
    ///
    /// As [`FieldCrypto::build_heap`], plus `Error::Derivation` for an empty
    /// identity.
    pub fn build_heap_for(
        &self,
        identity: impl Into<Identity>,
        value: &str,
        table: &str,
    ) -> Result<HeapIndex, Error> {
        let mac = self.mac(identity).primitive()?;
        heap::build_heap_entries(&mac, self.tokenizer.tokenize(value), table)
    }

    /// Writes new heap entries. Returns the number inserted.
    ///
    /// # Errors
    ///
    /// See [`heap::save_to_heap`].
    pub fn save_to_heap<S: HeapStore + ?Sized>(
        &self,
        store: &S,
        entries: &[heap::HeapEntry],
    ) -> Result<usize, Error> {
        heap::save_to_heap(store, entries)
    }

    /// Distinct digests of heap tokens in `table` containing `pattern`.
    ///
    /// # Errors
    ///
    /// See [`heap::search_by_substring`].
    pub fn search_contents<S: HeapStore + ?Sized>(
        &self,
        store: &S,
        table: &str,
        pattern: &str,
    ) -> Result<Vec<String>, Error> {
        heap::search_by_substring(store, table, pattern)
    }

    /// Heap search followed by the `*_bidx` predicate over `column`.
    ///
    /// Returns `None` when no heap token matches.
    ///
    /// # Errors
    ///
    /// See [`heap::search_by_substring`].
    pub fn search_predicate<S: HeapStore + ?Sized>(
        &self,
        store: &S,
        table: &str,
        pattern: &str,
        column: &str,
    ) -> Result<Option<IndexPredicate>, Error> {
        let digests = self.search_contents(store, table, pattern)?;
        Ok(IndexPredicate::any_of(column, &digests))
    }

    fn heap_mac(&self) -> Result<MacPrimitive, Error> {
        let keyset = self.mac.as_ref().ok_or(Error::NotConfigured(PrimitiveKind::Mac))?;
        if self.config.deriver_identity.is_empty() {
            keyset.keyset().primitive()
        } else {
            keyset.primitive_for(self.config.deriver_identity.as_bytes())
        }
    }
}

fn load<P: Primitive, K: KeyProvider + ?Sized>(
    provider: &K,
    purpose: KeyPurpose,
    constructor: Constructor<P>,
) -> Result<Option<DerivableKeyset<P>>, Error> {
    let Some(master) = provider.master_key(purpose)? else {
        tracing::warn!(kind = %purpose.kind(), "no key configured, feature disabled");
        return Ok(None);
    };
    Ok(Some(DerivableKeyset::new(Keyset::new(master, constructor)?)))
}

impl fmt::Debug for FieldCrypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCrypto")
            .field("aead", &self.aead.is_some())
            .field("mac", &self.mac.is_some())
            .field("blind_index", &self.blind_index.is_some())
            .field("config", &self.config)
            .field("tokenizer", &self.tokenizer)
            .finish()
    }
}
