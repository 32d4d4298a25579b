//! # `piiguard`
//!
//! Field-level encryption for database columns holding personal data.
//!
//! ## Features
//!
//! - Per-identity key derivation (HKDF-SHA256) from one master key per family
//! - AES-GCM, AES-CBC and AES-CFB column encryption
//! - HMAC-SHA256 digests and 8-digit blind indexes for equality lookup
//! - Typed column values with canonical byte encodings
//! - Heap side tables for substring search over encrypted values
//!
//! ## Example
//!
//! ```
//! use piiguard::prelude::*;
//!
//! let keys = StaticKeyProvider::new()
//!     .with_key(KeyPurpose::Aead, vec![7u8; 32])
//!     .with_key(KeyPurpose::BlindIndex, vec![8u8; 32]);
//! let crypto = FieldCrypto::new(&keys, CryptoConfig::default())?;
//!
//! let ciphertext = crypto.seal("row-1", "alice@example.com".to_string())?;
//! let plaintext: String = crypto.open("row-1", &ciphertext)?;
//! assert_eq!(plaintext, "alice@example.com");
//!
//! let bidx = crypto.blind_index_value("tenant-1", plaintext).encode()?;
//! assert_eq!(bidx.len(), 8);
//! # Ok::<(), piiguard::Error>(())
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod aead;
pub mod blind_index;
pub mod column;
pub mod config;
pub mod convert;
pub mod crypto;
pub mod derivable;
pub mod error;
pub mod formats;
pub mod heap;
pub mod identity;
pub mod kdf;
pub mod key_provider;
pub mod keyset;
pub mod mac;
pub mod tokenizer;

pub use error::{Error, KeyProviderError};

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::aead::{AeadPrimitive, CipherMode};
    pub use crate::blind_index::BlindIndexPrimitive;
    pub use crate::column::{
        AeadValue, BlindIndexValue, Codec, ColumnValue, MacValue, Reversible, Verifiable,
    };
    pub use crate::config::CryptoConfig;
    pub use crate::convert::{ColumnType, Json};
    pub use crate::crypto::FieldCrypto;
    pub use crate::derivable::{Bound, DerivableKeyset};
    pub use crate::error::{Error, KeyProviderError};
    pub use crate::heap::{HeapEntry, HeapIndex, HeapStore, IndexPredicate, MemoryHeapStore};
    pub use crate::identity::Identity;
    pub use crate::key_provider::{EnvKeyProvider, KeyProvider, KeyPurpose, StaticKeyProvider};
    pub use crate::keyset::{Keyset, Primitive, PrimitiveKind, PrimitiveSource};
    pub use crate::mac::MacPrimitive;
    pub use crate::tokenizer::Tokenizer;
}
