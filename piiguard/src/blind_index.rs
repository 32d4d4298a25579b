//! Blind index generation for searchable encryption.
//!
//! Blind indexes allow equality queries on encrypted data without revealing
//! the plaintext value. The index is a short, fixed-width token derived from
//! HMAC-SHA256 so that index columns stay small; the price is a higher
//! collision rate than the full digest, which equality lookups must tolerate
//! by decrypting and comparing candidate rows.

use crate::error::Error;
use crate::keyset::{Primitive, PrimitiveKind};
use crate::mac::check_key_len;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Width of a blind index token in characters.
pub const BLIND_INDEX_LEN: usize = 8;

/// HMAC-SHA256 keyed for blind indexing.
#[derive(Clone)]
pub struct BlindIndexPrimitive {
    mac: HmacSha256,
}

impl BlindIndexPrimitive {
    /// Creates a blind index primitive.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if the key is shorter than 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        check_key_len(key)?;
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| Error::InvalidKey(format!("blind index key rejected: {e}")))?;
        Ok(Self { mac })
    }

    /// Raw decimal rendering of the digest before truncation.
    ///
    /// The trailing eight digest bytes are read as a big-endian `u64`.
    #[must_use]
    pub fn compute_raw(&self, value: &[u8]) -> String {
        let digest = self.mac.clone().chain_update(value).finalize().into_bytes();
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&digest[digest.len() - 8..]);
        u64::from_be_bytes(tail).to_string()
    }

    /// Computes the 8-digit blind index of `value`.
    ///
    /// # Example
    ///
    /// ```
    /// use piiguard::blind_index::BlindIndexPrimitive;
    ///
    /// let bidx = BlindIndexPrimitive::new(&[42u8; 32]).unwrap();
    /// let index = bidx.compute(b"alice@example.com");
    /// assert_eq!(index.len(), 8);
    /// assert_eq!(index, bidx.compute(b"alice@example.com"));
    /// ```
    #[must_use]
    pub fn compute(&self, value: &[u8]) -> String {
        eight_digits(&self.compute_raw(value))
    }

    /// Recomputes the index of `value` and compares it with `index`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Integrity` on mismatch.
    pub fn verify(&self, value: &[u8], index: &str) -> Result<(), Error> {
        if self.compute(value) == index {
            Ok(())
        } else {
            Err(Error::Integrity)
        }
    }
}

impl Primitive for BlindIndexPrimitive {
    const KIND: PrimitiveKind = PrimitiveKind::BlindIndex;
}

impl fmt::Debug for BlindIndexPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlindIndexPrimitive(HMAC-SHA256)")
    }
}

// Left-pads `raw` with '0' to eight characters, then keeps the last eight.
pub(crate) fn eight_digits(raw: &str) -> String {
    let padded = format!("{raw:0>width$}", width = BLIND_INDEX_LEN);
    let skip = padded.chars().count() - BLIND_INDEX_LEN;
    padded.chars().skip(skip).collect()
}
