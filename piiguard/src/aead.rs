//! AES encryption of column values.
//!
//! Three modes are supported, selected when the primitive is constructed:
//!
//! - **GCM**: authenticated; stored as `hex(nonce[12] || ciphertext || tag[16])`.
//!   The associated data is bound into the tag.
//! - **CBC**: PKCS#5 padded, unauthenticated; stored as `hex(iv[16] || ciphertext)`.
//! - **CFB**: full-block CFB stream, unauthenticated; stored as `hex(iv[16] || ciphertext)`.
//!
//! # Security Warning
//!
//! Only GCM detects tampering. CBC and CFB ignore associated data and will
//! happily decrypt modified ciphertext into garbage; pair them with a separate
//! MAC column when integrity matters.

use crate::error::Error;
use crate::keyset::{Constructor, Primitive, PrimitiveKind};
use aes::cipher::{
    block_padding::Pkcs7, AsyncStreamCipher, BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use aes_gcm::{
    aead::{consts::U12, rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    AesGcm, Nonce,
};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Nonce size for AES-GCM (96 bits).
pub const GCM_NONCE_SIZE: usize = 12;

/// Authentication tag size for AES-GCM (128 bits).
pub const GCM_TAG_SIZE: usize = 16;

/// AES block size, also the IV size for CBC and CFB.
pub const BLOCK_SIZE: usize = 16;

/// Runs `$body` with `$cipher` aliased to the AES variant matching the key length.
macro_rules! with_aes {
    ($key:expr, $cipher:ident => $body:block) => {
        match $key.len() {
            16 => {
                type $cipher = aes::Aes128;
                $body
            }
            24 => {
                type $cipher = aes::Aes192;
                $body
            }
            32 => {
                type $cipher = aes::Aes256;
                $body
            }
            other => Err(invalid_key_len(other)),
        }
    };
}

/// Cipher mode for column encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CipherMode {
    /// AES-CBC with PKCS#5 padding.
    Cbc,
    /// AES-CFB (128-bit segments).
    Cfb,
    /// AES-GCM authenticated encryption (default).
    #[default]
    Gcm,
}

impl CipherMode {
    /// Short tag used in configuration (`cbc`, `cfb`, `gcm`).
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Cbc => "cbc",
            Self::Cfb => "cfb",
            Self::Gcm => "gcm",
        }
    }

    /// Whether this mode detects tampering.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Gcm)
    }

    /// Primitive constructor for this mode, for use with [`crate::keyset::Keyset::new`].
    #[must_use]
    pub fn constructor(self) -> Constructor<AeadPrimitive> {
        match self {
            Self::Cbc => AeadPrimitive::cbc,
            Self::Cfb => AeadPrimitive::cfb,
            Self::Gcm => AeadPrimitive::gcm,
        }
    }
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for CipherMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cbc" => Ok(Self::Cbc),
            "cfb" => Ok(Self::Cfb),
            "gcm" => Ok(Self::Gcm),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// An AES key bound to one cipher mode.
///
/// # Example
///
/// ```
/// use piiguard::aead::AeadPrimitive;
///
/// let aead = AeadPrimitive::gcm(&[0x42; 32]).unwrap();
/// let stored = aead.seal(b"alice@example.com", b"row-1").unwrap();
/// assert_eq!(aead.open(&stored, b"row-1").unwrap(), b"alice@example.com");
/// ```
#[derive(Clone)]
pub struct AeadPrimitive {
    key: Zeroizing<Vec<u8>>,
    mode: CipherMode,
}

impl AeadPrimitive {
    /// Creates a primitive for `mode`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` unless the key is 16, 24 or 32 bytes.
    pub fn new(key: &[u8], mode: CipherMode) -> Result<Self, Error> {
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(invalid_key_len(key.len()));
        }
        Ok(Self { key: Zeroizing::new(key.to_vec()), mode })
    }

    /// AES-GCM constructor.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` on a bad key length.
    pub fn gcm(key: &[u8]) -> Result<Self, Error> {
        Self::new(key, CipherMode::Gcm)
    }

    /// AES-CBC constructor.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` on a bad key length.
    pub fn cbc(key: &[u8]) -> Result<Self, Error> {
        Self::new(key, CipherMode::Cbc)
    }

    /// AES-CFB constructor.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` on a bad key length.
    pub fn cfb(key: &[u8]) -> Result<Self, Error> {
        Self::new(key, CipherMode::Cfb)
    }

    /// Cipher mode of this primitive.
    #[must_use]
    pub const fn mode(&self) -> CipherMode {
        self.mode
    }

    /// Encrypts `plaintext` under a fresh random nonce or IV.
    ///
    /// `associated_data` is authenticated in GCM mode and ignored otherwise.
    ///
    /// # Returns
    ///
    /// The hex-encoded storage form described in the module docs.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encryption` if the cipher rejects the input.
    pub fn seal(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<String, Error> {
        let raw = match self.mode {
            CipherMode::Gcm => self.seal_gcm(plaintext, associated_data)?,
            CipherMode::Cbc => self.seal_cbc(plaintext)?,
            CipherMode::Cfb => self.seal_cfb(plaintext)?,
        };
        Ok(hex::encode(raw))
    }

    /// Decrypts a value produced by [`AeadPrimitive::seal`].
    ///
    /// # Errors
    ///
    /// - `Error::Decode` if `stored` is not valid hex
    /// - `Error::Decryption` if the input is shorter than the nonce/IV or has
    ///   malformed padding
    /// - `Error::AuthenticationFailed` if the GCM tag does not verify
    pub fn open(&self, stored: &str, associated_data: &[u8]) -> Result<Vec<u8>, Error> {
        let raw = hex::decode(stored.trim())
            .map_err(|e| Error::Decode(format!("ciphertext is not hex: {e}")))?;

        match self.mode {
            CipherMode::Gcm => self.open_gcm(&raw, associated_data),
            CipherMode::Cbc => self.open_cbc(&raw),
            CipherMode::Cfb => self.open_cfb(&raw),
        }
    }

    fn seal_gcm(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
        let mut nonce = [0u8; GCM_NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = with_aes!(self.key, C => {
            let cipher = AesGcm::<C, U12>::new_from_slice(&self.key)
                .map_err(|e| Error::Encryption(format!("invalid key: {e}")))?;
            cipher
                .encrypt(Nonce::<U12>::from_slice(&nonce), Payload { msg: plaintext, aad })
                .map_err(|e| Error::Encryption(format!("AES-GCM encryption failed: {e}")))
        })?;

        let mut out = Vec::with_capacity(GCM_NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open_gcm(&self, raw: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
        if raw.len() < GCM_NONCE_SIZE + GCM_TAG_SIZE {
            return Err(Error::Decryption(format!(
                "ciphertext too short: {} bytes (min: {})",
                raw.len(),
                GCM_NONCE_SIZE + GCM_TAG_SIZE
            )));
        }
        let (nonce, ciphertext) = raw.split_at(GCM_NONCE_SIZE);

        with_aes!(self.key, C => {
            let cipher = AesGcm::<C, U12>::new_from_slice(&self.key)
                .map_err(|e| Error::Decryption(format!("invalid key: {e}")))?;
            cipher
                .decrypt(Nonce::<U12>::from_slice(nonce), Payload { msg: ciphertext, aad })
                .map_err(|_| Error::AuthenticationFailed)
        })
    }

    fn seal_cbc(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let mut iv = [0u8; BLOCK_SIZE];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = with_aes!(self.key, C => {
            cbc::Encryptor::<C>::new_from_slices(&self.key, &iv)
                .map(|enc| enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
                .map_err(|e| Error::Encryption(format!("invalid key or IV: {e}")))
        })?;

        Ok([iv.as_slice(), &ciphertext].concat())
    }

    fn open_cbc(&self, raw: &[u8]) -> Result<Vec<u8>, Error> {
        if raw.len() < 2 * BLOCK_SIZE {
            return Err(Error::Decryption(format!(
                "ciphertext too short: {} bytes (min: {})",
                raw.len(),
                2 * BLOCK_SIZE
            )));
        }
        let (iv, ciphertext) = raw.split_at(BLOCK_SIZE);
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(Error::Decryption(
                "ciphertext is not a multiple of the block size".to_string(),
            ));
        }

        with_aes!(self.key, C => {
            cbc::Decryptor::<C>::new_from_slices(&self.key, iv)
                .map_err(|e| Error::Decryption(format!("invalid key or IV: {e}")))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| Error::Decryption("invalid padding".to_string()))
        })
    }

    fn seal_cfb(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let mut out = vec![0u8; BLOCK_SIZE + plaintext.len()];
        OsRng.fill_bytes(&mut out[..BLOCK_SIZE]);
        let (iv, body) = out.split_at_mut(BLOCK_SIZE);
        body.copy_from_slice(plaintext);

        with_aes!(self.key, C => {
            cfb_mode::Encryptor::<C>::new_from_slices(&self.key, iv)
                .map(|enc| enc.encrypt(body))
                .map_err(|e| Error::Encryption(format!("invalid key or IV: {e}")))
        })?;

        Ok(out)
    }

    fn open_cfb(&self, raw: &[u8]) -> Result<Vec<u8>, Error> {
        if raw.len() < BLOCK_SIZE {
            return Err(Error::Decryption(format!(
                "ciphertext too short: {} bytes (min: {BLOCK_SIZE})",
                raw.len()
            )));
        }
        let (iv, ciphertext) = raw.split_at(BLOCK_SIZE);
        let mut plaintext = ciphertext.to_vec();

        with_aes!(self.key, C => {
            cfb_mode::Decryptor::<C>::new_from_slices(&self.key, iv)
                .map(|dec| dec.decrypt(&mut plaintext))
                .map_err(|e| Error::Decryption(format!("invalid key or IV: {e}")))
        })?;

        Ok(plaintext)
    }
}

impl Primitive for AeadPrimitive {
    const KIND: PrimitiveKind = PrimitiveKind::Aead;
}

impl fmt::Debug for AeadPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadPrimitive")
            .field("mode", &self.mode)
            .field("key_len", &self.key.len())
            .finish_non_exhaustive()
    }
}

fn invalid_key_len(len: usize) -> Error {
    Error::InvalidKey(format!("AES key must be 16, 24 or 32 bytes, got {len}"))
}
