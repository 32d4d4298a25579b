//! File-based key provider for `piiguard`.
//!
//! Keys are stored hex-encoded in a directory and are suitable for
//! development, testing and single-host deployments.

#![warn(clippy::pedantic, clippy::nursery)]

use piiguard::error::KeyProviderError;
use piiguard::key_provider::{decode_hex_key, KeyProvider, KeyPurpose};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::SecretVec;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Length of generated keys (AES-256 and HMAC-SHA256).
pub const DEFAULT_KEY_LEN: usize = 32;

/// File-based key provider.
///
/// Keys are stored in the filesystem with the following structure:
/// ```text
/// keys/
/// ├── aead.key   (hex, 0600 permissions)
/// ├── mac.key    (hex, 0600 permissions)
/// └── bidx.key   (hex, 0600 permissions)
/// ```
///
/// A missing file means that primitive family is not configured.
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    key_dir: PathBuf,
}

impl FileKeyProvider {
    /// Creates a new `FileKeyProvider`.
    ///
    /// # Arguments
    ///
    /// * `key_dir` - Directory containing key files
    ///
    /// # Errors
    ///
    /// Returns `KeyProviderError::KeyNotFound` if the directory does not exist.
    pub fn new(key_dir: impl Into<PathBuf>) -> Result<Self, KeyProviderError> {
        let key_dir = key_dir.into();
        if !key_dir.is_dir() {
            return Err(KeyProviderError::KeyNotFound(format!(
                "key directory does not exist: {}",
                key_dir.display()
            )));
        }
        Ok(Self { key_dir })
    }

    /// Initializes a key directory with fresh 32-byte keys for every family.
    ///
    /// # Errors
    ///
    /// See [`FileKeyProvider::init_with_aead_len`].
    pub fn init(key_dir: impl Into<PathBuf>) -> Result<Self, KeyProviderError> {
        Self::init_with_aead_len(key_dir, DEFAULT_KEY_LEN)
    }

    /// Initializes a key directory, generating an AES key of `aead_len`
    /// bytes (16, 24 or 32) and 32-byte MAC and blind index keys.
    ///
    /// Existing key files are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns `KeyProviderError::CreationFailed` for an unsupported AES key
    /// length or when a key file already exists, and `KeyProviderError::Io`
    /// if the directory or files cannot be written.
    pub fn init_with_aead_len(
        key_dir: impl Into<PathBuf>,
        aead_len: usize,
    ) -> Result<Self, KeyProviderError> {
        if ![16, 24, 32].contains(&aead_len) {
            return Err(KeyProviderError::CreationFailed(format!(
                "AES key must be 16, 24 or 32 bytes, got {aead_len}"
            )));
        }

        let key_dir = key_dir.into();
        fs::create_dir_all(&key_dir)?;

        for purpose in KeyPurpose::ALL {
            let len = match purpose {
                KeyPurpose::Aead => aead_len,
                KeyPurpose::Mac | KeyPurpose::BlindIndex => DEFAULT_KEY_LEN,
            };
            let path = key_dir.join(purpose.file_name());
            write_new_key(&path, len)?;
            tracing::info!(path = %path.display(), kind = %purpose, "generated key");
        }

        Ok(Self { key_dir })
    }

    /// Directory holding the key files.
    #[must_use]
    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    /// Path of the key file for `purpose`.
    #[must_use]
    pub fn key_path(&self, purpose: KeyPurpose) -> PathBuf {
        self.key_dir.join(purpose.file_name())
    }
}

impl KeyProvider for FileKeyProvider {
    fn master_key(&self, purpose: KeyPurpose) -> Result<Option<SecretVec<u8>>, KeyProviderError> {
        let path = self.key_path(purpose);
        let text = match fs::read_to_string(&path) {
            Ok(text) => Zeroizing::new(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "key file absent");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        decode_hex_key(&path.display().to_string(), &text).map(Some)
    }
}

fn write_new_key(path: &Path, len: usize) -> Result<(), KeyProviderError> {
    let mut key = Zeroizing::new(vec![0u8; len]);
    OsRng.fill_bytes(&mut key);
    let mut encoded = Zeroizing::new(hex::encode(&*key));
    encoded.push('\n');

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            KeyProviderError::CreationFailed(format!("key file already exists: {}", path.display()))
        } else {
            e.into()
        }
    })?;
    file.write_all(encoded.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    #[test]
    fn test_new_requires_directory() {
        let temp = TempDir::new().unwrap();
        assert!(FileKeyProvider::new(temp.path()).is_ok());
        assert!(matches!(
            FileKeyProvider::new(temp.path().join("missing")),
            Err(KeyProviderError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_init_generates_all_keys() {
        let temp = TempDir::new().unwrap();
        let provider = FileKeyProvider::init(temp.path().join("keys")).unwrap();

        for purpose in KeyPurpose::ALL {
            let key = provider.master_key(purpose).unwrap().unwrap();
            assert_eq!(key.expose_secret().len(), DEFAULT_KEY_LEN);
        }

        let aead = provider.master_key(KeyPurpose::Aead).unwrap().unwrap();
        let mac = provider.master_key(KeyPurpose::Mac).unwrap().unwrap();
        assert_ne!(aead.expose_secret(), mac.expose_secret());
    }

    #[test]
    fn test_init_with_aes128() {
        let temp = TempDir::new().unwrap();
        let provider = FileKeyProvider::init_with_aead_len(temp.path(), 16).unwrap();
        let key = provider.master_key(KeyPurpose::Aead).unwrap().unwrap();
        assert_eq!(key.expose_secret().len(), 16);

        assert!(matches!(
            FileKeyProvider::init_with_aead_len(temp.path().join("other"), 20),
            Err(KeyProviderError::CreationFailed(_))
        ));
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let temp = TempDir::new().unwrap();
        let provider = FileKeyProvider::init(temp.path()).unwrap();
        let before = provider.master_key(KeyPurpose::Mac).unwrap().unwrap();

        assert!(matches!(
            FileKeyProvider::init(temp.path()),
            Err(KeyProviderError::CreationFailed(_))
        ));

        let after = provider.master_key(KeyPurpose::Mac).unwrap().unwrap();
        assert_eq!(before.expose_secret(), after.expose_secret());
    }

    #[test]
    fn test_missing_file_is_not_configured() {
        let temp = TempDir::new().unwrap();
        let provider = FileKeyProvider::init(temp.path()).unwrap();
        fs::remove_file(provider.key_path(KeyPurpose::BlindIndex)).unwrap();

        assert!(provider.master_key(KeyPurpose::BlindIndex).unwrap().is_none());
        assert!(provider.master_key(KeyPurpose::Aead).unwrap().is_some());
    }

    #[test]
    fn test_corrupt_file_is_invalid_format() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("mac.key"), "not hex at all").unwrap();
        let provider = FileKeyProvider::new(temp.path()).unwrap();

        assert!(matches!(
            provider.master_key(KeyPurpose::Mac),
            Err(KeyProviderError::InvalidFormat(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let provider = FileKeyProvider::init(temp.path()).unwrap();
        let mode = fs::metadata(provider.key_path(KeyPurpose::Aead)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
