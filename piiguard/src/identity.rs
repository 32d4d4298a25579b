//! Per-row or per-tenant identities used for key derivation and as AEAD
//! associated data.

use std::fmt;
use uuid::Uuid;

/// Identity bytes that scope a derived key, typically a row or tenant UUID.
///
/// The same identity must be supplied on write and on read. A mismatch is not
/// detected here; it surfaces as a decryption or authentication failure.
///
/// # Example
///
/// ```
/// use piiguard::identity::Identity;
/// use uuid::Uuid;
///
/// let id = Uuid::parse_str("c2aaf7c8-50b5-435f-9a6a-fe1f22ce2d82").unwrap();
/// let identity = Identity::from(id);
/// assert_eq!(identity.as_bytes().len(), 16);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Identity(Vec<u8>);

impl Identity {
    /// Creates an identity from raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the identity bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` when no identity bytes are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Uuid> for Identity {
    fn from(id: Uuid) -> Self {
        Self(id.as_bytes().to_vec())
    }
}

impl From<&Uuid> for Identity {
    fn from(id: &Uuid) -> Self {
        Self::from(*id)
    }
}

impl From<&[u8]> for Identity {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Identity {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<&Identity> for Identity {
    fn from(identity: &Identity) -> Self {
        identity.clone()
    }
}

impl AsRef<[u8]> for Identity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Identities are row keys, not secrets, but they are shown as hex so that
// binary UUIDs stay readable in logs.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", hex::encode(&self.0))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_uuid_uses_raw_bytes() {
        let id = Uuid::parse_str("c2aaf7c8-50b5-435f-9a6a-fe1f22ce2d82").unwrap();
        let identity = Identity::from(id);

        assert_eq!(identity.as_bytes(), id.as_bytes());
        assert_eq!(identity.to_string(), "c2aaf7c850b5435f9a6afe1f22ce2d82");
    }

    #[test]
    fn test_identity_default_is_empty() {
        assert!(Identity::default().is_empty());
        assert!(!Identity::from("tenant_1").is_empty());
    }

    #[test]
    fn test_identity_debug_is_hex() {
        let identity = Identity::new(vec![0xab, 0x01]);
        assert_eq!(format!("{identity:?}"), "Identity(ab01)");
    }
}
