//! Secure memory handling with automatic zeroization

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of every derived key in bytes
pub const KEY_LEN: usize = 32;

/// Symmetric key derived from a master secret - zeroed when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LEN],
}

impl DerivedKey {
    /// Wrap raw key bytes
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Get the key bytes (use carefully - avoid copying)
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// Create from a slice (must be exactly 32 bytes)
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let key: [u8; KEY_LEN] = slice.try_into().ok()?;
        Some(Self { key })
    }

    /// First half, used as the MAC key by the legacy token format
    pub(crate) fn signing_half(&self) -> &[u8] {
        &self.key[..KEY_LEN / 2]
    }

    /// Second half, used as the AES-128 key by the legacy token format
    pub(crate) fn encryption_half(&self) -> &[u8] {
        &self.key[KEY_LEN / 2..]
    }
}

impl Clone for DerivedKey {
    fn clone(&self) -> Self {
        Self { key: self.key }
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Master secret or decrypted credential value - zeroed when dropped
#[derive(Zeroize, ZeroizeOnDrop, Clone, Default)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: String) -> Self {
        Self { value }
    }

    /// Get the secret value (use carefully)
    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Consume and return the inner value
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretString")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_key_from_slice() {
        let bytes = [42u8; 32];
        let key = DerivedKey::from_slice(&bytes).unwrap();
        assert_eq!(key.as_bytes(), &bytes);
    }

    #[test]
    fn test_derived_key_from_invalid_slice() {
        assert!(DerivedKey::from_slice(&[42u8; 16]).is_none());
        assert!(DerivedKey::from_slice(&[42u8; 33]).is_none());
    }

    #[test]
    fn test_key_halves() {
        let mut bytes = [0u8; 32];
        bytes[16..].fill(1);
        let key = DerivedKey::new(bytes);
        assert_eq!(key.signing_half(), &[0u8; 16]);
        assert_eq!(key.encryption_half(), &[1u8; 16]);
    }

    #[test]
    fn test_secret_string_expose() {
        let secret = SecretString::from("my-secret");
        assert_eq!(secret.expose(), "my-secret");
        assert_eq!(secret.into_inner(), "my-secret");
        assert!(SecretString::from("").is_empty());
    }

    #[test]
    fn test_debug_redacted() {
        let key = DerivedKey::new([7u8; 32]);
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains('7'));

        let secret = SecretString::from("hunter2");
        assert!(!format!("{:?}", secret).contains("hunter2"));
    }
}
