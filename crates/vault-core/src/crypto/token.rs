//! Self-describing encrypted token formats
//!
//! Current format: `v1:{nonce_hex}:{auth_tag_hex}:{ciphertext_hex}`
//! - Nonce: 12 bytes (96 bits) - standard for GCM
//! - Auth tag: 16 bytes (128 bits)
//! - Ciphertext: variable length, empty for an empty plaintext
//!
//! Legacy format (read-only): a Fernet token, URL-safe base64 of
//! `0x80 | timestamp (8, BE) | iv (16) | ciphertext | hmac (32)`.
//! Fernet text never contains `:`, which is how the two are told apart.

use base64::{engine::general_purpose::URL_SAFE, Engine};

use crate::error::{Result, VaultError};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

const FERNET_VERSION: u8 = 0x80;
const FERNET_IV_LEN: usize = 16;
const FERNET_HMAC_LEN: usize = 32;
const FERNET_HEADER_LEN: usize = 1 + 8 + FERNET_IV_LEN;
const AES_BLOCK_LEN: usize = 16;

/// Longest string treated as a version tag rather than garbage
const MAX_TAG_LEN: usize = 8;

/// Every encryption scheme a stored token may have been written with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenVersion {
    /// AES-128-CBC + HMAC-SHA256 tokens written by earlier releases
    Fernet,
    /// AES-256-GCM with a random 96-bit nonce
    AesGcmV1,
}

impl TokenVersion {
    /// Scheme used for everything written today
    pub const CURRENT: TokenVersion = TokenVersion::AesGcmV1;

    /// Textual tag, `None` for the untagged legacy format
    pub fn tag(self) -> Option<&'static str> {
        match self {
            Self::Fernet => None,
            Self::AesGcmV1 => Some("v1"),
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "v1" => Some(Self::AesGcmV1),
            _ => None,
        }
    }

    pub fn is_current(self) -> bool {
        self == Self::CURRENT
    }
}

impl std::fmt::Display for TokenVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fernet => f.write_str("fernet"),
            Self::AesGcmV1 => f.write_str("aes-256-gcm/v1"),
        }
    }
}

/// Body of an AES-256-GCM token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcmToken {
    pub nonce: [u8; NONCE_LEN],
    pub auth_tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

/// Body of a legacy Fernet token, kept as the raw decoded bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FernetToken {
    raw: Vec<u8>,
}

impl FernetToken {
    /// Bytes covered by the HMAC (everything but the trailing MAC)
    pub fn signed_part(&self) -> &[u8] {
        &self.raw[..self.raw.len() - FERNET_HMAC_LEN]
    }

    pub fn hmac(&self) -> &[u8] {
        &self.raw[self.raw.len() - FERNET_HMAC_LEN..]
    }

    pub fn timestamp(&self) -> u64 {
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&self.raw[1..9]);
        u64::from_be_bytes(ts)
    }

    pub fn iv(&self) -> &[u8] {
        &self.raw[9..FERNET_HEADER_LEN]
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.raw[FERNET_HEADER_LEN..self.raw.len() - FERNET_HMAC_LEN]
    }

    /// Decoded token bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Validate the structure of decoded Fernet bytes
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self> {
        if raw.first() != Some(&FERNET_VERSION) {
            return Err(VaultError::MalformedToken("missing version tag".to_string()));
        }
        let min_len = FERNET_HEADER_LEN + AES_BLOCK_LEN + FERNET_HMAC_LEN;
        if raw.len() < min_len {
            return Err(VaultError::MalformedToken(format!(
                "legacy token too short: {} bytes",
                raw.len()
            )));
        }
        let ciphertext_len = raw.len() - FERNET_HEADER_LEN - FERNET_HMAC_LEN;
        if ciphertext_len % AES_BLOCK_LEN != 0 {
            return Err(VaultError::MalformedToken(
                "legacy ciphertext is not block aligned".to_string(),
            ));
        }
        Ok(Self { raw })
    }
}

/// A parsed token, one variant per supported scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptedField {
    Fernet(FernetToken),
    AesGcmV1(GcmToken),
}

impl EncryptedField {
    /// Parse token text into its structural parts
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(VaultError::MalformedToken("token is empty".to_string()));
        }

        match token.split_once(':') {
            Some((tag, body)) => match TokenVersion::from_tag(tag) {
                Some(TokenVersion::AesGcmV1) => parse_gcm(body).map(Self::AesGcmV1),
                Some(TokenVersion::Fernet) => Err(VaultError::MalformedToken(
                    "legacy tokens carry no tag".to_string(),
                )),
                None if looks_like_tag(tag) => Err(VaultError::UnsupportedVersion(tag.to_string())),
                None => Err(VaultError::MalformedToken("unrecognised token prefix".to_string())),
            },
            None => parse_fernet(token).map(Self::Fernet),
        }
    }

    pub fn version(&self) -> TokenVersion {
        match self {
            Self::Fernet(_) => TokenVersion::Fernet,
            Self::AesGcmV1(_) => TokenVersion::AesGcmV1,
        }
    }
}

impl std::fmt::Display for EncryptedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fernet(token) => f.write_str(&URL_SAFE.encode(&token.raw)),
            Self::AesGcmV1(token) => write!(
                f,
                "v1:{}:{}:{}",
                hex::encode(token.nonce),
                hex::encode(token.auth_tag),
                hex::encode(&token.ciphertext)
            ),
        }
    }
}

fn looks_like_tag(tag: &str) -> bool {
    !tag.is_empty() && tag.len() <= MAX_TAG_LEN && tag.chars().all(|c| c.is_ascii_alphanumeric())
}

fn parse_gcm(body: &str) -> Result<GcmToken> {
    let parts: Vec<&str> = body.split(':').collect();
    if parts.len() != 3 {
        return Err(VaultError::MalformedToken("expected v1:nonce:tag:ciphertext".to_string()));
    }

    let nonce_bytes = decode_hex(parts[0], "nonce")?;
    let tag_bytes = decode_hex(parts[1], "auth tag")?;
    let ciphertext = decode_hex(parts[2], "ciphertext")?;

    let nonce: [u8; NONCE_LEN] = nonce_bytes.as_slice().try_into().map_err(|_| {
        VaultError::MalformedToken(format!(
            "invalid nonce length: expected {}, got {}",
            NONCE_LEN,
            nonce_bytes.len()
        ))
    })?;
    let auth_tag: [u8; TAG_LEN] = tag_bytes.as_slice().try_into().map_err(|_| {
        VaultError::MalformedToken(format!(
            "invalid auth tag length: expected {}, got {}",
            TAG_LEN,
            tag_bytes.len()
        ))
    })?;

    Ok(GcmToken {
        nonce,
        auth_tag,
        ciphertext,
    })
}

/// Decode one hex field. Only the lowercase form written by `Display` is
/// accepted, so every byte sequence has exactly one valid token text.
fn decode_hex(part: &str, field: &str) -> Result<Vec<u8>> {
    if part.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(VaultError::MalformedToken(format!(
            "{} hex must be lowercase",
            field
        )));
    }
    hex::decode(part)
        .map_err(|e| VaultError::MalformedToken(format!("invalid {} hex: {}", field, e)))
}

fn parse_fernet(text: &str) -> Result<FernetToken> {
    let raw = URL_SAFE
        .decode(text)
        .map_err(|e| VaultError::MalformedToken(format!("invalid base64: {}", e)))?;
    FernetToken::from_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Token from the Fernet reference test vectors
    const FERNET_VECTOR: &str = "gAAAAAAdwJ6wAAECAwQFBgcICQoLDA0ODy021cpGVWKZ_eEwCGM4BLLF_5CV9dOPmrhuVUPgJobwOz7JcbmrR64jVmpU4IwqDA==";

    #[test]
    fn test_parse_gcm_token() {
        let text = format!("v1:{}:{}:{}", "00".repeat(12), "11".repeat(16), "abcd");
        let parsed = EncryptedField::parse(&text).unwrap();

        assert_eq!(parsed.version(), TokenVersion::AesGcmV1);
        match &parsed {
            EncryptedField::AesGcmV1(token) => {
                assert_eq!(token.nonce, [0u8; 12]);
                assert_eq!(token.auth_tag, [0x11u8; 16]);
                assert_eq!(token.ciphertext, vec![0xab, 0xcd]);
            }
            other => panic!("unexpected variant {:?}", other),
        }
        assert_eq!(parsed.to_string(), text);
    }

    #[test]
    fn test_parse_gcm_token_with_empty_ciphertext() {
        let text = format!("v1:{}:{}:", "00".repeat(12), "11".repeat(16));
        let parsed = EncryptedField::parse(&text).unwrap();
        assert_eq!(parsed.to_string(), text);
    }

    #[test]
    fn test_parse_fernet_vector() {
        let parsed = EncryptedField::parse(FERNET_VECTOR).unwrap();
        assert_eq!(parsed.version(), TokenVersion::Fernet);

        match &parsed {
            EncryptedField::Fernet(token) => {
                assert_eq!(token.timestamp(), 499_162_800);
                assert_eq!(token.iv(), (0u8..16).collect::<Vec<_>>().as_slice());
                assert_eq!(token.ciphertext().len(), 16);
                assert_eq!(token.hmac().len(), 32);
            }
            other => panic!("unexpected variant {:?}", other),
        }
        assert_eq!(parsed.to_string(), FERNET_VECTOR);
    }

    #[test]
    fn test_not_a_token_is_malformed() {
        assert!(matches!(
            EncryptedField::parse("not-a-token"),
            Err(VaultError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_invalid_format_parsing() {
        for bad in [
            "",
            "   ",
            "v1:",
            "v1:a:b",
            "v1:a:b:c:d",
            "v1:not_hex:not_hex:not_hex",
            "v1:0000:11111111111111111111111111111111:",
            "hello world:foo",
            "gAAAAA",
        ] {
            let result = EncryptedField::parse(bad);
            assert!(
                matches!(result, Err(VaultError::MalformedToken(_))),
                "{:?} gave {:?}",
                bad,
                result
            );
        }
    }

    #[test]
    fn test_uppercase_hex_is_malformed() {
        let lower = format!("v1:{}:{}:abcd", "0a".repeat(12), "1b".repeat(16));
        assert!(EncryptedField::parse(&lower).is_ok());

        for upper in [
            format!("v1:{}:{}:abcd", "0A".repeat(12), "1b".repeat(16)),
            format!("v1:{}:{}:abcd", "0a".repeat(12), "1B".repeat(16)),
            format!("v1:{}:{}:aBcd", "0a".repeat(12), "1b".repeat(16)),
        ] {
            assert!(matches!(
                EncryptedField::parse(&upper),
                Err(VaultError::MalformedToken(_))
            ));
        }
    }

    #[test]
    fn test_unknown_tag_is_unsupported_version() {
        let text = format!("v9:{}:{}:00", "00".repeat(12), "11".repeat(16));
        match EncryptedField::parse(&text) {
            Err(VaultError::UnsupportedVersion(tag)) => assert_eq!(tag, "v9"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_fernet_structure_checks() {
        // Wrong leading byte
        let mut raw = URL_SAFE.decode(FERNET_VECTOR).unwrap();
        raw[0] = 0x81;
        assert!(matches!(
            FernetToken::from_bytes(raw),
            Err(VaultError::MalformedToken(_))
        ));

        // Ciphertext not a whole number of blocks
        let mut raw = URL_SAFE.decode(FERNET_VECTOR).unwrap();
        raw.insert(30, 0);
        assert!(matches!(
            FernetToken::from_bytes(raw),
            Err(VaultError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_version_metadata() {
        assert!(TokenVersion::AesGcmV1.is_current());
        assert!(!TokenVersion::Fernet.is_current());
        assert_eq!(TokenVersion::CURRENT.tag(), Some("v1"));
        assert_eq!(TokenVersion::Fernet.tag(), None);
    }
}
