//! Authenticated credential cipher
//!
//! Writes AES-256-GCM tokens (see [`super::token`]) and reads every token
//! version the vault has ever written. The version tag is bound into the GCM
//! tag as associated data.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::Zeroize;

use super::legacy;
use super::secure_memory::{DerivedKey, SecretString};
use super::token::{EncryptedField, GcmToken, TokenVersion, NONCE_LEN, TAG_LEN};
use crate::error::{Result, VaultError};

/// Encrypts and decrypts credential secrets with one derived key.
///
/// Holds no mutable state, so a single instance can be shared across threads
/// (for example behind an `Arc`) and used concurrently.
#[derive(Debug)]
pub struct Cipher {
    key: DerivedKey,
}

impl Cipher {
    pub fn new(key: DerivedKey) -> Self {
        Self { key }
    }

    /// Encrypt plaintext into current-format token text.
    ///
    /// A fresh random nonce is drawn on every call, so encrypting the same
    /// plaintext twice yields different tokens.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        Ok(EncryptedField::AesGcmV1(self.seal_gcm(plaintext)?).to_string())
    }

    /// Encrypt a string and return the token text
    pub fn encrypt_str(&self, plaintext: &str) -> Result<String> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Decrypt token text of any supported version
    pub fn decrypt(&self, token: &str) -> Result<Vec<u8>> {
        let field = EncryptedField::parse(token)?;
        self.decrypt_field(&field)
    }

    /// Decrypt an already parsed token
    pub fn decrypt_field(&self, field: &EncryptedField) -> Result<Vec<u8>> {
        match field {
            EncryptedField::Fernet(token) => legacy::open(&self.key, token),
            EncryptedField::AesGcmV1(token) => self.open_gcm(token),
        }
    }

    /// Decrypt token text whose plaintext is UTF-8
    pub fn decrypt_str(&self, token: &str) -> Result<SecretString> {
        let plaintext = self.decrypt(token)?;
        String::from_utf8(plaintext)
            .map(SecretString::new)
            .map_err(|e| {
                e.into_bytes().zeroize();
                VaultError::MalformedToken("plaintext is not valid UTF-8".to_string())
            })
    }

    /// Scheme a token was written with
    pub fn version_of(token: &str) -> Result<TokenVersion> {
        Ok(EncryptedField::parse(token)?.version())
    }

    /// Whether a token should be rewritten under the current scheme
    pub fn needs_migration(token: &str) -> Result<bool> {
        Ok(!Self::version_of(token)?.is_current())
    }

    /// Decrypt a token of any version and encrypt it again under the
    /// current scheme with this cipher's key
    pub fn reencrypt(&self, token: &str) -> Result<String> {
        self.reencrypt_into(token, self)
    }

    /// Decrypt a token with this cipher and encrypt the plaintext with `target`
    pub fn reencrypt_into(&self, token: &str, target: &Cipher) -> Result<String> {
        let mut plaintext = self.decrypt(token)?;
        let result = target.encrypt(&plaintext);
        plaintext.zeroize();
        result
    }

    fn aead(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.key.as_bytes())
            .map_err(|e| VaultError::EncryptionError(e.to_string()))
    }

    fn seal_gcm(&self, plaintext: &[u8]) -> Result<GcmToken> {
        let cipher = self.aead()?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        // aes-gcm appends the auth tag to the ciphertext
        let mut ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: associated_data(TokenVersion::AesGcmV1),
                },
            )
            .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

        if ciphertext.len() < TAG_LEN {
            return Err(VaultError::EncryptionError("Ciphertext too short".to_string()));
        }

        let tag_start = ciphertext.len() - TAG_LEN;
        let mut auth_tag = [0u8; TAG_LEN];
        auth_tag.copy_from_slice(&ciphertext[tag_start..]);
        ciphertext.truncate(tag_start);

        Ok(GcmToken {
            nonce,
            auth_tag,
            ciphertext,
        })
    }

    fn open_gcm(&self, token: &GcmToken) -> Result<Vec<u8>> {
        let cipher = self.aead()?;

        let mut ciphertext_with_tag = Vec::with_capacity(token.ciphertext.len() + TAG_LEN);
        ciphertext_with_tag.extend_from_slice(&token.ciphertext);
        ciphertext_with_tag.extend_from_slice(&token.auth_tag);

        cipher
            .decrypt(
                Nonce::from_slice(&token.nonce),
                Payload {
                    msg: &ciphertext_with_tag,
                    aad: associated_data(TokenVersion::AesGcmV1),
                },
            )
            .map_err(|_| VaultError::AuthenticationFailure)
    }
}

fn associated_data(version: TokenVersion) -> &'static [u8] {
    match version.tag() {
        Some(tag) => tag.as_bytes(),
        None => b"",
    }
}
