//! Read-only support for Fernet tokens written by earlier releases
//!
//! The 32-byte derived key splits into an HMAC-SHA256 signing key (first
//! half) and an AES-128-CBC key (second half). The MAC is checked in constant
//! time before any decryption happens. Timestamps are not enforced.

use aes::Aes128;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::secure_memory::DerivedKey;
use super::token::FernetToken;
use crate::error::{Result, VaultError};

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Verify and decrypt a legacy token
pub(crate) fn open(key: &DerivedKey, token: &FernetToken) -> Result<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.signing_half())
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;
    mac.update(token.signed_part());
    mac.verify_slice(token.hmac())
        .map_err(|_| VaultError::AuthenticationFailure)?;

    let decryptor = Aes128CbcDec::new_from_slices(key.encryption_half(), token.iv())
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

    // The MAC already matched, so bad padding means the writer was broken
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(token.ciphertext())
        .map_err(|_| VaultError::MalformedToken("invalid legacy padding".to_string()))
}
