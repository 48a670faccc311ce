//! Cryptographic primitives for credential secrets
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 / Argon2id key derivation from a master secret
//! - AES-256-GCM authenticated encryption into versioned tokens
//! - Read-only support for legacy Fernet tokens
//! - Secure memory handling with zeroize

mod encryption;
mod key_derivation;
mod legacy;
mod secure_memory;
mod token;

pub use encryption::Cipher;
pub use key_derivation::{
    derive_key, derive_key_argon2id, KdfParams, Salt, DEFAULT_PBKDF2_ITERATIONS,
    LEGACY_PBKDF2_ITERATIONS, MAX_ARGON2_MEMORY_KIB, MAX_ARGON2_PARALLELISM, MAX_ARGON2_PASSES,
    MAX_ITERATIONS, SALT_LEN,
};
pub use secure_memory::{DerivedKey, SecretString, KEY_LEN};
pub use token::{EncryptedField, FernetToken, GcmToken, TokenVersion};
