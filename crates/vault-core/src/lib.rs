//! # vault-core
//!
//! Core functionality for the pwvault password manager including:
//! - PBKDF2-HMAC-SHA256 / Argon2id key derivation with per-account salts
//! - AES-256-GCM encryption of credential secrets into versioned tokens
//! - Read-only support for Fernet tokens written by earlier releases
//! - Session-scoped key material with zeroize-on-drop security
//! - Credential management over a pluggable storage backend

pub mod account;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod session;
pub mod settings;
pub mod storage;
mod vault;

pub use account::{AccountRecord, KeyProfile};
pub use credential::{
    CredentialManager, CredentialRecord, CredentialRow, MigrationReport, RowSecret,
    StoredCredential,
};
pub use crypto::{
    derive_key, derive_key_argon2id, Cipher, DerivedKey, EncryptedField, KdfParams, Salt,
    SecretString, TokenVersion,
};
pub use error::{ErrorKind, Result, VaultError, UNAVAILABLE_PLACEHOLDER, UNLOCK_FAILED_MESSAGE};
pub use session::VaultSession;
pub use settings::{Settings, SettingsManager};
pub use storage::{CredentialStore, JsonFileStore};
pub use vault::Vault;
