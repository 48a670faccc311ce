//! Error types for vault-core

use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Text shown in place of a secret that could not be decrypted
pub const UNAVAILABLE_PLACEHOLDER: &str = "unavailable";

/// Text shown when a session cannot be started
pub const UNLOCK_FAILED_MESSAGE: &str = "cannot unlock vault";

/// Vault error types
///
/// Messages carry structural detail only (lengths, tag names, file paths).
/// Master secrets, derived keys, and plaintext never end up in here.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported parameters: {0}")]
    UnsupportedParameters(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Authentication failed - wrong key or tampered data")]
    AuthenticationFailure,

    #[error("Unsupported token version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid master secret")]
    InvalidMasterSecret,

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Background task failed: {0}")]
    TaskError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Fieldless classification of [`VaultError`], safe to log and match on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    UnsupportedParameters,
    MalformedToken,
    AuthenticationFailure,
    UnsupportedVersion,
    InvalidMasterSecret,
    Encryption,
    Validation,
    NotFound,
    Conflict,
    Storage,
}

impl VaultError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::UnsupportedParameters(_) => ErrorKind::UnsupportedParameters,
            Self::MalformedToken(_) => ErrorKind::MalformedToken,
            Self::AuthenticationFailure => ErrorKind::AuthenticationFailure,
            Self::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            Self::InvalidMasterSecret => ErrorKind::InvalidMasterSecret,
            Self::EncryptionError(_) => ErrorKind::Encryption,
            Self::MissingField(_) => ErrorKind::Validation,
            Self::AccountNotFound(_) | Self::CredentialNotFound(_) => ErrorKind::NotFound,
            Self::AccountExists(_) => ErrorKind::Conflict,
            Self::StorageError(_)
            | Self::TaskError(_)
            | Self::IoError(_)
            | Self::SerializationError(_) => ErrorKind::Storage,
        }
    }

    /// Whether this error came out of decrypting a token
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedToken
                | ErrorKind::AuthenticationFailure
                | ErrorKind::UnsupportedVersion
        )
    }

    /// Message suitable for showing to an end user.
    ///
    /// Decryption failures collapse to [`UNAVAILABLE_PLACEHOLDER`]; key
    /// derivation failures collapse to [`UNLOCK_FAILED_MESSAGE`].
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::MalformedToken
            | ErrorKind::AuthenticationFailure
            | ErrorKind::UnsupportedVersion => UNAVAILABLE_PLACEHOLDER.to_string(),
            ErrorKind::InvalidInput
            | ErrorKind::UnsupportedParameters
            | ErrorKind::InvalidMasterSecret => {
                UNLOCK_FAILED_MESSAGE.to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(e: tokio::task::JoinError) -> Self {
        VaultError::TaskError(e.to_string())
    }
}
