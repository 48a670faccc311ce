//! Credential type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::SecretString;
use crate::error::{ErrorKind, Result, VaultError, UNAVAILABLE_PLACEHOLDER};

/// Plaintext credential as entered by the user
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    /// Title / service name (e.g. "Gmail")
    pub title: String,
    /// Account username at that service
    pub username: String,
    /// The secret (password, API key)
    pub secret: SecretString,
    pub website: Option<String>,
    pub notes: Option<String>,
}

impl CredentialRecord {
    pub fn new(title: &str, username: &str, secret: impl Into<SecretString>) -> Self {
        Self {
            title: title.to_string(),
            username: username.to_string(),
            secret: secret.into(),
            website: None,
            notes: None,
        }
    }

    pub fn with_website(mut self, website: &str) -> Self {
        self.website = Some(website.to_string());
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    /// Trim text fields, drop blank optional fields, and require title,
    /// username, and secret
    pub(crate) fn normalized(mut self) -> Result<Self> {
        self.title = self.title.trim().to_string();
        self.username = self.username.trim().to_string();
        self.website = non_blank(self.website);
        self.notes = non_blank(self.notes);

        if self.title.is_empty() {
            return Err(VaultError::MissingField("title".to_string()));
        }
        if self.username.is_empty() {
            return Err(VaultError::MissingField("username".to_string()));
        }
        if self.secret.expose().trim().is_empty() {
            return Err(VaultError::MissingField("secret".to_string()));
        }
        Ok(self)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Stored credential (secret encrypted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub id: Uuid,

    /// Username of the owning vault account
    pub owner: String,

    pub title: String,

    pub username: String,

    /// Encrypted secret token
    pub secret: String,

    pub website: Option<String>,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Secret column of a rendered row
#[derive(Debug, Clone)]
pub enum RowSecret {
    Revealed(SecretString),
    /// Decryption failed; the kind is kept for diagnostics only
    Unavailable(ErrorKind),
}

impl RowSecret {
    /// Text to render, with the default placeholder
    pub fn display(&self) -> &str {
        self.display_or(UNAVAILABLE_PLACEHOLDER)
    }

    /// Text to render, with a custom placeholder for failed rows
    pub fn display_or<'a>(&'a self, placeholder: &'a str) -> &'a str {
        match self {
            Self::Revealed(secret) => secret.expose(),
            Self::Unavailable(_) => placeholder,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Revealed(_))
    }
}

/// One credential ready for display
#[derive(Debug, Clone)]
pub struct CredentialRow {
    pub id: Uuid,
    pub title: String,
    pub username: String,
    pub secret: RowSecret,
    pub website: Option<String>,
    pub notes: Option<String>,
}

/// Outcome of rewriting legacy tokens under the current scheme
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: usize,
    pub already_current: usize,
    pub failed: Vec<(Uuid, ErrorKind)>,
}
