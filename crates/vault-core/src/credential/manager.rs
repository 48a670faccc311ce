//! Credential manager for CRUD operations

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{CredentialRecord, CredentialRow, MigrationReport, RowSecret, StoredCredential};
use crate::crypto::{Cipher, SecretString};
use crate::error::{Result, VaultError};
use crate::session::VaultSession;
use crate::storage::CredentialStore;

/// Credential manager
///
/// Stateless apart from the store handle: every operation takes the session
/// whose key encrypts or decrypts the secrets.
#[derive(Clone)]
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Encrypt and store a new credential
    pub async fn add(
        &self,
        session: &VaultSession,
        record: CredentialRecord,
    ) -> Result<StoredCredential> {
        let record = record.normalized()?;
        let secret = session.cipher().encrypt_str(record.secret.expose())?;

        let now = Utc::now();
        let stored = StoredCredential {
            id: Uuid::new_v4(),
            owner: session.username().to_string(),
            title: record.title,
            username: record.username,
            secret,
            website: record.website,
            notes: record.notes,
            created_at: now,
            updated_at: now,
        };

        self.store.put(&stored).await?;

        info!("Added credential {} for {}", stored.id, stored.owner);
        Ok(stored)
    }

    /// Store an already encrypted secret, e.g. a token exported by an earlier
    /// release. The token must decrypt under the session key; it is kept
    /// as-is until [`CredentialManager::migrate_legacy`] rewrites it.
    pub async fn import_encrypted(
        &self,
        session: &VaultSession,
        title: &str,
        username: &str,
        token: &str,
    ) -> Result<StoredCredential> {
        let token = token.trim();
        let plaintext = session.cipher().decrypt_str(token)?;
        let record = CredentialRecord::new(title, username, plaintext).normalized()?;

        let now = Utc::now();
        let stored = StoredCredential {
            id: Uuid::new_v4(),
            owner: session.username().to_string(),
            title: record.title,
            username: record.username,
            secret: token.to_string(),
            website: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        self.store.put(&stored).await?;

        info!(
            "Imported {} credential {} for {}",
            Cipher::version_of(token)?,
            stored.id,
            stored.owner
        );
        Ok(stored)
    }

    /// Replace every field of an existing credential, re-encrypting the secret
    pub async fn edit(
        &self,
        session: &VaultSession,
        id: Uuid,
        record: CredentialRecord,
    ) -> Result<StoredCredential> {
        let record = record.normalized()?;
        let mut stored = self.get(session, id).await?;

        stored.title = record.title;
        stored.username = record.username;
        stored.secret = session.cipher().encrypt_str(record.secret.expose())?;
        stored.website = record.website;
        stored.notes = record.notes;
        stored.updated_at = Utc::now();

        self.store.put(&stored).await?;

        info!("Updated credential {}", id);
        Ok(stored)
    }

    /// Delete a credential
    pub async fn delete(&self, session: &VaultSession, id: Uuid) -> Result<()> {
        // Ownership check
        self.get(session, id).await?;
        self.store.delete(id).await?;

        info!("Deleted credential {}", id);
        Ok(())
    }

    /// Get a credential (secret still encrypted) owned by the session's account
    pub async fn get(&self, session: &VaultSession, id: Uuid) -> Result<StoredCredential> {
        match self.store.get(id).await? {
            Some(stored) if stored.owner == session.username() => Ok(stored),
            _ => Err(VaultError::CredentialNotFound(id.to_string())),
        }
    }

    /// Get and decrypt a credential's secret
    pub async fn get_decrypted(&self, session: &VaultSession, id: Uuid) -> Result<SecretString> {
        let stored = self.get(session, id).await?;
        let secret = session.cipher().decrypt_str(&stored.secret)?;

        debug!("Decrypted credential {}", id);
        Ok(secret)
    }

    /// List the session account's credentials (secrets still encrypted)
    pub async fn list(&self, session: &VaultSession) -> Result<Vec<StoredCredential>> {
        self.store.list(session.username()).await
    }

    /// Decrypt every credential of the session's account for display.
    ///
    /// A row that fails to decrypt is logged with its error kind and rendered
    /// with a placeholder; the remaining rows are unaffected.
    pub async fn list_for_display(&self, session: &VaultSession) -> Result<Vec<CredentialRow>> {
        let stored = self.list(session).await?;
        let cipher = session.cipher();

        let rows = tokio::task::spawn_blocking(move || {
            stored
                .into_iter()
                .map(|credential| decrypt_row(&cipher, credential))
                .collect::<Vec<_>>()
        })
        .await?;

        Ok(rows)
    }

    /// Rewrite every legacy-format secret under the current token scheme
    pub async fn migrate_legacy(&self, session: &VaultSession) -> Result<MigrationReport> {
        let cipher = session.cipher();
        let mut report = MigrationReport::default();
        let mut updated = Vec::new();

        for mut stored in self.list(session).await? {
            match Cipher::needs_migration(&stored.secret) {
                Ok(false) => {
                    report.already_current += 1;
                    continue;
                }
                Ok(true) => {}
                Err(e) => {
                    report.failed.push((stored.id, e.kind()));
                    continue;
                }
            }

            match cipher.reencrypt(&stored.secret) {
                Ok(token) => {
                    stored.secret = token;
                    stored.updated_at = Utc::now();
                    updated.push(stored);
                }
                Err(e) => {
                    warn!(kind = ?e.kind(), "Could not migrate credential {}", stored.id);
                    report.failed.push((stored.id, e.kind()));
                }
            }
        }

        self.store.put_many(&updated).await?;
        report.migrated = updated.len();

        info!(
            "Migrated {} credentials for {} ({} current, {} failed)",
            report.migrated,
            session.username(),
            report.already_current,
            report.failed.len()
        );
        Ok(report)
    }

    /// Re-encrypt all of the session account's secrets for `target`.
    ///
    /// Returns the rewritten records without storing them, so the caller can
    /// persist them together with the new key profile. Fails on the first
    /// secret that cannot be decrypted, leaving nothing half-rotated.
    pub async fn rekey(
        &self,
        session: &VaultSession,
        target: &Cipher,
    ) -> Result<Vec<StoredCredential>> {
        let cipher = session.cipher();
        let mut rotated = Vec::new();

        for mut stored in self.list(session).await? {
            stored.secret = cipher.reencrypt_into(&stored.secret, target).map_err(|e| {
                warn!(kind = ?e.kind(), "Could not re-encrypt credential {}", stored.id);
                e
            })?;
            stored.updated_at = Utc::now();
            rotated.push(stored);
        }

        debug!("Re-encrypted {} credentials", rotated.len());
        Ok(rotated)
    }
}

fn decrypt_row(cipher: &Cipher, credential: StoredCredential) -> CredentialRow {
    let secret = match cipher.decrypt_str(&credential.secret) {
        Ok(secret) => RowSecret::Revealed(secret),
        Err(e) => {
            warn!(kind = ?e.kind(), "Could not decrypt credential {}", credential.id);
            RowSecret::Unavailable(e.kind())
        }
    };

    CredentialRow {
        id: credential.id,
        title: credential.title,
        username: credential.username,
        secret,
        website: credential.website,
        notes: credential.notes,
    }
}
