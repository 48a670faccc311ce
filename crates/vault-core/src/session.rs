//! Vault sessions
//!
//! A session starts when a master secret unlocks an account and ends on
//! logout. It owns the account cipher; nothing else keeps key material, and
//! the derived key is zeroed when the last handle to the cipher is dropped.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::account::KeyProfile;
use crate::crypto::{Cipher, SecretString};
use crate::error::Result;

/// An unlocked vault for one account
#[derive(Debug)]
pub struct VaultSession {
    id: Uuid,
    username: String,
    cipher: Arc<Cipher>,
    started_at: DateTime<Utc>,
}

impl VaultSession {
    /// Derive the account key on a blocking worker thread and start a session.
    ///
    /// Any failure (empty secret, rejected parameters, wrong secret) should be
    /// shown to the user as "cannot unlock vault"; see
    /// [`crate::VaultError::user_message`].
    pub async fn unlock(
        username: &str,
        master_secret: SecretString,
        profile: &KeyProfile,
    ) -> Result<Self> {
        let profile = profile.clone();
        let unlocked = tokio::task::spawn_blocking(move || profile.unlock(&master_secret)).await?;
        Self::finish_unlock(username, unlocked)
    }

    /// Same as [`VaultSession::unlock`] for callers already off any
    /// latency-sensitive thread
    pub fn unlock_blocking(
        username: &str,
        master_secret: &SecretString,
        profile: &KeyProfile,
    ) -> Result<Self> {
        Self::finish_unlock(username, profile.unlock(master_secret))
    }

    /// Start a session around a cipher that was just created for the account
    pub fn from_cipher(username: &str, cipher: Cipher) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            cipher: Arc::new(cipher),
            started_at: Utc::now(),
        };
        debug!("Started session {} for {}", session.id, session.username);
        session
    }

    fn finish_unlock(username: &str, unlocked: Result<Cipher>) -> Result<Self> {
        match unlocked {
            Ok(cipher) => {
                let session = Self::from_cipher(username, cipher);
                info!("Vault unlocked for {}", username);
                Ok(session)
            }
            Err(e) => {
                warn!(kind = ?e.kind(), "Failed to unlock vault for {}", username);
                Err(e)
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Shared handle to the session cipher, e.g. for decrypting rows on
    /// worker threads
    pub fn cipher(&self) -> Arc<Cipher> {
        Arc::clone(&self.cipher)
    }

    /// End the session (logout / close)
    pub fn end(self) {
        debug!("Ended session {} for {}", self.id, self.username);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KdfParams;
    use crate::error::VaultError;

    fn profile(secret: &str) -> KeyProfile {
        KeyProfile::create(
            &SecretString::from(secret),
            KdfParams::Pbkdf2Sha256 { iterations: 1000 },
        )
        .unwrap()
        .0
    }

    #[tokio::test]
    async fn test_unlock_and_use() {
        let profile = profile("correct-password");
        let secret = SecretString::from("correct-password");
        let session = VaultSession::unlock("alice", secret, &profile).await.unwrap();

        assert_eq!(session.username(), "alice");
        let token = session.cipher().encrypt_str("value").unwrap();
        assert_eq!(session.cipher().decrypt_str(&token).unwrap().expose(), "value");
        session.end();
    }

    #[tokio::test]
    async fn test_unlock_wrong_secret() {
        let profile = profile("correct-password");
        let result =
            VaultSession::unlock("alice", SecretString::from("wrong-password"), &profile).await;

        let err = result.unwrap_err();
        assert!(matches!(err, VaultError::InvalidMasterSecret));
        assert_eq!(err.user_message(), "cannot unlock vault");
    }

    #[tokio::test]
    async fn test_unlock_empty_secret() {
        let profile = profile("correct-password");
        let err = VaultSession::unlock("alice", SecretString::from(""), &profile)
            .await
            .unwrap_err();

        assert!(matches!(err, VaultError::InvalidInput(_)));
        assert_eq!(err.user_message(), "cannot unlock vault");
    }

    #[test]
    fn test_unlock_blocking() {
        let profile = profile("correct-password");
        let secret = SecretString::from("correct-password");

        let first = VaultSession::unlock_blocking("alice", &secret, &profile).unwrap();
        let second = VaultSession::unlock_blocking("alice", &secret, &profile).unwrap();

        assert_ne!(first.id(), second.id());
        let token = first.cipher().encrypt(b"shared").unwrap();
        assert_eq!(second.cipher().decrypt(&token).unwrap(), b"shared");
    }
}
