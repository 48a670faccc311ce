//! Main vault orchestration

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::account::{verify_legacy_login, AccountRecord, KeyProfile};
use crate::credential::CredentialManager;
use crate::crypto::{KdfParams, SecretString};
use crate::error::{Result, VaultError};
use crate::session::VaultSession;
use crate::settings::{Settings, SettingsManager};
use crate::storage::{CredentialStore, JsonFileStore};

/// Main vault struct tying accounts, credentials, and settings together
pub struct Vault {
    /// Storage backend
    store: Arc<dyn CredentialStore>,
    /// Credential manager
    credentials: CredentialManager,
    /// Settings manager (non-sensitive config)
    settings_manager: SettingsManager,
    storage_dir: PathBuf,
}

impl Vault {
    /// Open the vault in the default data directory
    pub fn new() -> Result<Self> {
        Ok(Self::with_json_store(JsonFileStore::new()?))
    }

    /// Open the vault in a specific data directory
    pub fn with_dir(storage_dir: PathBuf) -> Result<Self> {
        Ok(Self::with_json_store(JsonFileStore::with_dir(storage_dir)?))
    }

    fn with_json_store(store: JsonFileStore) -> Self {
        let settings_dir = store.storage_dir().to_path_buf();
        Self::with_store(Arc::new(store), &settings_dir)
    }

    /// Create a vault over any storage backend, keeping settings in `settings_dir`
    pub fn with_store(store: Arc<dyn CredentialStore>, settings_dir: &Path) -> Self {
        debug!("Opening vault with {}", store.backend_name());

        let settings_manager = SettingsManager::new(settings_dir);
        let credentials = CredentialManager::new(store.clone());

        Self {
            store,
            credentials,
            settings_manager,
            storage_dir: settings_dir.to_path_buf(),
        }
    }

    /// Credential operations for unlocked sessions
    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// Create an account with a fresh salt and start a session for it
    pub async fn register(
        &self,
        username: &str,
        master_secret: SecretString,
    ) -> Result<VaultSession> {
        let username = self.check_new_username(username).await?;

        let kdf = self.settings().kdf;
        kdf.check_cap(self.settings().max_iterations)?;

        info!("Registering account {}", username);

        let (profile, cipher) =
            tokio::task::spawn_blocking(move || KeyProfile::create(&master_secret, kdf)).await??;

        self.store
            .save_account(&AccountRecord::new(&username, profile))
            .await?;

        info!("Account {} registered", username);
        Ok(VaultSession::from_cipher(&username, cipher))
    }

    /// Register an account created by an earlier release.
    ///
    /// `login_password` is checked against the bcrypt hash the earlier release
    /// stored for the user, and the key is derived from that hash string with
    /// the shared legacy salt, matching how its tokens were written. The
    /// returned session opens those tokens for
    /// [`CredentialManager::import_encrypted`] and
    /// [`CredentialManager::migrate_legacy`]; calling
    /// [`Vault::change_master_secret`] with the hash as the old secret then
    /// moves the account to its own salt and a key from the login password.
    pub async fn import_legacy_account(
        &self,
        username: &str,
        login_password: SecretString,
        stored_hash: SecretString,
    ) -> Result<VaultSession> {
        let username = self.check_new_username(username).await?;
        KdfParams::legacy().check_cap(self.settings().max_iterations)?;

        let stored_hash = SecretString::new(stored_hash.expose().trim().to_string());
        let (profile, cipher) = tokio::task::spawn_blocking(move || {
            verify_legacy_login(&login_password, &stored_hash)?;
            KeyProfile::legacy(&stored_hash)
        })
        .await??;

        self.store
            .save_account(&AccountRecord::new(&username, profile))
            .await?;

        info!("Imported legacy account {}", username);
        Ok(VaultSession::from_cipher(&username, cipher))
    }

    /// Unlock an account with its master secret
    pub async fn unlock(
        &self,
        username: &str,
        master_secret: SecretString,
    ) -> Result<VaultSession> {
        let account = self.load_account(username).await?;
        account
            .key_profile
            .kdf
            .check_cap(self.settings().max_iterations)?;

        VaultSession::unlock(&account.username, master_secret, &account.key_profile).await
    }

    /// Change an account's master secret.
    ///
    /// Generates a new salt with the configured KDF, re-encrypts every secret
    /// under the new key, and stores the new profile and secrets in one write.
    /// The old session is consumed; the returned one holds the new key.
    pub async fn change_master_secret(
        &self,
        session: VaultSession,
        old_secret: SecretString,
        new_secret: SecretString,
    ) -> Result<VaultSession> {
        let mut account = self.load_account(session.username()).await?;

        // Verify old secret
        let profile = account.key_profile.clone();
        tokio::task::spawn_blocking(move || profile.unlock(&old_secret)).await??;

        let kdf = self.settings().kdf;
        kdf.check_cap(self.settings().max_iterations)?;

        let (profile, cipher) =
            tokio::task::spawn_blocking(move || KeyProfile::create(&new_secret, kdf)).await??;

        let rotated = self.credentials.rekey(&session, &cipher).await?;

        let was_legacy = account.key_profile.is_legacy();
        account.key_profile = profile;
        self.store.save_account_with(&account, &rotated).await?;

        info!(
            "Changed master secret for {} ({} credentials re-encrypted{})",
            account.username,
            rotated.len(),
            if was_legacy { ", moved off legacy salt" } else { "" }
        );

        session.end();
        Ok(VaultSession::from_cipher(&account.username, cipher))
    }

    /// Check whether an account still derives its key from the legacy salt
    pub async fn is_legacy_account(&self, username: &str) -> Result<bool> {
        Ok(self.load_account(username).await?.key_profile.is_legacy())
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        self.settings_manager.get()
    }

    /// Update settings
    pub async fn update_settings(&mut self, settings: Settings) -> Result<()> {
        self.settings_manager.update(settings).await
    }

    /// Get the storage directory path
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    async fn load_account(&self, username: &str) -> Result<AccountRecord> {
        self.store
            .load_account(username.trim())
            .await?
            .ok_or_else(|| VaultError::AccountNotFound(username.trim().to_string()))
    }

    async fn check_new_username(&self, username: &str) -> Result<String> {
        let username = username.trim();
        if username.is_empty() {
            return Err(VaultError::MissingField("username".to_string()));
        }
        if self.store.load_account(username).await?.is_some() {
            return Err(VaultError::AccountExists(username.to_string()));
        }
        Ok(username.to_string())
    }
}
