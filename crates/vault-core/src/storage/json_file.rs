//! JSON file storage backend
//!
//! Keeps accounts and credentials in a single `vault.json` in the data
//! directory. Secrets are already tokens by the time they get here, so the
//! file itself is plain JSON.

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::CredentialStore;
use crate::account::AccountRecord;
use crate::credential::StoredCredential;
use crate::error::{Result, VaultError};

const STORAGE_FILE_VERSION: u32 = 1;

/// File format for persistent storage
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StorageFile {
    version: u32,
    accounts: BTreeMap<String, AccountRecord>,
    credentials: BTreeMap<Uuid, StoredCredential>,
}

/// JSON file storage backend
pub struct JsonFileStore {
    /// Directory for storage files
    storage_dir: PathBuf,
    /// In-memory copy of the file
    cache: RwLock<StorageFile>,
}

impl JsonFileStore {
    /// Open the store in the default data directory
    pub fn new() -> Result<Self> {
        Self::with_dir(Self::default_dir()?)
    }

    /// Open the store in a specific directory, creating it if needed
    pub fn with_dir(storage_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&storage_dir)?;

        let path = storage_dir.join("vault.json");
        let file = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let file: StorageFile = serde_json::from_str(&contents)?;
            if file.version != STORAGE_FILE_VERSION {
                return Err(VaultError::StorageError(format!(
                    "Unsupported storage file version: {}",
                    file.version
                )));
            }
            debug!(
                "Loaded {} accounts and {} credentials from {:?}",
                file.accounts.len(),
                file.credentials.len(),
                path
            );
            file
        } else {
            debug!("No existing storage file at {:?}", path);
            StorageFile {
                version: STORAGE_FILE_VERSION,
                ..Default::default()
            }
        };

        Ok(Self {
            storage_dir,
            cache: RwLock::new(file),
        })
    }

    /// Default data directory for this platform
    pub fn default_dir() -> Result<PathBuf> {
        ProjectDirs::from("org", "pwvault", "pwvault")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                VaultError::StorageError("Could not determine data directory".to_string())
            })
    }

    /// Get the storage directory path
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn storage_file_path(&self) -> PathBuf {
        self.storage_dir.join("vault.json")
    }

    /// Apply a change to a copy of the cache, persist it, then swap it in.
    /// A failed write leaves the cache untouched.
    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut StorageFile),
    {
        let mut cache = self.cache.write().await;

        let mut next = cache.clone();
        change(&mut next);

        let contents = serde_json::to_string_pretty(&next)?;
        let path = self.storage_file_path();

        // Write atomically using a temp file
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        *cache = next;
        debug!("Saved storage file with {} credentials", cache.credentials.len());
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn save_account(&self, account: &AccountRecord) -> Result<()> {
        let account = account.clone();
        self.update(move |file| {
            file.accounts.insert(account.username.clone(), account);
        })
        .await
    }

    async fn load_account(&self, username: &str) -> Result<Option<AccountRecord>> {
        let cache = self.cache.read().await;
        Ok(cache.accounts.get(username).cloned())
    }

    async fn put(&self, credential: &StoredCredential) -> Result<()> {
        self.put_many(std::slice::from_ref(credential)).await
    }

    async fn put_many(&self, credentials: &[StoredCredential]) -> Result<()> {
        if credentials.is_empty() {
            return Ok(());
        }
        self.update(|file| {
            for credential in credentials {
                file.credentials.insert(credential.id, credential.clone());
            }
        })
        .await
    }

    async fn save_account_with(
        &self,
        account: &AccountRecord,
        credentials: &[StoredCredential],
    ) -> Result<()> {
        self.update(|file| {
            file.accounts
                .insert(account.username.clone(), account.clone());
            for credential in credentials {
                file.credentials.insert(credential.id, credential.clone());
            }
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredCredential>> {
        let cache = self.cache.read().await;
        Ok(cache.credentials.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        if !self.cache.read().await.credentials.contains_key(&id) {
            return Ok(false);
        }
        self.update(|file| {
            file.credentials.remove(&id);
        })
        .await?;
        debug!("Deleted credential {}", id);
        Ok(true)
    }

    async fn list(&self, owner: &str) -> Result<Vec<StoredCredential>> {
        let cache = self.cache.read().await;

        let mut credentials: Vec<StoredCredential> = cache
            .credentials
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect();
        credentials.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(credentials)
    }

    fn backend_name(&self) -> &'static str {
        "JSON File Storage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::KeyProfile;
    use crate::crypto::{KdfParams, SecretString};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn credential(owner: &str, title: &str) -> StoredCredential {
        let now = Utc::now();
        StoredCredential {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            title: title.to_string(),
            username: "user".to_string(),
            secret: "v1:token".to_string(),
            website: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn account(username: &str) -> AccountRecord {
        let (profile, _) = KeyProfile::create(
            &SecretString::from("password"),
            KdfParams::Pbkdf2Sha256 { iterations: 1000 },
        )
        .unwrap();
        AccountRecord::new(username, profile)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        let cred = credential("alice", "Gmail");
        store.put(&cred).await.unwrap();

        let retrieved = store.get(cred.id).await.unwrap().unwrap();
        assert_eq!(retrieved.title, "Gmail");
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        let cred = credential("alice", "Gmail");
        store.put(&cred).await.unwrap();

        assert!(store.delete(cred.id).await.unwrap());
        assert!(!store.delete(cred.id).await.unwrap());
        assert!(store.get(cred.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_owner_and_orders_by_age() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        let mut older = credential("alice", "Older");
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = credential("alice", "Newer");
        let other = credential("bob", "Bob's");

        store.put_many(&[newer, other, older]).await.unwrap();

        let titles: Vec<String> = store
            .list("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["Older".to_string(), "Newer".to_string()]);
    }

    #[tokio::test]
    async fn test_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let cred = credential("alice", "Persistent");

        // Create storage and store data
        {
            let store = JsonFileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();
            store.save_account(&account("alice")).await.unwrap();
            store.put(&cred).await.unwrap();
        }

        // Create new storage instance and verify data persists
        {
            let store = JsonFileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();
            assert!(store.load_account("alice").await.unwrap().is_some());
            assert!(store.load_account("bob").await.unwrap().is_none());

            let retrieved = store.get(cred.id).await.unwrap().unwrap();
            assert_eq!(retrieved.secret, "v1:token");
        }
    }

    #[tokio::test]
    async fn test_save_account_with_credentials() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        let mut cred = credential("alice", "Gmail");
        store.put(&cred).await.unwrap();

        cred.secret = "v1:rotated".to_string();
        store
            .save_account_with(&account("alice"), &[cred.clone()])
            .await
            .unwrap();

        assert!(store.load_account("alice").await.unwrap().is_some());
        assert_eq!(store.get(cred.id).await.unwrap().unwrap().secret, "v1:rotated");
    }

    #[tokio::test]
    async fn test_rejects_unknown_file_version() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("vault.json"),
            r#"{"version":99,"accounts":{},"credentials":{}}"#,
        )
        .unwrap();

        let result = JsonFileStore::with_dir(temp_dir.path().to_path_buf());
        assert!(matches!(result, Err(VaultError::StorageError(_))));
    }
}
