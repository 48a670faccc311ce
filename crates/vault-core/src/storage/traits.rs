//! Storage trait definitions

use async_trait::async_trait;
use uuid::Uuid;

use crate::account::AccountRecord;
use crate::credential::StoredCredential;
use crate::error::Result;

/// Persistence for account key profiles and encrypted credentials.
///
/// Backends only ever see token text in the secret column; they never handle
/// plaintext or key material.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert or replace an account record
    async fn save_account(&self, account: &AccountRecord) -> Result<()>;

    /// Look up an account by username
    async fn load_account(&self, username: &str) -> Result<Option<AccountRecord>>;

    /// Insert or replace a credential
    async fn put(&self, credential: &StoredCredential) -> Result<()>;

    /// Insert or replace several credentials in one write
    async fn put_many(&self, credentials: &[StoredCredential]) -> Result<()>;

    /// Replace an account record together with its credentials in one write
    async fn save_account_with(
        &self,
        account: &AccountRecord,
        credentials: &[StoredCredential],
    ) -> Result<()>;

    /// Retrieve a credential by id
    async fn get(&self, id: Uuid) -> Result<Option<StoredCredential>>;

    /// Delete a credential, returning whether it existed
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// All credentials of one account, oldest first
    async fn list(&self, owner: &str) -> Result<Vec<StoredCredential>>;

    /// Human-readable name for this backend
    fn backend_name(&self) -> &'static str;
}
