//! Per-account key material stored next to the user record
//!
//! Each account carries its own random salt and KDF parameters, plus a
//! verifier token used to reject a wrong master secret before any credential
//! is touched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{Cipher, KdfParams, Salt, SecretString};
use crate::error::{Result, VaultError};

/// Known plaintext sealed into every verifier token
const VERIFIER_PLAINTEXT: &str = "pwvault-verification";

/// Everything needed to re-derive an account's key from its master secret
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyProfile {
    pub salt: Salt,
    pub kdf: KdfParams,
    /// Token of [`VERIFIER_PLAINTEXT`] under the account key
    pub verifier: String,
}

impl KeyProfile {
    /// Create a profile with a fresh random salt
    pub fn create(master_secret: &SecretString, kdf: KdfParams) -> Result<(Self, Cipher)> {
        Self::with_salt(master_secret, Salt::generate(), kdf)
    }

    /// Profile matching the fixed salt and parameters of earlier releases.
    ///
    /// Those releases fed the user's stored bcrypt hash string (the
    /// `$2b$...` text of the users table), not the login password, into the
    /// KDF, so `stored_hash` is that string.
    pub fn legacy(stored_hash: &SecretString) -> Result<(Self, Cipher)> {
        Self::with_salt(stored_hash, Salt::legacy(), KdfParams::legacy())
    }

    pub fn with_salt(
        master_secret: &SecretString,
        salt: Salt,
        kdf: KdfParams,
    ) -> Result<(Self, Cipher)> {
        let key = kdf.derive(master_secret.expose().as_bytes(), &salt)?;
        let cipher = Cipher::new(key);
        let verifier = cipher.encrypt_str(VERIFIER_PLAINTEXT)?;

        Ok((
            Self {
                salt,
                kdf,
                verifier,
            },
            cipher,
        ))
    }

    /// Derive the account cipher and check it against the verifier.
    ///
    /// Blocking and CPU-bound.
    pub fn unlock(&self, master_secret: &SecretString) -> Result<Cipher> {
        let key = self
            .kdf
            .derive(master_secret.expose().as_bytes(), &self.salt)?;
        let cipher = Cipher::new(key);
        self.verify(&cipher)?;
        Ok(cipher)
    }

    /// Check that `cipher` holds this account's key
    pub fn verify(&self, cipher: &Cipher) -> Result<()> {
        match cipher.decrypt_str(&self.verifier) {
            Ok(plaintext) if plaintext.expose() == VERIFIER_PLAINTEXT => Ok(()),
            Ok(_) | Err(VaultError::AuthenticationFailure) => Err(VaultError::InvalidMasterSecret),
            Err(e) => Err(e),
        }
    }

    /// Whether this account still uses the shared salt of earlier releases
    pub fn is_legacy(&self) -> bool {
        self.salt.is_legacy()
    }
}

/// Check a login password against the bcrypt hash an earlier release stored
/// for the account.
///
/// Blocking and CPU-bound.
pub fn verify_legacy_login(
    login_password: &SecretString,
    stored_hash: &SecretString,
) -> Result<()> {
    match bcrypt::verify(login_password.expose(), stored_hash.expose().trim()) {
        Ok(true) => Ok(()),
        Ok(false) => Err(VaultError::InvalidMasterSecret),
        Err(e) => Err(VaultError::InvalidInput(format!(
            "stored password hash is not a bcrypt hash: {}",
            e
        ))),
    }
}

/// Account record persisted by the storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub username: String,
    pub key_profile: KeyProfile,
    pub created_at: DateTime<Utc>,
}

impl AccountRecord {
    pub fn new(username: &str, key_profile: KeyProfile) -> Self {
        Self {
            username: username.to_string(),
            key_profile,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_kdf() -> KdfParams {
        KdfParams::Pbkdf2Sha256 { iterations: 1000 }
    }

    #[test]
    fn test_create_and_unlock() {
        let secret = SecretString::from("correct-password");
        let (profile, cipher) = KeyProfile::create(&secret, fast_kdf()).unwrap();

        let token = cipher.encrypt_str("value").unwrap();
        let unlocked = profile.unlock(&secret).unwrap();
        assert_eq!(unlocked.decrypt_str(&token).unwrap().expose(), "value");
        assert!(!profile.is_legacy());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let (profile, _) =
            KeyProfile::create(&SecretString::from("correct-password"), fast_kdf()).unwrap();

        let result = profile.unlock(&SecretString::from("wrong-password"));
        assert!(matches!(result, Err(VaultError::InvalidMasterSecret)));
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let result = KeyProfile::create(&SecretString::from(""), fast_kdf());
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
    }

    #[test]
    fn test_same_secret_different_accounts_different_keys() {
        let secret = SecretString::from("shared-password");
        let (alice, alice_cipher) = KeyProfile::create(&secret, fast_kdf()).unwrap();
        let (bob, _) = KeyProfile::create(&secret, fast_kdf()).unwrap();

        assert_ne!(alice.salt, bob.salt);
        assert!(matches!(
            bob.verify(&alice_cipher),
            Err(VaultError::InvalidMasterSecret)
        ));
    }

    #[test]
    fn test_legacy_profile() {
        let secret = SecretString::from("legacy-master");
        let (profile, _) = KeyProfile::legacy(&secret).unwrap();

        assert!(profile.is_legacy());
        assert_eq!(profile.kdf, KdfParams::legacy());
    }

    /// bcrypt hash of "correctbatteryhorsestapler"
    const STORED_HASH: &str = "$2b$04$EGdrhbKUv8Oc9vGiXX0HQOxSg445d458Muh7DAHskb6QbtCvdxcie";

    #[test]
    fn test_verify_legacy_login() {
        let hash = SecretString::from(STORED_HASH);

        verify_legacy_login(&SecretString::from("correctbatteryhorsestapler"), &hash).unwrap();

        let result = verify_legacy_login(&SecretString::from("wrong"), &hash);
        assert!(matches!(result, Err(VaultError::InvalidMasterSecret)));

        let result = verify_legacy_login(
            &SecretString::from("correctbatteryhorsestapler"),
            &SecretString::from("not-a-hash"),
        );
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
    }

    #[test]
    fn test_profile_serialization_roundtrip() {
        let secret = SecretString::from("password");
        let (profile, _) = KeyProfile::create(&secret, fast_kdf()).unwrap();
        let record = AccountRecord::new("alice", profile);

        let json = serde_json::to_string(&record).unwrap();
        let parsed: AccountRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.username, "alice");
        assert_eq!(parsed.key_profile.salt, record.key_profile.salt);
        parsed.key_profile.unlock(&secret).unwrap();
    }
}
