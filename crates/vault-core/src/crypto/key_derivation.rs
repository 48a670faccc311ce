//! Password-based key derivation
//!
//! New accounts derive their key with PBKDF2-HMAC-SHA256 (or Argon2id when
//! configured) over a random per-account salt. The constant salt written by
//! earlier releases is still accepted so their data stays readable.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::secure_memory::{DerivedKey, KEY_LEN};
use crate::error::{Result, VaultError};

/// Length of freshly generated salts in bytes
pub const SALT_LEN: usize = 16;

/// PBKDF2 iteration count used for new accounts
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 600_000;

/// PBKDF2 iteration count used by earlier releases
pub const LEGACY_PBKDF2_ITERATIONS: u32 = 100_000;

/// Hard ceiling on PBKDF2 iterations; bounds worst-case unlock latency
pub const MAX_ITERATIONS: u32 = 10_000_000;

/// Hard ceiling on Argon2id memory cost (1 GiB)
pub const MAX_ARGON2_MEMORY_KIB: u32 = 1024 * 1024;

/// Hard ceiling on Argon2id passes
pub const MAX_ARGON2_PASSES: u32 = 64;

/// Hard ceiling on Argon2id lanes
pub const MAX_ARGON2_PARALLELISM: u32 = 16;

/// Salt shared by every account created before per-account salts existed
const LEGACY_SALT: &[u8] = b"password_manager_salt";

/// Key derivation salt, persisted as hex next to the account record
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Generate a cryptographically secure random salt
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// The constant salt used by earlier releases
    pub fn legacy() -> Self {
        Self(LEGACY_SALT.to_vec())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_legacy(&self) -> bool {
        self.0 == LEGACY_SALT
    }
}

impl TryFrom<String> for Salt {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        hex::decode(value).map(Self)
    }
}

impl From<Salt> for String {
    fn from(salt: Salt) -> Self {
        hex::encode(salt.0)
    }
}

impl std::fmt::Debug for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Salt").field(&hex::encode(&self.0)).finish()
    }
}

/// Key derivation algorithm and its cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum KdfParams {
    /// PBKDF2 with HMAC-SHA256
    Pbkdf2Sha256 { iterations: u32 },
    /// Argon2id (memory-hard)
    Argon2id {
        /// Memory cost in KiB
        memory_kib: u32,
        /// Time cost / passes
        iterations: u32,
        parallelism: u32,
    },
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::Pbkdf2Sha256 {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// Parameters used by earlier releases
    pub fn legacy() -> Self {
        Self::Pbkdf2Sha256 {
            iterations: LEGACY_PBKDF2_ITERATIONS,
        }
    }

    /// Argon2id with 64 MiB, 3 passes, 4 lanes
    pub fn argon2id() -> Self {
        Self::Argon2id {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }

    pub fn iterations(&self) -> u32 {
        match self {
            Self::Pbkdf2Sha256 { iterations } | Self::Argon2id { iterations, .. } => *iterations,
        }
    }

    /// Reject parameters whose cost exceeds the configured PBKDF2 ceiling or
    /// the fixed Argon2id limits
    pub fn check_cap(&self, max_iterations: u32) -> Result<()> {
        match *self {
            Self::Pbkdf2Sha256 { iterations } if iterations > max_iterations => {
                Err(VaultError::UnsupportedParameters(format!(
                    "iteration count {} exceeds configured maximum {}",
                    iterations, max_iterations
                )))
            }
            Self::Pbkdf2Sha256 { .. } => Ok(()),
            Self::Argon2id {
                memory_kib,
                iterations,
                parallelism,
            } => check_argon2_cost(memory_kib, iterations, parallelism),
        }
    }

    /// Derive a 256-bit key with these parameters.
    ///
    /// Blocking and CPU-bound; keep it off latency-sensitive threads.
    pub fn derive(&self, master_secret: &[u8], salt: &Salt) -> Result<DerivedKey> {
        match *self {
            Self::Pbkdf2Sha256 { iterations } => {
                derive_key(master_secret, salt.as_bytes(), iterations)
            }
            Self::Argon2id {
                memory_kib,
                iterations,
                parallelism,
            } => derive_key_argon2id(
                master_secret,
                salt.as_bytes(),
                memory_kib,
                iterations,
                parallelism,
            ),
        }
    }
}

fn check_secret_and_salt(master_secret: &[u8], salt: &[u8]) -> Result<()> {
    if master_secret.is_empty() {
        return Err(VaultError::InvalidInput("master secret is empty".to_string()));
    }
    if salt.is_empty() {
        return Err(VaultError::InvalidInput("salt is empty".to_string()));
    }
    Ok(())
}

fn check_iterations(iterations: u32) -> Result<()> {
    if iterations == 0 {
        return Err(VaultError::UnsupportedParameters(
            "iteration count must be positive".to_string(),
        ));
    }
    if iterations > MAX_ITERATIONS {
        return Err(VaultError::UnsupportedParameters(format!(
            "iteration count {} exceeds maximum {}",
            iterations, MAX_ITERATIONS
        )));
    }
    Ok(())
}

fn check_argon2_cost(memory_kib: u32, passes: u32, parallelism: u32) -> Result<()> {
    if passes == 0 || passes > MAX_ARGON2_PASSES {
        return Err(VaultError::UnsupportedParameters(format!(
            "argon2 passes must be in 1..={}, got {}",
            MAX_ARGON2_PASSES, passes
        )));
    }
    if memory_kib > MAX_ARGON2_MEMORY_KIB {
        return Err(VaultError::UnsupportedParameters(format!(
            "argon2 memory {} KiB exceeds maximum {} KiB",
            memory_kib, MAX_ARGON2_MEMORY_KIB
        )));
    }
    if parallelism == 0 || parallelism > MAX_ARGON2_PARALLELISM {
        return Err(VaultError::UnsupportedParameters(format!(
            "argon2 parallelism must be in 1..={}, got {}",
            MAX_ARGON2_PARALLELISM, parallelism
        )));
    }
    Ok(())
}

/// Derive a 256-bit key from a master secret using PBKDF2-HMAC-SHA256
///
/// # Arguments
/// * `master_secret` - The user's master secret (non-empty)
/// * `salt` - Per-account salt (non-empty)
/// * `iterations` - PBKDF2 rounds, `1..=MAX_ITERATIONS`
///
/// # Returns
/// A 32-byte key suitable for AES-256-GCM. Identical inputs always give the
/// identical key.
pub fn derive_key(master_secret: &[u8], salt: &[u8], iterations: u32) -> Result<DerivedKey> {
    check_secret_and_salt(master_secret, salt)?;
    check_iterations(iterations)?;

    let mut key_bytes = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(master_secret, salt, iterations, &mut key_bytes);

    let key = DerivedKey::new(key_bytes);
    zeroize::Zeroize::zeroize(&mut key_bytes);
    Ok(key)
}

/// Derive a 256-bit key using Argon2id
///
/// Memory, passes, and lanes are bounded by [`MAX_ARGON2_MEMORY_KIB`],
/// [`MAX_ARGON2_PASSES`], and [`MAX_ARGON2_PARALLELISM`].
pub fn derive_key_argon2id(
    master_secret: &[u8],
    salt: &[u8],
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
) -> Result<DerivedKey> {
    check_secret_and_salt(master_secret, salt)?;
    check_argon2_cost(memory_kib, iterations, parallelism)?;

    let params = Params::new(memory_kib, iterations, parallelism, Some(KEY_LEN))
        .map_err(|e| VaultError::UnsupportedParameters(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key_bytes = [0u8; KEY_LEN];
    argon2
        .hash_password_into(master_secret, salt, &mut key_bytes)
        .map_err(|e| VaultError::UnsupportedParameters(e.to_string()))?;

    let key = DerivedKey::new(key_bytes);
    zeroize::Zeroize::zeroize(&mut key_bytes);
    Ok(key)
}
