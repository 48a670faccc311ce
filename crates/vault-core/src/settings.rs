//! Application settings management
//!
//! Stores non-sensitive configuration in a plain JSON file next to the vault.
//! Settings are readable before any account is unlocked.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::crypto::{KdfParams, MAX_ITERATIONS};
use crate::error::{Result, UNAVAILABLE_PLACEHOLDER};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// Key derivation for newly created or re-keyed accounts
    pub kdf: KdfParams,
    /// Highest PBKDF2 iteration count accepted for an account; Argon2id
    /// profiles are held to fixed memory, pass, and lane limits instead
    pub max_iterations: u32,
    /// Shown in place of secrets that cannot be decrypted
    pub placeholder: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            kdf: KdfParams::default(),
            max_iterations: MAX_ITERATIONS,
            placeholder: UNAVAILABLE_PLACEHOLDER.to_string(),
        }
    }
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Create a new settings manager
    pub fn new(storage_dir: &Path) -> Self {
        let settings_file = storage_dir.join("settings.json");
        let settings = Self::load_from_file(&settings_file).unwrap_or_else(|e| {
            warn!("Ignoring unreadable settings file {:?}: {}", settings_file, e);
            Settings::default()
        });

        Self {
            settings_file,
            settings,
        }
    }

    /// Load settings from file
    fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.settings)?;

        if let Some(parent) = self.settings_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write atomically using temp file
        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.settings_file).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Get mutable settings
    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Update settings and save
    pub async fn update(&mut self, settings: Settings) -> Result<()> {
        self.settings = settings;
        self.save().await
    }

    /// Reset settings to defaults and delete the settings file
    pub async fn reset(&mut self) -> Result<()> {
        self.settings = Settings::default();

        if self.settings_file.exists() {
            tokio::fs::remove_file(&self.settings_file).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_settings_default() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path());

        let settings = manager.get();
        assert_eq!(settings.kdf, KdfParams::Pbkdf2Sha256 { iterations: 600_000 });
        assert_eq!(settings.max_iterations, MAX_ITERATIONS);
        assert_eq!(settings.placeholder, "unavailable");
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();

        // Create and modify settings
        {
            let mut manager = SettingsManager::new(temp_dir.path());
            manager.get_mut().kdf = KdfParams::argon2id();
            manager.get_mut().placeholder = "(hidden)".to_string();
            manager.save().await.unwrap();
        }

        // Load and verify
        {
            let manager = SettingsManager::new(temp_dir.path());
            assert_eq!(manager.get().kdf, KdfParams::argon2id());
            assert_eq!(manager.get().placeholder, "(hidden)");
        }
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("settings.json"),
            r#"{"version":1,"maxIterations":2000000}"#,
        )
        .unwrap();

        let manager = SettingsManager::new(temp_dir.path());
        assert_eq!(manager.get().max_iterations, 2_000_000);
        assert_eq!(manager.get().kdf, KdfParams::default());
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("settings.json"), "{not json").unwrap();

        let manager = SettingsManager::new(temp_dir.path());
        assert_eq!(manager.get().max_iterations, MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn test_reset() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = SettingsManager::new(temp_dir.path());

        manager.get_mut().max_iterations = 1000;
        manager.save().await.unwrap();
        assert!(temp_dir.path().join("settings.json").exists());

        manager.reset().await.unwrap();
        assert_eq!(manager.get().max_iterations, MAX_ITERATIONS);
        assert!(!temp_dir.path().join("settings.json").exists());
    }
}
