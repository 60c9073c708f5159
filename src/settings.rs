//! CLI settings for veilmark.
//!
//! Settings live in `~/.veilmark/config.toml`. A missing file means defaults.
//!
//! ```toml
//! vault_path = "/home/me/.veilmark/vault.bin"
//!
//! [stego]
//! max_url_length = 2048
//! url_param = "v_data"
//! include_alpha = false
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::StegoConfig;

/// Default vault file name inside the config directory.
pub const VAULT_FILE: &str = "vault.bin";

/// Settings file name inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Errors that can occur when loading or saving settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Config directory not found. Unable to determine home directory.")]
    NoConfigDir,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

/// The settings file stored in TOML format.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Vault file location. Defaults to `~/.veilmark/vault.bin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_path: Option<PathBuf>,

    /// Carrier configuration.
    #[serde(default)]
    pub stego: StegoConfig,
}

impl Settings {
    /// Load settings from the default location.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load settings from `path`, or defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save settings to the default location.
    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::config_path()?)
    }

    /// Save settings to `path`, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the settings file.
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        Ok(get_config_dir()?.join(CONFIG_FILE))
    }

    /// The configured vault path, or the default one.
    pub fn resolve_vault_path(&self) -> Result<PathBuf, SettingsError> {
        match &self.vault_path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_config_dir()?.join(VAULT_FILE)),
        }
    }
}

/// Get the veilmark config directory (`~/.veilmark`).
pub fn get_config_dir() -> Result<PathBuf, SettingsError> {
    dirs::home_dir()
        .map(|home| home.join(".veilmark"))
        .ok_or(SettingsError::NoConfigDir)
}
