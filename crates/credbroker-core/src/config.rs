//! Configuration loading
//!
//! Layers, lowest priority first: embedded defaults, the user config file,
//! an explicit file, `CREDBROKER_*` environment variables.

use crate::credentials::{BackendKind, CredentialError, Result, ShadowStore};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Broker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Which backend to use
    pub backend: BackendKind,
    /// Application namespace for native entries
    pub namespace: String,
    /// Shadow file location, `~/.credbroker_shadow` when unset
    pub shadow_file: Option<PathBuf>,
    /// macOS Keychain settings
    pub keychain: KeychainConfig,
    /// Linux Secret Service settings
    pub secret_service: SecretServiceConfig,
}

/// macOS Keychain settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeychainConfig {
    /// `security` executable
    pub program: String,
}

/// Linux Secret Service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretServiceConfig {
    /// `secret-tool` executable
    pub program: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            namespace: "credbroker".to_string(),
            shadow_file: None,
            keychain: KeychainConfig::default(),
            secret_service: SecretServiceConfig::default(),
        }
    }
}

impl Default for KeychainConfig {
    fn default() -> Self {
        Self {
            program: "security".to_string(),
        }
    }
}

impl Default for SecretServiceConfig {
    fn default() -> Self {
        Self {
            program: "secret-tool".to_string(),
        }
    }
}

impl BrokerConfig {
    /// Parse a TOML document layered over the defaults
    pub fn from_toml(text: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .map_err(config_error)?;

        config.try_deserialize().map_err(config_error)
    }

    /// Shadow store for the macOS Keychain backend
    pub fn shadow_store(&self) -> Result<ShadowStore> {
        match &self.shadow_file {
            Some(path) => Ok(ShadowStore::new(path)),
            None => Ok(ShadowStore::new(ShadowStore::default_path()?)),
        }
    }
}

/// `<config_dir>/credbroker/config.toml`
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("credbroker").join("config.toml"))
}

/// Load configuration from defaults, files and environment
pub fn load_config(explicit: Option<&Path>) -> Result<BrokerConfig> {
    let mut builder = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

    // 2. User config (optional)
    if let Some(path) = user_config_path() {
        builder = builder.add_source(File::from(path).required(false));
    }

    // 3. Explicit file (must exist)
    if let Some(path) = explicit {
        debug!(path = %path.display(), "Loading configuration file");
        builder = builder.add_source(File::from(path).required(true));
    }

    // 4. Environment variables (highest priority)
    let config = builder
        .add_source(
            Environment::with_prefix("CREDBROKER")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .map_err(config_error)?;

    config.try_deserialize().map_err(config_error)
}

fn config_error(e: config::ConfigError) -> CredentialError {
    CredentialError::Configuration(e.to_string())
}
