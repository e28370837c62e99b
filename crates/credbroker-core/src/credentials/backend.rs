//! Backend selection and the adapter contract

use super::credential::Credential;
use super::error::{CredentialError, Result};
use super::keychain::KeychainBackend;
use super::memory::MemoryBackend;
use super::platform::PlatformKind;
use super::secret_bytes::SecretBytes;
use super::secret_service::SecretServiceBackend;
#[cfg(target_os = "windows")]
use super::windows::WindowsBackend;
use crate::config::BrokerConfig;
use crate::process::{CommandRunner, SystemRunner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Operations every native store adapter provides
pub trait SecretStore {
    /// Fetch a credential; `Ok(None)` when it does not exist
    fn get(&self, id: &str) -> Result<Option<Credential>>;

    /// Write a credential, replacing any existing one
    fn set(&self, id: &str, username: &str, secret: &SecretBytes) -> Result<bool>;

    /// Delete a credential; deleting an absent id is `Ok(true)`
    fn remove(&self, id: &str) -> Result<bool>;

    /// Ids of all stored credentials, unique, in no particular order
    fn list(&self) -> Result<Vec<String>>;
}

/// Configurable backend choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Automatic selection based on platform
    #[default]
    Auto,
    /// Windows Credential Manager
    Windows,
    /// macOS Keychain
    Keychain,
    /// Linux Secret Service
    SecretService,
    /// In-memory only (for testing)
    Memory,
}

impl BackendKind {
    /// Native backend for a platform
    #[must_use]
    pub fn for_platform(platform: PlatformKind) -> Self {
        match platform {
            PlatformKind::Windows => Self::Windows,
            PlatformKind::MacOs => Self::Keychain,
            PlatformKind::Linux => Self::SecretService,
        }
    }

    /// Resolve Auto to an actual backend
    pub fn resolve(self) -> Result<Self> {
        match self {
            Self::Auto => Ok(Self::for_platform(PlatformKind::detect()?)),
            other => Ok(other),
        }
    }
}

/// The active adapter, chosen once when the broker is built
#[derive(Debug)]
pub enum Backend {
    /// Windows Credential Manager
    #[cfg(target_os = "windows")]
    Windows(WindowsBackend),
    /// macOS Keychain
    Keychain(KeychainBackend),
    /// Linux Secret Service
    SecretService(SecretServiceBackend),
    /// In-memory store
    Memory(MemoryBackend),
}

impl Backend {
    /// Build the backend named by `config`, running tools on the host
    pub fn from_config(config: &BrokerConfig) -> Result<Self> {
        Self::with_runner(config, Arc::new(SystemRunner))
    }

    /// Build the backend named by `config` with a custom process runner
    pub fn with_runner(config: &BrokerConfig, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let kind = config.backend.resolve()?;
        info!(backend = ?kind, namespace = %config.namespace, "Initializing credential backend");

        match kind {
            BackendKind::Windows => Self::windows(),
            BackendKind::Keychain => {
                let shadow = config.shadow_store()?;
                Ok(Self::Keychain(KeychainBackend::new(
                    runner,
                    &config.keychain.program,
                    &config.namespace,
                    shadow,
                )))
            }
            BackendKind::SecretService => Ok(Self::SecretService(SecretServiceBackend::new(
                runner,
                &config.secret_service.program,
                &config.namespace,
            )?)),
            BackendKind::Memory => Ok(Self::Memory(MemoryBackend::new())),
            BackendKind::Auto => Err(CredentialError::Configuration(
                "Backend not resolved".to_string(),
            )),
        }
    }

    #[cfg(target_os = "windows")]
    fn windows() -> Result<Self> {
        Ok(Self::Windows(WindowsBackend::new()))
    }

    #[cfg(not(target_os = "windows"))]
    fn windows() -> Result<Self> {
        Err(CredentialError::BackendUnavailable(
            "Windows Credential Manager only available on Windows".to_string(),
        ))
    }

    /// Which backend this is
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            #[cfg(target_os = "windows")]
            Self::Windows(_) => BackendKind::Windows,
            Self::Keychain(_) => BackendKind::Keychain,
            Self::SecretService(_) => BackendKind::SecretService,
            Self::Memory(_) => BackendKind::Memory,
        }
    }

    fn store(&self) -> &dyn SecretStore {
        match self {
            #[cfg(target_os = "windows")]
            Self::Windows(b) => b,
            Self::Keychain(b) => b,
            Self::SecretService(b) => b,
            Self::Memory(b) => b,
        }
    }
}

impl SecretStore for Backend {
    fn get(&self, id: &str) -> Result<Option<Credential>> {
        self.store().get(id)
    }

    fn set(&self, id: &str, username: &str, secret: &SecretBytes) -> Result<bool> {
        self.store().set(id, username, secret)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        self.store().remove(id)
    }

    fn list(&self) -> Result<Vec<String>> {
        self.store().list()
    }
}
