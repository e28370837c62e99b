//! Platform detection

use super::error::{CredentialError, Result};
use serde::{Deserialize, Serialize};

/// Operating system classes with a supported native secret store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    /// Windows Credential Manager
    Windows,
    /// macOS Keychain
    MacOs,
    /// Linux Secret Service
    Linux,
}

impl PlatformKind {
    /// Detect the platform this binary runs on
    pub fn detect() -> Result<Self> {
        Self::from_os(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` value to a platform kind
    pub fn from_os(os: &str) -> Result<Self> {
        match os {
            "windows" => Ok(Self::Windows),
            "macos" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            other => Err(CredentialError::UnsupportedPlatform(other.to_string())),
        }
    }
}
