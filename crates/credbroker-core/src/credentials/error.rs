//! Credential error types

use crate::kv::ParseError;
use thiserror::Error;

/// Credential broker errors
///
/// "Not found" is deliberately absent: a missing credential is an empty
/// result, never an error.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The host OS is none of Windows, macOS, Linux
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// A precondition for the backend is missing (e.g. `secret-tool` not on PATH)
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A required field was missing or empty
    #[error("Validation error: {0}")]
    Validation(String),

    /// Set without force on an id that already has a credential
    #[error("Credential '{0}' already exists; use force to overwrite it")]
    AlreadyExists(String),

    /// A native call or external tool reported failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Tool output or the shadow file did not match the key/value grammar
    #[error("Malformed data: {0}")]
    Parse(#[from] ParseError),

    /// Shadow file I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for credential operations
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Handle RwLock poison errors consistently
pub fn handle_lock_poison<T>(e: std::sync::PoisonError<T>) -> CredentialError {
    CredentialError::Backend(format!("Lock poisoned: {}", e))
}

/// Reject an empty required field
pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CredentialError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Adapters require a non-empty username/secret pair
pub(crate) fn require_pair(username: &str, secret: &super::SecretBytes) -> Result<()> {
    require("username", username)?;
    if secret.is_empty() {
        return Err(CredentialError::Validation("secret must not be empty".to_string()));
    }
    Ok(())
}
