//! Credential Broker - Native secret store access
//!
//! One contract, three native stores:
//! - Windows Credential Manager (`CredReadW`/`CredWriteW`/...)
//! - macOS Keychain (`security` CLI, usernames kept in a shadow file)
//! - Linux Secret Service (`secret-tool` CLI, `id` and legacy `target` attributes)
//!
//! ## Security Features
//!
//! - **SecretBytes**: Uses `zeroize` crate for cryptographic memory wiping
//! - **OS Keychains**: Encryption at rest is left to the platform store
//! - **Debug Safety**: Secrets are redacted in Debug output and never logged

mod backend;
mod broker;
mod credential;
mod error;
mod keychain;
mod memory;
mod platform;
mod secret_bytes;
mod secret_service;
mod shadow;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(test)]
mod testing;

// Re-export all public types
pub use backend::{Backend, BackendKind, SecretStore};
pub use broker::{AutoConfirm, CredentialBroker, RemovalConfirmation};
pub use credential::{Credential, CredentialSummary, RemoveOutcome, RemoveStatus};
pub use error::{handle_lock_poison, CredentialError, Result};
pub use keychain::KeychainBackend;
pub use memory::MemoryBackend;
pub use platform::PlatformKind;
pub use secret_bytes::SecretBytes;
pub use secret_service::SecretServiceBackend;
pub use shadow::ShadowStore;
#[cfg(target_os = "windows")]
pub use windows::WindowsBackend;
