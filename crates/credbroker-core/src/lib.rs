//! Credbroker Core - Platform-abstraction credential broker
//!
//! This crate stores, retrieves, enumerates and deletes named credentials
//! through the operating system's native secret store:
//! - Windows Credential Manager (native API)
//! - macOS Keychain (`security` CLI, plus a username shadow file)
//! - Linux Secret Service (`secret-tool` CLI, two attribute schemas)
//!
//! Every backend is driven through the same [`SecretStore`] contract and the
//! [`CredentialBroker`] is the single entry point for callers.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod error;
pub mod kv;
pub mod process;

pub use config::{load_config, BrokerConfig, DEFAULT_CONFIG};
pub use credentials::{
    AutoConfirm, Backend, BackendKind, Credential, CredentialBroker, CredentialError,
    CredentialSummary, KeychainBackend, MemoryBackend, PlatformKind, RemovalConfirmation,
    RemoveOutcome, RemoveStatus, Result, SecretBytes, SecretServiceBackend, SecretStore,
    ShadowStore,
};
pub use error::{format_error_for_cli, UserFriendlyError};
pub use kv::{KvRecord, ParseError};
pub use process::{CommandOutput, CommandRunner, SystemRunner};
