//! Credential broker: the single entry point for callers

use super::backend::{Backend, BackendKind, SecretStore};
use super::credential::{Credential, CredentialSummary, RemoveOutcome, RemoveStatus};
use super::error::{require, CredentialError, Result};
use super::memory::MemoryBackend;
use super::secret_bytes::SecretBytes;
use crate::config::BrokerConfig;
use std::fmt;
use tracing::{debug, info, warn};

/// Asked before a non-forced removal
pub trait RemovalConfirmation: Send + Sync {
    /// Return `false` to skip removing `id`
    fn confirm_removal(&self, id: &str) -> bool;
}

/// Confirms every removal
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl RemovalConfirmation for AutoConfirm {
    fn confirm_removal(&self, _id: &str) -> bool {
        true
    }
}

/// Credential storage over the platform's native secret store
pub struct CredentialBroker {
    backend: Backend,
    confirmation: Box<dyn RemovalConfirmation>,
}

impl CredentialBroker {
    /// Create a broker for the backend named in `config`
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        Ok(Self::with_backend(Backend::from_config(config)?))
    }

    /// Create with a specific backend
    #[must_use]
    pub fn with_backend(backend: Backend) -> Self {
        info!(backend = ?backend.kind(), "Initializing credential broker");
        Self {
            backend,
            confirmation: Box::new(AutoConfirm),
        }
    }

    /// Create an in-memory broker (for testing)
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_backend(Backend::Memory(MemoryBackend::new()))
    }

    /// Set the hook consulted by non-forced removals
    #[must_use]
    pub fn with_confirmation(mut self, confirmation: impl RemovalConfirmation + 'static) -> Self {
        self.confirmation = Box::new(confirmation);
        self
    }

    /// The active backend kind
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Store a credential
    ///
    /// Without `force`, an existing credential for `id` is left untouched and
    /// [`CredentialError::AlreadyExists`] is returned.
    pub fn set(
        &self,
        id: &str,
        username: &str,
        secret: &SecretBytes,
        force: bool,
    ) -> Result<CredentialSummary> {
        require("id", id)?;
        require("username", username)?;
        if secret.is_empty() {
            return Err(CredentialError::Validation("secret must not be empty".to_string()));
        }

        if !force && self.backend.get(id)?.is_some() {
            debug!(id = %id, "Credential exists and force not set");
            return Err(CredentialError::AlreadyExists(id.to_string()));
        }

        debug!(id = %id, username = %username, force, "Storing credential");
        if !self.backend.set(id, username, secret)? {
            return Err(CredentialError::Backend(format!(
                "backend did not store credential '{}'",
                id
            )));
        }

        Ok(CredentialSummary {
            id: id.to_string(),
            username: username.to_string(),
        })
    }

    /// Retrieve a credential; `Ok(None)` when absent
    pub fn get(&self, id: &str) -> Result<Option<Credential>> {
        require("id", id)?;
        debug!(id = %id, "Retrieving credential");
        self.backend.get(id)
    }

    /// Retrieve every credential the backend lists
    pub fn get_all(&self) -> Result<Vec<Credential>> {
        let ids = self.backend.list()?;
        debug!(count = ids.len(), "Listing credentials");

        let mut credentials = Vec::with_capacity(ids.len());
        for id in ids {
            match self.backend.get(&id)? {
                Some(credential) => credentials.push(credential),
                None => debug!(id = %id, "Listed credential vanished before it was read"),
            }
        }
        Ok(credentials)
    }

    /// Delete a credential
    ///
    /// Without `force` the confirmation hook is asked first. Removing an id
    /// that does not exist is a success.
    pub fn remove(&self, id: &str, force: bool) -> Result<RemoveOutcome> {
        require("id", id)?;

        let outcome = |status| RemoveOutcome {
            id: id.to_string(),
            status,
        };

        if !force && !self.confirmation.confirm_removal(id) {
            debug!(id = %id, "Removal declined");
            return Ok(outcome(RemoveStatus::Skipped));
        }

        debug!(id = %id, "Deleting credential");
        match self.backend.remove(id) {
            Ok(true) => Ok(outcome(RemoveStatus::Success)),
            Ok(false) => {
                warn!(id = %id, "Backend could not remove credential");
                Ok(outcome(RemoveStatus::Failed))
            }
            Err(CredentialError::Backend(msg)) => {
                warn!(id = %id, error = %msg, "Backend failed to remove credential");
                Ok(outcome(RemoveStatus::Failed))
            }
            Err(e) => Err(e),
        }
    }

    /// Check if a credential exists
    pub fn test(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }
}

impl fmt::Debug for CredentialBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBroker")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl Default for CredentialBroker {
    fn default() -> Self {
        Self::in_memory()
    }
}
