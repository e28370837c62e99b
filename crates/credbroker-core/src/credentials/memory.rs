//! In-memory backend (for testing and dry runs)

use super::backend::SecretStore;
use super::credential::Credential;
use super::error::{handle_lock_poison, require_pair, Result};
use super::secret_bytes::SecretBytes;
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-local store with the same contract as the native backends
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Credential>>,
}

impl MemoryBackend {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemoryBackend {
    fn get(&self, id: &str) -> Result<Option<Credential>> {
        let entries = self.entries.read().map_err(handle_lock_poison)?;
        Ok(entries.get(id).cloned())
    }

    fn set(&self, id: &str, username: &str, secret: &SecretBytes) -> Result<bool> {
        require_pair(username, secret)?;

        let mut entries = self.entries.write().map_err(handle_lock_poison)?;
        entries.insert(id.to_string(), Credential::new(id, username, secret.clone()));
        Ok(true)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries.write().map_err(handle_lock_poison)?;
        entries.remove(id);
        Ok(true)
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(handle_lock_poison)?;
        Ok(entries.keys().cloned().collect())
    }
}
