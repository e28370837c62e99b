//! Credential types

use super::secret_bytes::SecretBytes;
use serde::{Deserialize, Serialize};

/// A stored credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Identifier, unique within the backend namespace
    pub id: String,
    /// Username recorded alongside the secret
    pub username: String,
    /// The secret value
    secret: SecretBytes,
}

impl Credential {
    /// Create a new credential
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<SecretBytes>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Get the secret value
    #[must_use]
    pub fn secret(&self) -> &SecretBytes {
        &self.secret
    }

    /// Secret-free view of this credential
    #[must_use]
    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            id: self.id.clone(),
            username: self.username.clone(),
        }
    }
}

/// Identity of a credential without its secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    /// Identifier
    pub id: String,
    /// Username
    pub username: String,
}

/// Result status of a removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveStatus {
    /// The credential is gone (or was never there)
    Success,
    /// The caller declined the confirmation
    Skipped,
    /// The backend could not remove it
    Failed,
}

/// Outcome of [`CredentialBroker::remove`](super::CredentialBroker::remove)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOutcome {
    /// Identifier that was targeted
    pub id: String,
    /// What happened
    pub status: RemoveStatus,
}
