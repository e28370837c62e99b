//! User-facing error formatting
//!
//! [`CredentialError`] carries the precise failure; this module turns it into
//! a short message plus a hint for the command line.

use crate::credentials::CredentialError;

/// Trait for user-friendly error messages
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for CredentialError {
    fn user_message(&self) -> String {
        match self {
            CredentialError::UnsupportedPlatform(os) => {
                format!("💻 No native secret store is supported on '{}'.", os)
            }
            CredentialError::BackendUnavailable(msg) => {
                format!("🔌 Secret store is not available: {}", msg)
            }
            CredentialError::Validation(msg) => format!("📝 Invalid input: {}", msg),
            CredentialError::AlreadyExists(id) => {
                format!("🔒 Credential '{}' already exists.", id)
            }
            CredentialError::Backend(msg) => format!("🔑 Secret store error: {}", msg),
            CredentialError::Parse(e) => format!("📄 Unexpected data format ({}).", e),
            CredentialError::Io(e) => format!("💾 File error: {}", e),
            CredentialError::Configuration(msg) => format!("⚙️ Configuration error: {}", msg),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            CredentialError::UnsupportedPlatform(_) => Some(
                "💡 Set `backend = \"memory\"` for a process-local store.".to_string(),
            ),
            CredentialError::BackendUnavailable(_) => Some(
                "💡 Install the platform tool (`secret-tool` from libsecret-tools on Linux) or set `backend` in the config.".to_string(),
            ),
            CredentialError::AlreadyExists(_) => {
                Some("💡 Re-run with --force to overwrite it.".to_string())
            }
            CredentialError::Parse(_) => Some(
                "💡 Check the shadow file or the secret store tool version.".to_string(),
            ),
            CredentialError::Configuration(_) => Some(
                "💡 Check config.toml and CREDBROKER_* environment variables; `credbroker config` prints the effective settings.".to_string(),
            ),
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &CredentialError) -> String {
    let mut output = String::new();

    output.push_str(&error.user_message());
    output.push('\n');

    if let Some(suggestion) = error.suggestion() {
        output.push('\n');
        output.push_str(&suggestion);
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::ParseError;

    #[test]
    fn test_already_exists_message() {
        let error = CredentialError::AlreadyExists("svcA".to_string());

        assert!(error.user_message().contains("svcA"));
        assert!(error.suggestion().unwrap().contains("--force"));
    }

    #[test]
    fn test_unavailable_suggests_install() {
        let error = CredentialError::BackendUnavailable("`secret-tool` not found".to_string());

        assert!(error.user_message().contains("secret-tool"));
        assert!(error.suggestion().unwrap().contains("libsecret-tools"));
    }

    #[test]
    fn test_parse_error_never_echoes_content() {
        let error = CredentialError::Parse(ParseError {
            line: 3,
            reason: "expected `key = value`".to_string(),
        });

        let msg = error.user_message();
        assert!(msg.contains("line 3"));
    }

    #[test]
    fn test_backend_error_has_no_suggestion() {
        let error = CredentialError::Backend("CredWriteW failed".to_string());
        assert!(error.suggestion().is_none());
    }

    #[test]
    fn test_format_error_for_cli() {
        let error = CredentialError::Configuration("unknown backend 'foo'".to_string());

        let output = format_error_for_cli(&error);
        assert!(output.contains("Configuration error"));
        assert!(output.contains("💡"));
    }

    #[test]
    fn test_format_without_suggestion() {
        let error = CredentialError::Validation("id must not be empty".to_string());

        let output = format_error_for_cli(&error);
        assert!(output.contains("id must not be empty"));
        assert!(!output.contains("💡"));
    }
}
