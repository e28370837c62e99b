//! macOS Keychain backend
//!
//! Entries are generic passwords addressed by `account = id` and
//! `service = "<namespace>:<id>"`. The keychain has no username field apart
//! from the account, so the caller's username is kept in the [`ShadowStore`].
//!
//! `security delete-generic-password` is unreliable: it can fail for an entry
//! that is already gone, or succeed while the entry is still retrievable.
//! Deletes are therefore verified with a lookup and retried once with a
//! broader match.

use super::backend::SecretStore;
use super::credential::Credential;
use super::error::{require_pair, CredentialError, Result};
use super::secret_bytes::SecretBytes;
use super::shadow::ShadowStore;
use crate::process::{CommandOutput, CommandRunner};
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};
use zeroize::Zeroize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeleteVariant {
    /// Match on service and account
    Standard,
    /// Match on the namespaced service alone
    Forceful,
}

/// One delete plus at most one retry
const DELETE_SEQUENCE: [DeleteVariant; 2] = [DeleteVariant::Standard, DeleteVariant::Forceful];

/// Keychain adapter driving the `security` CLI
pub struct KeychainBackend {
    runner: Arc<dyn CommandRunner>,
    program: String,
    namespace: String,
    shadow: ShadowStore,
}

impl KeychainBackend {
    /// Create a backend that runs `program` through `runner`
    #[must_use]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        program: &str,
        namespace: &str,
        shadow: ShadowStore,
    ) -> Self {
        Self {
            runner,
            program: program.to_string(),
            namespace: namespace.to_string(),
            shadow,
        }
    }

    /// The username shadow store
    #[must_use]
    pub fn shadow(&self) -> &ShadowStore {
        &self.shadow
    }

    fn service(&self, id: &str) -> String {
        format!("{}:{}", self.namespace, id)
    }

    fn security(&self, args: &[String]) -> io::Result<CommandOutput> {
        self.runner.run(&self.program, args, None)
    }

    /// Password for `id`. Spawn failures and non-zero exits both mean
    /// "not found".
    ///
    /// `-w` prints a non-ASCII password as bare hex, which cannot be told
    /// apart from an ASCII password made of hex digits. `-g` prints
    /// `password: "<text>"` when every byte is printable and
    /// `password: 0x<HEX>  "<escaped>"` otherwise, so that line is parsed.
    fn lookup(&self, id: &str) -> Option<SecretBytes> {
        let args = [
            "find-generic-password".to_string(),
            "-s".to_string(),
            self.service(id),
            "-a".to_string(),
            id.to_string(),
            "-g".to_string(),
        ];

        match self.security(&args) {
            Ok(mut out) if out.success() => {
                let secret = password_from_output(&out);
                out.stderr.zeroize();
                if secret.is_none() {
                    warn!(id = %id, "Keychain lookup printed no readable password line");
                }
                secret
            }
            Ok(out) => {
                debug!(id = %id, status = ?out.status, "Keychain lookup found nothing");
                None
            }
            Err(e) => {
                debug!(id = %id, error = %e, "Keychain lookup failed to run");
                None
            }
        }
    }

    /// Issue a delete; its exit status is not trusted and is ignored.
    fn delete(&self, id: &str, variant: DeleteVariant) {
        let mut args = vec![
            "delete-generic-password".to_string(),
            "-s".to_string(),
            self.service(id),
        ];
        if variant == DeleteVariant::Standard {
            args.push("-a".to_string());
            args.push(id.to_string());
        }

        match self.security(&args) {
            Ok(out) => debug!(id = %id, ?variant, status = ?out.status, "Keychain delete issued"),
            Err(e) => warn!(id = %id, ?variant, error = %e, "Keychain delete failed to run"),
        }
    }

    fn forget_username(&self, id: &str) {
        if let Err(e) = self.shadow.forget(id) {
            warn!(id = %id, error = %e, "Failed to drop shadow username");
        }
    }

    fn username_for(&self, id: &str) -> String {
        match self.shadow.username(id) {
            Ok(Some(username)) => username,
            Ok(None) => {
                warn!(id = %id, "No shadow username recorded, using id as username");
                id.to_string()
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Shadow store unreadable, using id as username");
                id.to_string()
            }
        }
    }
}

/// The `password:` line of `find-generic-password -g` (stderr, or stdout
/// when the tool's streams are merged)
fn password_from_output(out: &CommandOutput) -> Option<SecretBytes> {
    let stdout = out.stdout_text();
    out.stderr
        .lines()
        .chain(stdout.lines())
        .find_map(|line| line.strip_prefix("password:"))
        .and_then(decode_password)
}

fn decode_password(field: &str) -> Option<SecretBytes> {
    let field = field.strip_prefix(' ').unwrap_or(field);

    if let Some(digits) = field.strip_prefix("0x") {
        let digits = digits.split_whitespace().next().unwrap_or_default();
        return hex::decode(digits).ok().map(SecretBytes::new);
    }
    if field.is_empty() {
        return Some(SecretBytes::default());
    }

    field
        .strip_prefix('"')?
        .strip_suffix('"')
        .map(SecretBytes::from)
}

impl fmt::Debug for KeychainBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeychainBackend")
            .field("program", &self.program)
            .field("namespace", &self.namespace)
            .field("shadow", &self.shadow.path())
            .finish()
    }
}

impl SecretStore for KeychainBackend {
    fn get(&self, id: &str) -> Result<Option<Credential>> {
        let Some(secret) = self.lookup(id) else {
            return Ok(None);
        };

        Ok(Some(Credential::new(id, self.username_for(id), secret)))
    }

    fn set(&self, id: &str, username: &str, secret: &SecretBytes) -> Result<bool> {
        require_pair(username, secret)?;
        let password = secret.as_str().ok_or_else(|| {
            CredentialError::Validation("Keychain secrets must be valid UTF-8".to_string())
        })?;

        let service = self.service(id);
        let mut args = vec![
            "add-generic-password".to_string(),
            "-U".to_string(), // Update if exists
            "-s".to_string(),
            service.clone(),
            "-a".to_string(),
            id.to_string(),
            "-l".to_string(),
            service,
            "-w".to_string(),
            password.to_string(),
        ];
        let result = self.security(&args);
        args.zeroize();

        let output = result.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                CredentialError::BackendUnavailable(format!("`{}` not found", self.program))
            }
            _ => CredentialError::Backend(format!("Failed to run {}: {}", self.program, e)),
        })?;

        if !output.success() {
            return Err(CredentialError::Backend(format!(
                "Keychain error: {}",
                output.stderr.trim()
            )));
        }

        self.shadow.record(id, username)?;
        debug!(id = %id, "Keychain entry written");
        Ok(true)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        if self.lookup(id).is_none() {
            debug!(id = %id, "Keychain entry already absent");
            self.forget_username(id);
            return Ok(true);
        }

        for (attempt, variant) in DELETE_SEQUENCE.into_iter().enumerate() {
            self.delete(id, variant);

            if self.lookup(id).is_none() {
                self.forget_username(id);
                return Ok(true);
            }

            warn!(id = %id, attempt = attempt + 1, "Keychain entry still present after delete");
        }

        Ok(false)
    }

    fn list(&self) -> Result<Vec<String>> {
        let ids = self.shadow.ids()?;
        Ok(ids.into_iter().filter(|id| self.lookup(id).is_some()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::testing::{DeleteQuirk, FakeSecurity};
    use crate::process::MockCommandRunner;
    use tempfile::TempDir;

    fn backend(fake: &Arc<FakeSecurity>, dir: &TempDir) -> KeychainBackend {
        KeychainBackend::new(
            fake.clone(),
            "security",
            "credbroker",
            ShadowStore::new(dir.path().join("shadow")),
        )
    }

    #[test]
    fn test_set_get_round_trip_recovers_username() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeSecurity::default());
        let keychain = backend(&fake, &dir);

        assert!(keychain.set("svcA", "alice", &SecretBytes::from("P@ss1")).unwrap());

        let cred = keychain.get("svcA").unwrap().unwrap();
        assert_eq!(cred.username, "alice");
        assert_eq!(cred.secret().expose(), b"P@ss1");

        // Native entry is namespaced by service, account is the id
        assert!(fake.contains("credbroker:svcA", "svcA"));
    }

    #[test]
    fn test_missing_shadow_falls_back_to_id() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeSecurity::default());
        fake.insert("credbroker:orphan", "orphan", "s3cret");
        let keychain = backend(&fake, &dir);

        let cred = keychain.get("orphan").unwrap().unwrap();
        assert_eq!(cred.username, "orphan");
        assert_eq!(cred.secret().expose(), b"s3cret");
    }

    #[test]
    fn test_get_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeSecurity::default());
        assert!(backend(&fake, &dir).get("nope").unwrap().is_none());
    }

    #[test]
    fn test_get_treats_spawn_failure_as_not_found() {
        let dir = TempDir::new().unwrap();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _, _| Err(io::Error::new(io::ErrorKind::NotFound, "no security")));

        let keychain = KeychainBackend::new(
            Arc::new(runner),
            "security",
            "credbroker",
            ShadowStore::new(dir.path().join("shadow")),
        );
        assert!(keychain.get("svcA").unwrap().is_none());
    }

    #[test]
    fn test_set_missing_tool_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _, _| Err(io::Error::new(io::ErrorKind::NotFound, "no security")));

        let keychain = KeychainBackend::new(
            Arc::new(runner),
            "security",
            "credbroker",
            ShadowStore::new(dir.path().join("shadow")),
        );
        let err = keychain
            .set("svcA", "alice", &SecretBytes::from("x"))
            .unwrap_err();
        assert!(matches!(err, CredentialError::BackendUnavailable(_)));
        assert!(keychain.shadow().load().unwrap().is_empty());
    }

    #[test]
    fn test_set_failure_does_not_touch_shadow() {
        let dir = TempDir::new().unwrap();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|_, args, _| args.first().map(String::as_str) == Some("add-generic-password"))
            .returning(|_, _, _| Ok(CommandOutput::failed(1, "User interaction is not allowed.")));

        let keychain = KeychainBackend::new(
            Arc::new(runner),
            "security",
            "credbroker",
            ShadowStore::new(dir.path().join("shadow")),
        );
        let err = keychain
            .set("svcA", "alice", &SecretBytes::from("x"))
            .unwrap_err();
        assert!(matches!(err, CredentialError::Backend(msg) if msg.contains("interaction")));
        assert!(keychain.shadow().load().unwrap().is_empty());
    }

    #[test]
    fn test_remove_absent_is_success_without_delete() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeSecurity::default());
        let keychain = backend(&fake, &dir);

        assert!(keychain.remove("never").unwrap());
        assert_eq!(fake.delete_calls(), 0);
    }

    #[test]
    fn test_remove_masks_misreported_failure() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeSecurity::with_quirk(DeleteQuirk::MisreportFailure));
        let keychain = backend(&fake, &dir);

        keychain.set("m1", "alice", &SecretBytes::from("pw")).unwrap();
        assert!(keychain.remove("m1").unwrap());
        assert!(keychain.get("m1").unwrap().is_none());
        assert_eq!(fake.delete_calls(), 1);
        assert_eq!(keychain.shadow().username("m1").unwrap(), None);
    }

    #[test]
    fn test_remove_retries_once_with_forceful_variant() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeSecurity::with_quirk(DeleteQuirk::IgnoreStandardDelete));
        let keychain = backend(&fake, &dir);

        keychain.set("m1", "alice", &SecretBytes::from("pw")).unwrap();
        assert!(keychain.remove("m1").unwrap());
        assert!(keychain.get("m1").unwrap().is_none());
        assert_eq!(fake.delete_calls(), 2);
    }

    #[test]
    fn test_remove_gives_up_after_one_retry() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeSecurity::with_quirk(DeleteQuirk::Stuck));
        let keychain = backend(&fake, &dir);

        keychain.set("m1", "alice", &SecretBytes::from("pw")).unwrap();
        assert!(!keychain.remove("m1").unwrap());
        assert_eq!(fake.delete_calls(), 2);
        // Still retrievable, so the username is kept
        assert_eq!(keychain.shadow().username("m1").unwrap().as_deref(), Some("alice"));
    }

    #[test]
    fn test_list_uses_shadow_ids_still_in_keychain() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeSecurity::default());
        let keychain = backend(&fake, &dir);

        keychain.set("a", "alice", &SecretBytes::from("1")).unwrap();
        keychain.set("b", "bob", &SecretBytes::from("2")).unwrap();
        keychain.shadow().record("stale", "ghost").unwrap();

        let mut ids = keychain.list().unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_non_ascii_and_hex_like_secrets_round_trip() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeSecurity::default());
        let keychain = backend(&fake, &dir);

        for (id, secret) in [
            ("accent", "h\u{e9}llo"),
            ("hexlike", "68c3a96c6c6f"),
            ("prefixed", "0xdeadbeef"),
            ("quotes", "a\"b\""),
            ("newline", "line1\nline2"),
        ] {
            keychain.set(id, "alice", &SecretBytes::from(secret)).unwrap();
            let cred = keychain.get(id).unwrap().unwrap();
            assert_eq!(cred.secret().expose(), secret.as_bytes(), "{id}");
        }
    }

    #[test]
    fn test_decode_password_line_forms() {
        assert_eq!(decode_password(" \"P@ss 1\"").unwrap().expose(), b"P@ss 1");
        assert_eq!(
            decode_password(r#" 0x68C3A96C6C6F  "h\303\251llo""#).unwrap().expose(),
            "h\u{e9}llo".as_bytes()
        );
        assert!(decode_password(" ").unwrap().is_empty());
        assert!(decode_password(" 0xZZ").is_none());
        assert!(decode_password(" unquoted").is_none());
    }

    #[test]
    fn test_lookup_reads_password_from_stderr() {
        let dir = TempDir::new().unwrap();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|_, args, _| {
                args.first().map(String::as_str) == Some("find-generic-password")
                    && args.iter().any(|a| a == "-g")
                    && !args.iter().any(|a| a == "-w")
            })
            .returning(|_, _, _| {
                Ok(CommandOutput {
                    stderr: "password: 0x68C3A96C6C6F  \"h\\303\\251llo\"\n".to_string(),
                    ..CommandOutput::ok("keychain: \"/Users/a/Library/Keychains/login.keychain-db\"\n")
                })
            });

        let keychain = KeychainBackend::new(
            Arc::new(runner),
            "security",
            "credbroker",
            ShadowStore::new(dir.path().join("shadow")),
        );
        let cred = keychain.get("svcA").unwrap().unwrap();
        assert_eq!(cred.secret().expose(), "h\u{e9}llo".as_bytes());
    }

    #[test]
    fn test_debug_does_not_show_runner() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeSecurity::default());
        let debug = format!("{:?}", backend(&fake, &dir));
        assert!(debug.contains("credbroker"));
    }
}
