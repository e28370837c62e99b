//! Linux Secret Service backend
//!
//! Entries are created with `secret-tool` and tagged
//! `application=<namespace>`. The credential id was originally stored under a
//! `target` attribute and is now stored under `id`; both are read, only `id` is
//! written, and every write first clears the id under both attributes.
//!
//! The username is not a native field: it rides along as a `username`
//! attribute on the same entry.

use super::backend::SecretStore;
use super::credential::Credential;
use super::error::{require_pair, CredentialError, Result};
use super::secret_bytes::SecretBytes;
use crate::kv;
use crate::process::{CommandOutput, CommandRunner};
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

const APPLICATION_ATTR: &str = "application";
const USERNAME_ATTR: &str = "username";
const ATTRIBUTE_PREFIX: &str = "attribute.";

/// Attribute under which an id is tagged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Schema {
    /// `id=<id>`
    Current,
    /// `target=<id>`
    Legacy,
}

impl Schema {
    fn key(self) -> &'static str {
        match self {
            Self::Current => "id",
            Self::Legacy => "target",
        }
    }
}

/// Lookup order
const SCHEMAS: [Schema; 2] = [Schema::Current, Schema::Legacy];

/// Secret Service adapter driving the `secret-tool` CLI
pub struct SecretServiceBackend {
    runner: Arc<dyn CommandRunner>,
    program: String,
    namespace: String,
}

impl SecretServiceBackend {
    /// Create the backend; fails when `program` is not on `PATH`
    pub fn new(runner: Arc<dyn CommandRunner>, program: &str, namespace: &str) -> Result<Self> {
        if runner.locate(program).is_none() {
            return Err(CredentialError::BackendUnavailable(format!(
                "`{}` not found on PATH (install libsecret-tools)",
                program
            )));
        }

        Ok(Self {
            runner,
            program: program.to_string(),
            namespace: namespace.to_string(),
        })
    }

    fn secret_tool(
        &self,
        subcommand: &str,
        options: &[String],
        attributes: &[(&str, &str)],
        stdin: Option<Vec<u8>>,
    ) -> Result<CommandOutput> {
        let mut args = Vec::with_capacity(1 + options.len() + attributes.len() * 2);
        args.push(subcommand.to_string());
        args.extend(options.iter().cloned());
        for (key, value) in attributes {
            args.push((*key).to_string());
            args.push((*value).to_string());
        }

        self.runner
            .run(&self.program, &args, stdin)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    CredentialError::BackendUnavailable(format!("`{}` not found", self.program))
                }
                _ => CredentialError::Backend(format!("Failed to run {}: {}", self.program, e)),
            })
    }

    fn identity<'a>(&'a self, schema: Schema, id: &'a str) -> [(&'a str, &'a str); 2] {
        [(schema.key(), id), (APPLICATION_ATTR, self.namespace.as_str())]
    }

    fn lookup(&self, schema: Schema, id: &str) -> Result<Option<SecretBytes>> {
        let out = self.secret_tool("lookup", &[], &self.identity(schema, id), None)?;

        if out.success() && !out.stdout.is_empty() {
            return Ok(Some(SecretBytes::from(out.stdout.as_slice())));
        }
        if !out.success() && !out.stderr.trim().is_empty() {
            return Err(CredentialError::Backend(format!(
                "secret-tool lookup failed: {}",
                out.stderr.trim()
            )));
        }
        Ok(None)
    }

    /// `attribute.*` pairs printed by `secret-tool search`
    ///
    /// libsecret prints the item header and secret on stdout and the
    /// attributes on stderr; both streams are read, attribute lines only.
    fn search_attributes(&self, query: &[(&str, &str)]) -> Result<Vec<(String, String)>> {
        let out = self.secret_tool("search", &["--all".to_string()], query, None)?;

        if !out.success() {
            if out.stderr.trim().is_empty() {
                return Ok(Vec::new());
            }
            return Err(CredentialError::Backend(format!(
                "secret-tool search failed: {}",
                out.stderr.trim()
            )));
        }

        let stdout = out.stdout_text();
        let mut attributes = Vec::new();
        for stream in [stdout.as_str(), out.stderr.as_str()] {
            for record in kv::parse_verbatim_records(&attribute_lines(stream))? {
                for (key, value) in record.pairs {
                    if let Some(name) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                        attributes.push((name.to_string(), value));
                    }
                }
            }
        }

        Ok(attributes)
    }

    fn username(&self, schema: Schema, id: &str) -> Result<Option<String>> {
        Ok(self
            .search_attributes(&self.identity(schema, id))?
            .into_iter()
            .find(|(name, value)| name == USERNAME_ATTR && !value.is_empty())
            .map(|(_, value)| value))
    }

    fn clear(&self, schema: Schema, id: &str) -> Result<bool> {
        let out = self.secret_tool("clear", &[], &self.identity(schema, id), None)?;
        debug!(id = %id, ?schema, status = ?out.status, "Secret Service clear issued");
        Ok(out.success())
    }
}

/// The `attribute.*` lines of search output
///
/// The `secret = ` value is printed raw and may span lines; everything from
/// it up to the item's `created = ` line is skipped.
fn attribute_lines(output: &str) -> Zeroizing<String> {
    let mut kept = Zeroizing::new(String::new());
    let mut in_secret = false;

    for line in output.lines() {
        if line.starts_with("secret = ") || line == "secret =" {
            in_secret = true;
            continue;
        }
        if in_secret {
            if !line.starts_with("created = ") {
                continue;
            }
            in_secret = false;
        }
        if line.starts_with(ATTRIBUTE_PREFIX) {
            kept.push_str(line);
            kept.push('\n');
        }
    }

    kept
}

impl fmt::Debug for SecretServiceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretServiceBackend")
            .field("program", &self.program)
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl SecretStore for SecretServiceBackend {
    fn get(&self, id: &str) -> Result<Option<Credential>> {
        for schema in SCHEMAS {
            let Some(secret) = self.lookup(schema, id)? else {
                continue;
            };

            return match self.username(schema, id)? {
                Some(username) => Ok(Some(Credential::new(id, username, secret))),
                None => {
                    warn!(id = %id, ?schema, "Secret has no username attribute, treating as not found");
                    Ok(None)
                }
            };
        }

        Ok(None)
    }

    fn set(&self, id: &str, username: &str, secret: &SecretBytes) -> Result<bool> {
        require_pair(username, secret)?;

        for schema in SCHEMAS {
            self.clear(schema, id)?;
        }

        let label = format!("--label={}:{}", self.namespace, id);
        let out = self.secret_tool(
            "store",
            &[label],
            &[
                (Schema::Current.key(), id),
                (USERNAME_ATTR, username),
                (APPLICATION_ATTR, self.namespace.as_str()),
            ],
            Some(secret.expose().to_vec()),
        )?;

        if !out.success() {
            return Err(CredentialError::Backend(format!(
                "secret-tool store failed: {}",
                out.stderr.trim()
            )));
        }

        debug!(id = %id, "Secret Service entry written");
        Ok(true)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let mut cleared = false;
        for schema in SCHEMAS {
            cleared |= self.clear(schema, id)?;
        }
        if cleared {
            return Ok(true);
        }

        // Neither clear reported success: fine as long as nothing is left.
        for schema in SCHEMAS {
            if self.lookup(schema, id)?.is_some() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn list(&self) -> Result<Vec<String>> {
        let attributes =
            self.search_attributes(&[(APPLICATION_ATTR, self.namespace.as_str())])?;

        let mut seen = HashSet::new();
        let ids = attributes
            .into_iter()
            .filter(|(name, value)| {
                SCHEMAS.iter().any(|schema| schema.key() == name) && !value.is_empty()
            })
            .map(|(_, value)| value)
            .filter(|value| seen.insert(value.clone()))
            .collect();

        Ok(ids)
    }
}
