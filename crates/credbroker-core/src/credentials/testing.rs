//! Scripted stand-ins for `security` and `secret-tool`

use crate::process::{CommandOutput, CommandRunner};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// How the fake `security delete-generic-password` misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteQuirk {
    /// Deletes and reports honestly
    #[default]
    None,
    /// Deletes but exits non-zero
    MisreportFailure,
    /// Exits zero on the standard (service + account) delete without deleting
    IgnoreStandardDelete,
    /// Never deletes, always exits zero
    Stuck,
}

/// In-memory emulation of the macOS `security` CLI
#[derive(Debug, Default)]
pub struct FakeSecurity {
    items: Mutex<HashMap<(String, String), String>>,
    quirk: DeleteQuirk,
    deletes: Mutex<usize>,
}

impl FakeSecurity {
    pub fn with_quirk(quirk: DeleteQuirk) -> Self {
        Self {
            quirk,
            ..Self::default()
        }
    }

    pub fn insert(&self, service: &str, account: &str, password: &str) {
        self.items
            .lock()
            .unwrap()
            .insert((service.to_string(), account.to_string()), password.to_string());
    }

    pub fn contains(&self, service: &str, account: &str) -> bool {
        self.items
            .lock()
            .unwrap()
            .contains_key(&(service.to_string(), account.to_string()))
    }

    pub fn delete_calls(&self) -> usize {
        *self.deletes.lock().unwrap()
    }

    fn flags(args: &[String]) -> HashMap<&str, &str> {
        let mut flags = HashMap::new();
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            if matches!(arg.as_str(), "-s" | "-a" | "-w" | "-l") {
                if let Some(value) = iter.next() {
                    flags.insert(arg.as_str(), value.as_str());
                }
            }
        }
        flags
    }
}

/// `password:` line as `security find-generic-password -g` prints it:
/// quoted text when every byte is printable ASCII, hex plus an octal-escaped
/// rendering otherwise
fn password_line(password: &str) -> String {
    let printable = |b: u8| (0x20..0x7f).contains(&b);

    if password.bytes().all(printable) {
        format!("password: \"{password}\"\n")
    } else {
        let escaped: String = password
            .bytes()
            .map(|b| {
                if printable(b) {
                    char::from(b).to_string()
                } else {
                    format!("\\{b:03o}")
                }
            })
            .collect();
        format!("password: 0x{}  \"{}\"\n", hex::encode_upper(password), escaped)
    }
}

impl CommandRunner for FakeSecurity {
    fn run(
        &self,
        _program: &str,
        args: &[String],
        _stdin: Option<Vec<u8>>,
    ) -> io::Result<CommandOutput> {
        let flags = Self::flags(args);
        let service = flags.get("-s").copied().unwrap_or_default().to_string();
        let account = flags.get("-a").map(|a| a.to_string());
        let mut items = self.items.lock().unwrap();

        match args.first().map(String::as_str) {
            Some("find-generic-password") => {
                let key = (service, account.unwrap_or_default());
                Ok(match items.get(&key) {
                    Some(password) => CommandOutput {
                        stderr: password_line(password),
                        ..CommandOutput::ok(format!(
                            "keychain: \"/Users/test/Library/Keychains/login.keychain-db\"\nclass: \"genp\"\nattributes:\n    \"svce\"<blob>=\"{}\"\n",
                            key.0
                        ))
                    },
                    None => CommandOutput::failed(
                        44,
                        "security: SecKeychainSearchCopyNext: The specified item could not be found in the keychain.",
                    ),
                })
            }
            Some("add-generic-password") => {
                let password = flags.get("-w").copied().unwrap_or_default().to_string();
                items.insert((service, account.unwrap_or_default()), password);
                Ok(CommandOutput::ok(""))
            }
            Some("delete-generic-password") => {
                *self.deletes.lock().unwrap() += 1;
                let standard = account.is_some();

                let delete = match self.quirk {
                    DeleteQuirk::Stuck => false,
                    DeleteQuirk::IgnoreStandardDelete => !standard,
                    _ => true,
                };
                let found = if delete {
                    let before = items.len();
                    items.retain(|(s, a), _| {
                        !(s == &service && account.as_ref().is_none_or(|acc| acc == a))
                    });
                    before != items.len()
                } else {
                    true
                };

                Ok(match (self.quirk, found) {
                    (DeleteQuirk::MisreportFailure, _) => {
                        CommandOutput::failed(44, "The specified item could not be found in the keychain.")
                    }
                    (_, true) => CommandOutput::ok(""),
                    (_, false) => CommandOutput::failed(44, "could not be found"),
                })
            }
            _ => Ok(CommandOutput::failed(1, "unknown command")),
        }
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        Some(PathBuf::from("/usr/bin").join(program))
    }
}

#[derive(Debug, Clone)]
struct FakeItem {
    label: String,
    attributes: BTreeMap<String, String>,
    secret: Vec<u8>,
}

/// In-memory emulation of the libsecret `secret-tool` CLI
#[derive(Debug)]
pub struct FakeSecretTool {
    items: Mutex<Vec<FakeItem>>,
    installed: bool,
}

impl Default for FakeSecretTool {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            installed: true,
        }
    }
}

impl FakeSecretTool {
    pub fn not_installed() -> Self {
        Self {
            installed: false,
            ..Self::default()
        }
    }

    /// Seed an item with arbitrary attributes (e.g. a legacy `target` entry)
    pub fn insert(&self, label: &str, attributes: &[(&str, &str)], secret: &str) {
        self.items.lock().unwrap().push(FakeItem {
            label: label.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            secret: secret.as_bytes().to_vec(),
        });
    }

    /// Number of items carrying `key = value`
    pub fn count_with(&self, key: &str, value: &str) -> usize {
        self.items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.attributes.get(key).map(String::as_str) == Some(value))
            .count()
    }

    fn attribute_pairs(args: &[String]) -> BTreeMap<String, String> {
        args.chunks(2)
            .filter(|pair| pair.len() == 2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect()
    }

    fn matches(item: &FakeItem, query: &BTreeMap<String, String>) -> bool {
        query
            .iter()
            .all(|(k, v)| item.attributes.get(k) == Some(v))
    }
}

impl CommandRunner for FakeSecretTool {
    fn run(
        &self,
        _program: &str,
        args: &[String],
        stdin: Option<Vec<u8>>,
    ) -> io::Result<CommandOutput> {
        if !self.installed {
            return Err(io::Error::new(io::ErrorKind::NotFound, "secret-tool"));
        }

        let mut items = self.items.lock().unwrap();
        let rest: Vec<String> = args
            .iter()
            .skip(1)
            .filter(|a| a.as_str() != "--all")
            .cloned()
            .collect();

        match args.first().map(String::as_str) {
            Some("lookup") => {
                let query = Self::attribute_pairs(&rest);
                Ok(match items.iter().find(|item| Self::matches(item, &query)) {
                    Some(item) => CommandOutput::ok(item.secret.clone()),
                    None => CommandOutput::failed(1, ""),
                })
            }
            Some("search") => {
                // Like libsecret: values printed raw, the secret byte for
                // byte, attribute lines on stderr
                let query = Self::attribute_pairs(&rest);
                let mut out = Vec::new();
                let mut err = String::new();
                for (n, item) in items.iter().enumerate() {
                    if !Self::matches(item, &query) {
                        continue;
                    }
                    out.extend_from_slice(
                        format!("[/org/freedesktop/secrets/collection/login/{n}]\n").as_bytes(),
                    );
                    out.extend_from_slice(format!("label = {}\n", item.label).as_bytes());
                    out.extend_from_slice(b"secret = ");
                    out.extend_from_slice(&item.secret);
                    out.push(b'\n');
                    out.extend_from_slice(b"created = 2024-05-01 10:00:00\n");
                    out.extend_from_slice(b"modified = 2024-05-01 10:00:00\n");
                    out.extend_from_slice(b"schema = org.freedesktop.Secret.Generic\n");
                    for (k, v) in &item.attributes {
                        err.push_str(&format!("attribute.{k} = {v}\n"));
                    }
                }
                Ok(if out.is_empty() {
                    CommandOutput::failed(1, "")
                } else {
                    CommandOutput {
                        stderr: err,
                        ..CommandOutput::ok(out)
                    }
                })
            }
            Some("store") => {
                let label = rest
                    .first()
                    .and_then(|a| a.strip_prefix("--label="))
                    .unwrap_or_default()
                    .to_string();
                let attributes = Self::attribute_pairs(&rest[1..]);
                let secret = stdin.unwrap_or_default();

                items.retain(|item| item.attributes != attributes);
                items.push(FakeItem {
                    label,
                    attributes,
                    secret,
                });
                Ok(CommandOutput::ok(""))
            }
            Some("clear") => {
                let query = Self::attribute_pairs(&rest);
                let before = items.len();
                items.retain(|item| !Self::matches(item, &query));
                Ok(if before == items.len() {
                    CommandOutput::failed(1, "")
                } else {
                    CommandOutput::ok("")
                })
            }
            _ => Ok(CommandOutput::failed(2, "usage: secret-tool ...")),
        }
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.installed
            .then(|| PathBuf::from("/usr/bin").join(program))
    }
}
