//! Username shadow file for the macOS Keychain backend
//!
//! The keychain entry uses the credential id as its account, so the caller's
//! username has nowhere to live natively. It is kept here as a flat
//! `id = username` file in the home directory.
//!
//! Every update is a read-modify-write of the whole file, performed while
//! holding an exclusive lock on `<file>.lock` and finished with an atomic
//! rename, so concurrent brokers do not lose each other's updates. The file and
//! the keychain are still updated separately: a crash between the two can
//! leave them out of step.

use super::error::{CredentialError, Result};
use crate::kv;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const FILE_NAME: &str = ".credbroker_shadow";
const HEADER: &str = "# credbroker shadow store: id = username\n";

/// File-backed `id -> username` mapping
#[derive(Debug, Clone)]
pub struct ShadowStore {
    path: PathBuf,
}

impl ShadowStore {
    /// Use the file at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.credbroker_shadow`
    pub fn default_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(FILE_NAME))
            .ok_or_else(|| {
                CredentialError::Configuration("Cannot determine home directory".to_string())
            })
    }

    /// Location of the shadow file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole mapping. A missing file is an empty mapping.
    pub fn load(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(kv::parse_map(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Username recorded for `id`
    pub fn username(&self, id: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(id))
    }

    /// All recorded ids
    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    /// Record (or replace) the username for `id`
    pub fn record(&self, id: &str, username: &str) -> Result<()> {
        self.update(|map| {
            map.insert(id.to_string(), username.to_string());
        })
    }

    /// Drop `id`; returns whether it was present
    pub fn forget(&self, id: &str) -> Result<bool> {
        self.update(|map| map.remove(id).is_some())
    }

    /// Locked read-modify-write of the mapping
    ///
    /// The file is only rewritten when `f` changed the mapping.
    pub fn update<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> Result<T> {
        let _guard = self.lock()?;

        let mut map = self.load()?;
        let before = map.clone();
        let out = f(&mut map);

        if map != before {
            self.write(&map)?;
            debug!(path = %self.path.display(), entries = map.len(), "Shadow store updated");
        }

        Ok(out)
    }

    fn parent(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn lock(&self) -> Result<LockGuard> {
        fs::create_dir_all(self.parent())?;

        let mut lock_path = self.path.clone().into_os_string();
        lock_path.push(".lock");

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(PathBuf::from(lock_path))?;
        file.lock()?;

        Ok(LockGuard { file })
    }

    fn write(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(self.parent())?;
        tmp.write_all(HEADER.as_bytes())?;
        tmp.write_all(kv::write_map(map).as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
