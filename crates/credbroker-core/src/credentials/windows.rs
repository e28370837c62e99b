//! Windows Credential Manager backend
//!
//! Generic credentials keyed by target name (= credential id). Username is a
//! native field. The secret blob is UTF-16LE text sized `units * 2` bytes with
//! no terminator, which is what other Credential Manager clients expect.
//!
//! Reads cannot tell who wrote a blob. Any even-length blob that decodes as
//! UTF-16LE is taken as text, so a foreign single-byte blob such as ASCII
//! `ab` reads back as U+6261. Only odd-length or ill-formed UTF-16 blobs are
//! returned as raw bytes.

#![allow(unsafe_code)]

use super::backend::SecretStore;
use super::credential::Credential;
use super::error::{require_pair, CredentialError, Result};
use super::secret_bytes::SecretBytes;
use std::ffi::c_void;
use tracing::debug;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::ERROR_NOT_FOUND;
use windows::Win32::Security::Credentials::{
    CredDeleteW, CredEnumerateW, CredFree, CredReadW, CredWriteW, CREDENTIALW,
    CRED_ENUMERATE_FLAGS, CRED_FLAGS, CRED_PERSIST_LOCAL_MACHINE, CRED_TYPE_GENERIC,
};
use zeroize::Zeroize;

/// Credential Manager adapter using the native API
#[derive(Debug, Default)]
pub struct WindowsBackend;

impl WindowsBackend {
    /// Create the backend
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// All generic credentials as records
    pub fn enumerate(&self) -> Result<Vec<Credential>> {
        let mut count = 0u32;
        let mut creds: *mut *mut CREDENTIALW = std::ptr::null_mut();

        match unsafe {
            CredEnumerateW(PCWSTR::null(), CRED_ENUMERATE_FLAGS(0), &mut count, &mut creds)
        } {
            Ok(()) => {}
            Err(e) if is_not_found(&e) => return Ok(Vec::new()),
            Err(e) => return Err(backend_error("CredEnumerateW", &e)),
        }

        let mut records = Vec::with_capacity(count as usize);
        // SAFETY: on success `creds` points at `count` valid credential
        // pointers owned by the API until `CredFree`.
        unsafe {
            for &cred in std::slice::from_raw_parts(creds, count as usize) {
                let cred = &*cred;
                if cred.Type != CRED_TYPE_GENERIC {
                    continue;
                }
                match to_credential(cred) {
                    Some(record) => records.push(record),
                    None => debug!("Skipping credential with unreadable target name"),
                }
            }
            CredFree(creds as *const c_void);
        }

        Ok(records)
    }
}

fn is_not_found(e: &windows::core::Error) -> bool {
    e.code() == ERROR_NOT_FOUND.to_hresult()
}

fn backend_error(call: &str, e: &windows::core::Error) -> CredentialError {
    CredentialError::Backend(format!("{} failed: {}", call, e))
}

/// NUL-terminated UTF-16 for the API's string parameters
fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Secret bytes to the stored blob: UTF-16LE, no terminator
fn encode_blob(secret: &str) -> Vec<u8> {
    secret
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Stored blob to secret bytes. Blobs that are not well-formed UTF-16LE are
/// returned unchanged; see the module docs for the even-length caveat.
fn decode_blob(blob: &[u8]) -> SecretBytes {
    if blob.len() % 2 == 0 {
        let units: Vec<u16> = blob
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        if let Ok(text) = String::from_utf16(&units) {
            return SecretBytes::from(text);
        }
    }
    SecretBytes::from(blob)
}

/// # Safety
/// `cred` must come from `CredReadW`/`CredEnumerateW` and not yet be freed.
unsafe fn to_credential(cred: &CREDENTIALW) -> Option<Credential> {
    let id = cred.TargetName.to_string().ok()?;
    let username = if cred.UserName.is_null() {
        String::new()
    } else {
        cred.UserName.to_string().unwrap_or_default()
    };
    let blob = if cred.CredentialBlob.is_null() || cred.CredentialBlobSize == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(cred.CredentialBlob, cred.CredentialBlobSize as usize)
    };

    Some(Credential::new(id, username, decode_blob(blob)))
}

impl SecretStore for WindowsBackend {
    fn get(&self, id: &str) -> Result<Option<Credential>> {
        let target = wide(id);
        let mut cred: *mut CREDENTIALW = std::ptr::null_mut();

        match unsafe { CredReadW(PCWSTR(target.as_ptr()), CRED_TYPE_GENERIC, 0, &mut cred) } {
            Ok(()) => {}
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(backend_error("CredReadW", &e)),
        }

        // SAFETY: CredReadW succeeded, `cred` is valid until CredFree.
        let record = unsafe {
            let record = to_credential(&*cred);
            CredFree(cred as *const c_void);
            record
        };

        Ok(record.map(|mut record| {
            // Target names are case-insensitive; report the id as asked.
            record.id = id.to_string();
            record
        }))
    }

    fn set(&self, id: &str, username: &str, secret: &SecretBytes) -> Result<bool> {
        require_pair(username, secret)?;
        let text = secret.as_str().ok_or_else(|| {
            CredentialError::Validation("Credential Manager secrets must be valid UTF-8".to_string())
        })?;

        let mut target = wide(id);
        let mut user = wide(username);
        let mut blob = encode_blob(text);
        let blob_size = u32::try_from(blob.len()).map_err(|_| {
            CredentialError::Validation("secret too large for Credential Manager".to_string())
        })?;

        let cred = CREDENTIALW {
            Flags: CRED_FLAGS(0),
            Type: CRED_TYPE_GENERIC,
            TargetName: PWSTR(target.as_mut_ptr()),
            UserName: PWSTR(user.as_mut_ptr()),
            CredentialBlobSize: blob_size,
            CredentialBlob: blob.as_mut_ptr(),
            Persist: CRED_PERSIST_LOCAL_MACHINE,
            ..Default::default()
        };

        // SAFETY: every pointer in `cred` borrows a buffer that outlives the call.
        let result = unsafe { CredWriteW(&cred, 0) };
        blob.zeroize();

        result.map_err(|e| backend_error("CredWriteW", &e))?;
        debug!(id = %id, "Credential Manager entry written");
        Ok(true)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let target = wide(id);

        match unsafe { CredDeleteW(PCWSTR(target.as_ptr()), CRED_TYPE_GENERIC, 0) } {
            Ok(()) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(true),
            Err(e) => Err(backend_error("CredDeleteW", &e)),
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.enumerate()?.into_iter().map(|c| c.id).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}
