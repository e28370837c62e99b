//! Prompt helpers with inquire → stdin fallback.
//!
//! If `inquire` cannot drive the terminal (not a real TTY), prompts fall back
//! to plain stdin. Fallback prompts go to stderr so stdout stays parseable.

use credbroker_core::{RemovalConfirmation, SecretBytes};
use inquire::{Confirm, Password};
use std::io::{self, BufRead, Write};
use zeroize::Zeroizing;

/// Read a line from stdin without its line terminator.
fn read_line() -> anyhow::Result<Zeroizing<String>> {
    read_line_from(io::stdin().lock())
}

/// Read one line, failing once the input is closed.
fn read_line_from(mut reader: impl BufRead) -> anyhow::Result<Zeroizing<String>> {
    let mut input = Zeroizing::new(String::new());
    let read = reader
        .read_line(&mut input)
        .map_err(|e| anyhow::anyhow!("Failed to read input: {}", e))?;
    if read == 0 {
        anyhow::bail!("No input (stdin closed)");
    }
    let trimmed = input.trim_end_matches(['\r', '\n']).len();
    input.truncate(trimmed);
    Ok(input)
}

fn is_cancel(e: &inquire::InquireError) -> bool {
    matches!(
        e,
        inquire::InquireError::OperationCanceled | inquire::InquireError::OperationInterrupted
    )
}

/// Confirm prompt with fallback.
pub fn confirm(message: &str, default: bool) -> anyhow::Result<bool> {
    match Confirm::new(message).with_default(default).prompt() {
        Ok(v) => Ok(v),
        Err(e) if is_cancel(&e) => anyhow::bail!("Cancelled"),
        Err(_) => {
            let hint = if default { "Y/n" } else { "y/N" };
            eprint!("? {} ({}) ", message, hint);
            io::stderr().flush()?;
            let input = read_line()?;
            match input.trim().to_lowercase().as_str() {
                "y" | "yes" => Ok(true),
                "n" | "no" => Ok(false),
                _ => Ok(default),
            }
        }
    }
}

/// Secret prompt (required) with fallback.
pub fn secret(message: &str) -> anyhow::Result<SecretBytes> {
    match Password::new(message)
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_validator(inquire::required!())
        .prompt()
    {
        Ok(v) => Ok(SecretBytes::from(v)),
        Err(e) if is_cancel(&e) => anyhow::bail!("Cancelled"),
        Err(_) => {
            let input = read_required(io::stdin().lock(), message)?;
            Ok(SecretBytes::from(input.as_str()))
        }
    }
}

/// Re-ask until a non-empty line arrives; a closed input is an error.
fn read_required(mut reader: impl BufRead, message: &str) -> anyhow::Result<Zeroizing<String>> {
    loop {
        eprint!("  {} ", message);
        io::stderr().flush()?;
        let input = read_line_from(&mut reader)?;
        if !input.is_empty() {
            return Ok(input);
        }
        eprintln!("  (required)");
    }
}

/// Asks on the terminal before each non-forced removal
#[derive(Debug, Default)]
pub struct PromptConfirm;

impl RemovalConfirmation for PromptConfirm {
    fn confirm_removal(&self, id: &str) -> bool {
        // A cancelled or unreadable prompt counts as "no"
        confirm(&format!("Remove credential '{}'?", id), false).unwrap_or(false)
    }
}
