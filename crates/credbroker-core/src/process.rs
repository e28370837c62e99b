//! External process execution
//!
//! The macOS and Linux backends drive `security` and `secret-tool`. They do so
//! through [`CommandRunner`] so tests can substitute a scripted store.

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;
use zeroize::Zeroizing;

/// Captured result of one child process
#[derive(Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub status: Option<i32>,
    /// Standard output bytes, exactly as written (may contain a secret)
    pub stdout: Zeroizing<Vec<u8>>,
    /// Standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Successful exit with the given stdout
    #[must_use]
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(0),
            stdout: Zeroizing::new(stdout.into()),
            stderr: String::new(),
        }
    }

    /// Failed exit with the given code and stderr
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: Zeroizing::new(Vec::new()),
            stderr: stderr.into(),
        }
    }

    /// Standard output as text, invalid UTF-8 replaced
    #[must_use]
    pub fn stdout_text(&self) -> Zeroizing<String> {
        Zeroizing::new(String::from_utf8_lossy(&self.stdout).into_owned())
    }

    /// Whether the process exited with status 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

impl fmt::Debug for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOutput")
            .field("status", &self.status)
            .field("stdout", &format_args!("[REDACTED, {} bytes]", self.stdout.len()))
            .field("stderr", &self.stderr)
            .finish()
    }
}

/// Runs external programs on behalf of a backend
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, feeding `stdin` when given, and wait for it.
    ///
    /// An `Err` means the process could not be spawned at all.
    fn run(&self, program: &str, args: &[String], stdin: Option<Vec<u8>>)
        -> io::Result<CommandOutput>;

    /// Resolve `program` on `PATH`
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// [`CommandRunner`] backed by real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<Vec<u8>>,
    ) -> io::Result<CommandOutput> {
        // Arguments can carry secrets (`security ... -w <secret>`): log the
        // subcommand only.
        debug!(
            program = %program,
            subcommand = args.first().map(String::as_str).unwrap_or_default(),
            argc = args.len(),
            "Running external command"
        );

        let mut command = Command::new(program);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = command.spawn()?;

        if let Some(input) = stdin {
            let input = Zeroizing::new(input);
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(&input)?;
            }
        }

        let output = child.wait_with_output()?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: Zeroizing::new(output.stdout),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}
