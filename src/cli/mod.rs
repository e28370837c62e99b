//! CLI module for Credbroker
//!
//! Provides commands:
//! - `set` / `get` / `list` / `remove` / `test`: credential operations
//! - `config`: print the effective configuration

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use credbroker_core::{
    load_config, BackendKind, BrokerConfig, CredentialBroker, RemoveStatus, SecretBytes,
};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use zeroize::Zeroize;

pub mod prompts;

/// Credential broker for the OS-native secret store
#[derive(Parser, Debug)]
#[command(name = "credbroker")]
#[command(about = "Store, fetch, list and remove credentials in the OS-native secret store")]
#[command(version)]
pub struct Cli {
    /// Configuration file layered over the defaults
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the configured backend
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// `--backend` values
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendArg {
    /// Pick the native store for this OS
    Auto,
    /// Windows Credential Manager
    Windows,
    /// macOS Keychain
    Keychain,
    /// Linux Secret Service
    SecretService,
    /// Process-local, nothing persisted
    Memory,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendKind::Auto,
            BackendArg::Windows => BackendKind::Windows,
            BackendArg::Keychain => BackendKind::Keychain,
            BackendArg::SecretService => BackendKind::SecretService,
            BackendArg::Memory => BackendKind::Memory,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a credential
    Set {
        /// Credential id
        id: String,
        /// Username stored with the secret
        #[arg(short, long)]
        username: String,
        /// Secret value (prompted for when omitted)
        #[arg(short, long)]
        secret: Option<String>,
        /// Overwrite an existing credential
        #[arg(short, long)]
        force: bool,
    },
    /// Show a credential
    Get {
        /// Credential id
        id: String,
        /// Print the secret
        #[arg(long)]
        reveal: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored credentials (secrets are never printed)
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a credential
    Remove {
        /// Credential id
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Exit 0 when the credential exists, 1 otherwise
    Test {
        /// Credential id
        id: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Serialize)]
struct CredentialView {
    id: String,
    username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
}

/// Load configuration and apply command-line overrides
pub fn resolve_config(cli: &Cli) -> credbroker_core::Result<BrokerConfig> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }
    debug!(backend = ?config.backend, namespace = %config.namespace, "Configuration resolved");
    Ok(config)
}

/// Run the CLI command
pub fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let Some(command) = cli.command.as_ref() else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(ExitCode::SUCCESS);
    };

    let config = resolve_config(&cli)?;

    if let Commands::Config = command {
        let text = toml::to_string_pretty(&config).context("Failed to render configuration")?;
        print!("{}", text);
        return Ok(ExitCode::SUCCESS);
    }

    let broker = CredentialBroker::new(&config)?.with_confirmation(prompts::PromptConfirm);

    match command {
        Commands::Set {
            id,
            username,
            secret,
            force,
        } => {
            let secret = match secret {
                Some(value) => SecretBytes::from(value.as_str()),
                None => prompts::secret("Secret:")?,
            };
            let summary = broker.set(id, username, &secret, *force)?;
            println!("✅ Stored '{}' for {}", summary.id, summary.username);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Get { id, reveal, json } => {
            let Some(credential) = broker.get(id)? else {
                eprintln!("Credential '{}' not found", id);
                return Ok(ExitCode::FAILURE);
            };

            let mut view = CredentialView {
                id: credential.id.clone(),
                username: credential.username.clone(),
                secret: reveal
                    .then(|| String::from_utf8_lossy(credential.secret().expose()).into_owned()),
            };

            if *json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("id:       {}", view.id);
                println!("username: {}", view.username);
                match &view.secret {
                    Some(secret) => println!("secret:   {}", secret),
                    None => println!("secret:   {}", credential.secret()),
                }
            }
            view.secret.zeroize();
            Ok(ExitCode::SUCCESS)
        }
        Commands::List { json } => {
            let summaries: Vec<_> = broker.get_all()?.iter().map(|c| c.summary()).collect();

            if *json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                println!("No credentials stored.");
            } else {
                let width = summaries.iter().map(|s| s.id.len()).max().unwrap_or(0);
                let mut out = std::io::stdout().lock();
                for summary in &summaries {
                    writeln!(out, "{:<width$}  {}", summary.id, summary.username)?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Remove { id, force } => {
            let outcome = broker.remove(id, *force)?;
            match outcome.status {
                RemoveStatus::Success => {
                    println!("🗑️  Removed '{}'", outcome.id);
                    Ok(ExitCode::SUCCESS)
                }
                RemoveStatus::Skipped => {
                    println!("Skipped '{}'", outcome.id);
                    Ok(ExitCode::SUCCESS)
                }
                RemoveStatus::Failed => {
                    eprintln!("❌ Could not remove '{}'", outcome.id);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Test { id } => Ok(if broker.test(id)? {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }),
        Commands::Config => Ok(ExitCode::SUCCESS),
    }
}
