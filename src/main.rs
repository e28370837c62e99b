//! Credbroker - OS-native credential storage
//!
//! CLI entry point.

#![forbid(unsafe_code)]

use clap::Parser;
use credbroker_core::{format_error_for_cli, CredentialError};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    // stdout carries command output; logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credbroker=warn,credbroker_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = cli::Cli::parse();

    match cli::run(cli) {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<CredentialError>() {
                Some(error) => eprint!("{}", format_error_for_cli(error)),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::from(2)
        }
    }
}
