//! Listey CLI - reconcile list documents offline
//!
//! Runs the same reconciliation the server performs, on two JSON files.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::reconcile::run_reconcile;
use crate::error::CliError;

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("listey_core={level}").parse().expect("valid directive"))
                .add_directive(format!("listey_cli={level}").parse().expect("valid directive")),
        )
        .init();

    match cli.command {
        Commands::Reconcile {
            server,
            client,
            owner,
            json,
            output,
        } => run_reconcile(&server, &client, &owner, json, output.as_deref())?,
    }

    Ok(())
}
