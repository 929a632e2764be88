use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "listey")]
#[command(about = "Reconcile Listey list documents from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log every reconciliation decision to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge a client's list document into the server's copy
    Reconcile {
        /// Server list JSON, or `-` when the server has no copy
        #[arg(long, value_name = "PATH")]
        server: PathBuf,
        /// Client list JSON, or `-` when the client has no copy
        #[arg(long, value_name = "PATH")]
        client: PathBuf,
        /// User the list belongs to
        #[arg(long, default_value = "local")]
        owner: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}
