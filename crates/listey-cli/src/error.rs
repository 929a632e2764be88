use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] listey_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to read {}: {source}", path.display())]
    ReadInput { path: PathBuf, source: io::Error },
    #[error("{} is not a list document: {source}", path.display())]
    InvalidDocument {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid owner: {0}")]
    InvalidOwner(String),
}
