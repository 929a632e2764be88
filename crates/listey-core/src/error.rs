//! Error types for listey-core

use thiserror::Error;

use crate::models::NodeKind;

/// Result type alias using listey-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in listey-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A record of one kind was handed to the constructor of another
    #[error("Wrong record kind: expected {expected}, got {actual}")]
    WrongKind {
        /// Kind the constructor builds
        expected: NodeKind,
        /// Kind the record was written as
        actual: NodeKind,
    },

    /// A field required for conflict resolution or decoding is absent
    #[error("Missing field '{field}' on {kind} {id}")]
    MissingField {
        kind: NodeKind,
        id: String,
        field: &'static str,
    },

    /// A keyed child is stored under a key that is not its own id
    #[error("{kind} {id} is stored under key '{key}' in slot '{slot}'")]
    MisKeyedChild {
        slot: &'static str,
        kind: NodeKind,
        key: String,
        id: String,
    },

    /// A sorted slot is not strictly ascending by id
    #[error("Slot '{slot}' is not sorted by id at '{id}'")]
    UnsortedSlot { slot: &'static str, id: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
