//! listey-core - Core library for Listey
//!
//! This crate contains the list/item/category models, the record format
//! handed to storage, permanent id issuance, and the reconciliation engine
//! used by the API server and the CLI.

pub mod error;
pub mod ids;
pub mod models;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
pub use models::{ListNode, TimestampedNode};
pub use sync::{reconcile, SyncOutcome};
