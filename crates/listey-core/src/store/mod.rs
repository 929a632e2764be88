//! Record format and storage collaborators

mod memory;
mod plan;
mod record;

pub use memory::MemoryStore;
pub use plan::SyncPlan;
pub use record::{KeySegment, Record, RecordKey, USER_KIND};
