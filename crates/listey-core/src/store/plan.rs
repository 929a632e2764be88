//! Persistence instructions produced by one reconciliation run

use serde::{Deserialize, Serialize};

use super::record::{Record, RecordKey};

/// Records to upsert and keys to delete, in the order they were scheduled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub persist: Vec<Record>,
    pub delete: Vec<RecordKey>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.persist.is_empty() && self.delete.is_empty()
    }

    /// Keys of the records scheduled for upsert
    pub fn persisted_keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.persist.iter().map(Record::key)
    }
}
