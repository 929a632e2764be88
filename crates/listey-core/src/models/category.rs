//! Category model

use serde::{Deserialize, Serialize};

use super::node::{fields, NodeKind, Status, TimestampedNode};
use crate::error::Result;
use crate::store::Record;

/// A category, used both as a list's taxonomy and as an item's tag
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryNode {
    pub unique_id: String,
    /// Display label
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub status: Status,
    /// Last update timestamp (Unix ms)
    #[serde(default)]
    pub last_update: Option<i64>,
}

impl CategoryNode {
    #[must_use]
    pub fn new(unique_id: impl Into<String>, label: impl Into<String>, last_update: i64) -> Self {
        Self {
            unique_id: unique_id.into(),
            label: label.into(),
            status: Status::Active,
            last_update: Some(last_update),
        }
    }
}

impl TimestampedNode for CategoryNode {
    const KIND: NodeKind = NodeKind::Category;

    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn set_unique_id(&mut self, id: String) {
        self.unique_id = id;
    }

    fn last_update(&self) -> Option<i64> {
        self.last_update
    }

    fn status(&self) -> Status {
        self.status
    }

    fn shallow_eq(&self, other: &Self) -> bool {
        self == other
    }

    fn shallow_clone(&self) -> Self {
        self.clone()
    }

    fn write_properties(&self, record: &mut Record) {
        record.set(fields::LABEL, self.label.as_str());
        record.set(fields::STATUS, self.status.as_str());
        record.set(fields::LAST_UPDATE, self.last_update);
    }

    fn from_record(record: &Record) -> Result<Self> {
        record.ensure_kind(Self::KIND)?;
        Ok(Self {
            unique_id: record.id().to_string(),
            label: record.str_field(fields::LABEL)?.to_string(),
            status: record.parse_field(fields::STATUS)?,
            last_update: Some(record.i64_field(fields::LAST_UPDATE)?),
        })
    }
}
