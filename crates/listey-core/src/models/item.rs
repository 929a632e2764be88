//! Item model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::category::CategoryNode;
use super::node::{fields, KeyedSlot, NodeKind, SlotVisitor, Status, TimestampedNode};
use crate::error::Result;
use crate::store::Record;

const fn default_count() -> i64 {
    1
}

/// An entry on a list, optionally tagged with categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemNode {
    pub unique_id: String,
    pub name: String,
    /// Quantity; travels with whichever side wins the node comparison
    #[serde(default = "default_count")]
    pub count: i64,
    #[serde(default)]
    pub status: Status,
    /// Last update timestamp (Unix ms)
    #[serde(default)]
    pub last_update: Option<i64>,
    /// Category tags keyed by category id
    #[serde(default)]
    pub categories: HashMap<String, CategoryNode>,
}

impl Default for ItemNode {
    fn default() -> Self {
        Self {
            unique_id: String::new(),
            name: String::new(),
            count: default_count(),
            status: Status::Active,
            last_update: None,
            categories: HashMap::new(),
        }
    }
}

impl ItemNode {
    #[must_use]
    pub fn new(unique_id: impl Into<String>, name: impl Into<String>, last_update: i64) -> Self {
        Self {
            unique_id: unique_id.into(),
            name: name.into(),
            last_update: Some(last_update),
            ..Self::default()
        }
    }

    /// Tag the item with a category
    #[must_use]
    pub fn with_category(mut self, category: CategoryNode) -> Self {
        self.categories
            .insert(category.unique_id.clone(), category);
        self
    }
}

fn categories(item: &ItemNode) -> &HashMap<String, CategoryNode> {
    &item.categories
}

fn categories_mut(item: &mut ItemNode) -> &mut HashMap<String, CategoryNode> {
    &mut item.categories
}

const CATEGORIES: KeyedSlot<ItemNode, CategoryNode> = KeyedSlot {
    name: "categories",
    entries: categories,
    entries_mut: categories_mut,
};

impl TimestampedNode for ItemNode {
    const KIND: NodeKind = NodeKind::Item;

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

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn shallow_eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
            && self.name == other.name
            && self.last_update == other.last_update
            && self.status == other.status
            && self.count == other.count
    }

    fn shallow_clone(&self) -> Self {
        Self {
            unique_id: self.unique_id.clone(),
            name: self.name.clone(),
            count: self.count,
            status: self.status,
            last_update: self.last_update,
            categories: HashMap::new(),
        }
    }

    fn write_properties(&self, record: &mut Record) {
        record.set(fields::NAME, self.name.as_str());
        record.set(fields::COUNT, self.count);
        record.set(fields::STATUS, self.status.as_str());
        record.set(fields::LAST_UPDATE, self.last_update);
    }

    fn from_record(record: &Record) -> Result<Self> {
        record.ensure_kind(Self::KIND)?;
        Ok(Self {
            unique_id: record.id().to_string(),
            name: record.str_field(fields::NAME)?.to_string(),
            count: record.i64_field(fields::COUNT)?,
            status: record.parse_field(fields::STATUS)?,
            last_update: Some(record.i64_field(fields::LAST_UPDATE)?),
            categories: HashMap::new(),
        })
    }

    fn visit_slots<V: SlotVisitor<Self>>(visitor: &mut V) -> Result<()> {
        visitor.keyed(&CATEGORIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_count_defaults_to_one() {
        let item: ItemNode =
            serde_json::from_str(r#"{"unique_id":"I1","name":"Milk","last_update":5}"#).unwrap();
        assert_eq!(item.count, 1);
        assert_eq!(item.status, Status::Active);
    }

    #[test]
    fn shallow_eq_compares_count_but_not_categories() {
        let base = ItemNode::new("I1", "Milk", 5);
        let tagged = base
            .clone()
            .with_category(CategoryNode::new("C1", "Dairy", 5));
        assert!(base.shallow_eq(&tagged));

        let mut more = base.clone();
        more.count = 3;
        assert!(!base.shallow_eq(&more));
    }

    #[test]
    fn shallow_clone_drops_children() {
        let item = ItemNode::new("I1", "Milk", 5).with_category(CategoryNode::new("C1", "Dairy", 5));
        let copy = item.shallow_clone();
        assert!(copy.categories.is_empty());
        assert!(copy.shallow_eq(&item));
    }
}
