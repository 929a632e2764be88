//! List model

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::category::CategoryNode;
use super::item::ItemNode;
use super::node::{
    fields, KeyedSlot, NodeKind, SlotVisitor, SortedSlot, Status, TimestampedNode,
};
use super::privilege::SharedPrivilege;
use crate::error::Result;
use crate::store::Record;

/// A list, the root of one sync tree
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListNode {
    pub unique_id: String,
    pub name: String,
    #[serde(default)]
    pub status: Status,
    /// Last update timestamp (Unix ms)
    #[serde(default)]
    pub last_update: Option<i64>,
    /// Items keyed by item id
    #[serde(default)]
    pub items: HashMap<String, ItemNode>,
    /// List categories, sorted ascending by id
    #[serde(default)]
    pub categories: Vec<CategoryNode>,
    /// Other users' privileges keyed by user id
    #[serde(default)]
    pub shared_privileges: HashMap<String, SharedPrivilege>,
    /// Category filter currently selected on the client. Mirrored back from
    /// the request; never stored and never compared.
    #[serde(default)]
    pub selected_categories: BTreeSet<String>,
}

impl ListNode {
    #[must_use]
    pub fn new(unique_id: impl Into<String>, name: impl Into<String>, last_update: i64) -> Self {
        Self {
            unique_id: unique_id.into(),
            name: name.into(),
            last_update: Some(last_update),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_item(mut self, item: ItemNode) -> Self {
        self.items.insert(item.unique_id.clone(), item);
        self
    }

    /// Add a category, keeping `categories` sorted by id
    #[must_use]
    pub fn with_category(mut self, category: CategoryNode) -> Self {
        let index = self
            .categories
            .partition_point(|existing| existing.unique_id < category.unique_id);
        self.categories.insert(index, category);
        self
    }

    #[must_use]
    pub fn with_privilege(mut self, privilege: SharedPrivilege) -> Self {
        self.shared_privileges
            .insert(privilege.user_id.clone(), privilege);
        self
    }
}

fn items(list: &ListNode) -> &HashMap<String, ItemNode> {
    &list.items
}

fn items_mut(list: &mut ListNode) -> &mut HashMap<String, ItemNode> {
    &mut list.items
}

fn categories(list: &ListNode) -> &[CategoryNode] {
    &list.categories
}

fn categories_mut(list: &mut ListNode) -> &mut Vec<CategoryNode> {
    &mut list.categories
}

fn privileges(list: &ListNode) -> &HashMap<String, SharedPrivilege> {
    &list.shared_privileges
}

fn privileges_mut(list: &mut ListNode) -> &mut HashMap<String, SharedPrivilege> {
    &mut list.shared_privileges
}

const ITEMS: KeyedSlot<ListNode, ItemNode> = KeyedSlot {
    name: "items",
    entries: items,
    entries_mut: items_mut,
};

const CATEGORIES: SortedSlot<ListNode, CategoryNode> = SortedSlot {
    name: "categories",
    entries: categories,
    entries_mut: categories_mut,
};

const SHARED_PRIVILEGES: KeyedSlot<ListNode, SharedPrivilege> = KeyedSlot {
    name: "shared_privileges",
    entries: privileges,
    entries_mut: privileges_mut,
};

impl TimestampedNode for ListNode {
    const KIND: NodeKind = NodeKind::List;

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
    }

    fn shallow_clone(&self) -> Self {
        Self {
            unique_id: self.unique_id.clone(),
            name: self.name.clone(),
            status: self.status,
            last_update: self.last_update,
            ..Self::default()
        }
    }

    fn write_properties(&self, record: &mut Record) {
        record.set(fields::NAME, self.name.as_str());
        record.set(fields::STATUS, self.status.as_str());
        record.set(fields::LAST_UPDATE, self.last_update);
    }

    fn from_record(record: &Record) -> Result<Self> {
        record.ensure_kind(Self::KIND)?;
        Ok(Self {
            unique_id: record.id().to_string(),
            name: record.str_field(fields::NAME)?.to_string(),
            status: record.parse_field(fields::STATUS)?,
            last_update: Some(record.i64_field(fields::LAST_UPDATE)?),
            ..Self::default()
        })
    }

    fn visit_slots<V: SlotVisitor<Self>>(visitor: &mut V) -> Result<()> {
        visitor.keyed(&ITEMS)?;
        visitor.sorted(&CATEGORIES)?;
        visitor.keyed(&SHARED_PRIVILEGES)
    }

    fn copy_ephemeral_from(&mut self, client: &Self) {
        self.selected_categories
            .clone_from(&client.selected_categories);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::RecordKey;

    #[test]
    fn with_category_keeps_ids_sorted() {
        let list = ListNode::new("L1", "Groceries", 1)
            .with_category(CategoryNode::new("c", "Frozen", 1))
            .with_category(CategoryNode::new("a", "Bakery", 1))
            .with_category(CategoryNode::new("b", "Dairy", 1));
        let ids: Vec<&str> = list.categories.iter().map(|c| c.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn shallow_eq_ignores_selected_categories() {
        let list = ListNode::new("L1", "Groceries", 1);
        let mut selected = list.clone();
        selected.selected_categories.insert("a".to_string());
        assert!(list.shallow_eq(&selected));
    }

    #[test]
    fn record_round_trip_keeps_scalars_only() {
        let parent = RecordKey::user("alice");
        let list = ListNode::new("L1", "Groceries", 42).with_item(ItemNode::new("I1", "Milk", 42));
        let record = list.to_record(&parent);

        let loaded = ListNode::from_record(&record).unwrap();
        assert!(loaded.shallow_eq(&list));
        assert!(loaded.items.is_empty());
    }

    #[test]
    fn from_record_rejects_other_kinds() {
        let parent = RecordKey::user("alice").child("list", "L1");
        let record = ItemNode::new("I1", "Milk", 1).to_record(&parent);
        let err = ListNode::from_record(&record).unwrap_err();
        assert!(matches!(err, Error::WrongKind { .. }));
    }
}
