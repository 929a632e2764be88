//! In-memory record store

use std::collections::{BTreeMap, HashMap};

use super::plan::SyncPlan;
use super::record::{Record, RecordKey};
use crate::error::Result;
use crate::models::{KeyedSlot, NodeKind, SlotVisitor, SortedSlot, TimestampedNode};

/// Record store keyed by [`RecordKey`].
///
/// Applies [`SyncPlan`]s after a run completes and rebuilds node trees from
/// their flat records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<RecordKey, Record>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn insert(&mut self, record: Record) {
        self.records.insert(record.key().clone(), record);
    }

    /// Upsert every scheduled record, then remove every scheduled key
    pub fn apply(&mut self, plan: &SyncPlan) {
        for record in &plan.persist {
            self.insert(record.clone());
        }
        for key in &plan.delete {
            self.records.remove(key);
        }
        tracing::debug!(
            persisted = plan.persist.len(),
            deleted = plan.delete.len(),
            total = self.records.len(),
            "Applied sync plan"
        );
    }

    /// Records exactly one level below `parent` with the given kind
    pub fn children<'a>(
        &'a self,
        parent: &'a RecordKey,
        kind: NodeKind,
    ) -> impl Iterator<Item = &'a Record> + 'a {
        let depth = parent.depth() + 1;
        self.records
            .range(parent.clone()..)
            .skip_while(move |(key, _)| *key == parent)
            .take_while(move |(key, _)| parent.is_ancestor_of(key))
            .filter(move |(key, record)| key.depth() == depth && record.kind() == kind)
            .map(|(_, record)| record)
    }

    /// Nodes of kind `T` one level below `parent`, without their subtrees
    pub fn shallow_children<T: TimestampedNode>(&self, parent: &RecordKey) -> Result<Vec<T>> {
        self.children(parent, T::KIND).map(T::from_record).collect()
    }

    /// Rebuild the tree rooted at `key`, or `None` if no record exists there
    pub fn load_tree<T: TimestampedNode>(&self, key: &RecordKey) -> Result<Option<T>> {
        self.records
            .get(key)
            .map(|record| self.assemble(record))
            .transpose()
    }

    fn assemble<T: TimestampedNode>(&self, record: &Record) -> Result<T> {
        let mut node = T::from_record(record)?;
        T::visit_slots(&mut Assemble {
            store: self,
            node: &mut node,
            key: record.key(),
        })?;
        Ok(node)
    }
}

struct Assemble<'a, P> {
    store: &'a MemoryStore,
    node: &'a mut P,
    key: &'a RecordKey,
}

impl<P> SlotVisitor<P> for Assemble<'_, P> {
    fn keyed<C: TimestampedNode>(&mut self, slot: &KeyedSlot<P, C>) -> Result<()> {
        let children = self
            .store
            .children(self.key, C::KIND)
            .map(|record| self.store.assemble::<C>(record))
            .map(|child| child.map(|child| (child.unique_id().to_string(), child)))
            .collect::<Result<HashMap<_, _>>>()?;
        (slot.entries_mut)(self.node).extend(children);
        Ok(())
    }

    fn sorted<C: TimestampedNode>(&mut self, slot: &SortedSlot<P, C>) -> Result<()> {
        let mut children = self
            .store
            .children(self.key, C::KIND)
            .map(|record| self.store.assemble::<C>(record))
            .collect::<Result<Vec<_>>>()?;
        children.sort_by(|a, b| a.unique_id().cmp(b.unique_id()));
        (slot.entries_mut)(self.node).extend(children);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{deep_eq, CategoryNode, ItemNode, ListNode, Privilege, SharedPrivilege};
    use crate::models::walk::subtree_records;

    fn seeded(list: &ListNode) -> (MemoryStore, RecordKey) {
        let owner = RecordKey::user("alice");
        let mut plan = SyncPlan::default();
        subtree_records(list, &owner, &mut plan.persist).unwrap();
        let mut store = MemoryStore::new();
        store.apply(&plan);
        (store, list.record_key(&owner))
    }

    #[test]
    fn load_tree_rebuilds_every_slot() {
        let list = ListNode::new("L1", "Groceries", 3)
            .with_item(
                ItemNode::new("I1", "Milk", 3).with_category(CategoryNode::new("C2", "Dairy", 3)),
            )
            .with_item(ItemNode::new("I2", "Bread", 2))
            .with_category(CategoryNode::new("C2", "Dairy", 3))
            .with_category(CategoryNode::new("C1", "Bakery", 1))
            .with_privilege(SharedPrivilege::new("bob", Privilege::Edit, 2));
        let (store, key) = seeded(&list);

        assert_eq!(store.len(), 7);
        let loaded: ListNode = store.load_tree(&key).unwrap().unwrap();
        assert!(deep_eq(&loaded, &list));
    }

    #[test]
    fn load_tree_returns_none_for_unknown_key() {
        let store = MemoryStore::new();
        let key = RecordKey::user("alice").child("list", "missing");
        assert!(store.load_tree::<ListNode>(&key).unwrap().is_none());
    }

    #[test]
    fn load_tree_rejects_record_of_other_kind() {
        let list = ListNode::new("L1", "Groceries", 3).with_item(ItemNode::new("I1", "Milk", 3));
        let (store, key) = seeded(&list);
        let item_key = key.child("item", "I1");
        let err = store.load_tree::<ListNode>(&item_key).unwrap_err();
        assert!(matches!(err, Error::WrongKind { .. }));
    }

    #[test]
    fn children_ignores_grandchildren_and_siblings() {
        let list = ListNode::new("L1", "Groceries", 3).with_item(
            ItemNode::new("I1", "Milk", 3).with_category(CategoryNode::new("C1", "Dairy", 3)),
        );
        let (mut store, key) = seeded(&list);
        let other = ListNode::new("L2", "Hardware", 1).with_item(ItemNode::new("I9", "Nails", 1));
        let mut plan = SyncPlan::default();
        subtree_records(&other, &RecordKey::user("alice"), &mut plan.persist).unwrap();
        store.apply(&plan);

        let items: Vec<&str> = store.children(&key, NodeKind::Item).map(Record::id).collect();
        assert_eq!(items, vec!["I1"]);
        assert_eq!(store.children(&key, NodeKind::Category).count(), 0);
    }

    #[test]
    fn shallow_children_skips_subtrees() {
        let list = ListNode::new("L1", "Groceries", 3).with_item(ItemNode::new("I1", "Milk", 3));
        let (mut store, _) = seeded(&list);
        let mut plan = SyncPlan::default();
        let other = ListNode::new("L2", "Hardware", 1);
        subtree_records(&other, &RecordKey::user("alice"), &mut plan.persist).unwrap();
        store.apply(&plan);

        let lists: Vec<ListNode> = store.shallow_children(&RecordKey::user("alice")).unwrap();
        let names: Vec<&str> = lists.iter().map(|list| list.name.as_str()).collect();
        assert_eq!(names, vec!["Groceries", "Hardware"]);
        assert!(lists[0].items.is_empty());
    }

    #[test]
    fn apply_removes_deleted_keys() {
        let list = ListNode::new("L1", "Groceries", 3).with_item(ItemNode::new("I1", "Milk", 3));
        let (mut store, key) = seeded(&list);
        store.apply(&SyncPlan {
            persist: Vec::new(),
            delete: vec![key.child("item", "I1")],
        });
        assert_eq!(store.len(), 1);
        assert!(store.get(&key).is_some());
    }
}
