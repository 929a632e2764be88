//! Whole-subtree operations driven by slot declarations

use std::collections::{HashMap, HashSet};

use super::node::{KeyedSlot, SlotVisitor, SortedSlot, TimestampedNode};
use crate::error::Result;
use crate::ids::IdIssuer;
use crate::store::{Record, RecordKey};

/// Shallow equality plus equal slots whose children are deep-equal by id.
///
/// Ephemeral fields never take part.
pub fn deep_eq<T: TimestampedNode>(left: &T, right: &T) -> bool {
    if !left.shallow_eq(right) {
        return false;
    }
    let mut visitor = DeepEq {
        left,
        right,
        equal: true,
    };
    T::visit_slots(&mut visitor).is_ok() && visitor.equal
}

struct DeepEq<'a, P> {
    left: &'a P,
    right: &'a P,
    equal: bool,
}

impl<P> SlotVisitor<P> for DeepEq<'_, P> {
    fn keyed<C: TimestampedNode>(&mut self, slot: &KeyedSlot<P, C>) -> Result<()> {
        if self.equal {
            let left = (slot.entries)(self.left);
            let right = (slot.entries)(self.right);
            self.equal = left.len() == right.len()
                && left
                    .iter()
                    .all(|(key, child)| right.get(key).is_some_and(|other| deep_eq(child, other)));
        }
        Ok(())
    }

    fn sorted<C: TimestampedNode>(&mut self, slot: &SortedSlot<P, C>) -> Result<()> {
        if self.equal {
            let left = (slot.entries)(self.left);
            let right = (slot.entries)(self.right);
            self.equal = left.len() == right.len()
                && left
                    .iter()
                    .zip(right)
                    .all(|(child, other)| deep_eq(child, other));
        }
        Ok(())
    }
}

/// Sort every sorted slot in the subtree by id.
///
/// Callers run this on decoded client input before reconciling; the
/// reconciler itself rejects unsorted slots instead of fixing them.
pub fn normalize<T: TimestampedNode>(node: &mut T) -> Result<()> {
    T::visit_slots(&mut Normalize { node })
}

struct Normalize<'a, P> {
    node: &'a mut P,
}

impl<P> SlotVisitor<P> for Normalize<'_, P> {
    fn keyed<C: TimestampedNode>(&mut self, slot: &KeyedSlot<P, C>) -> Result<()> {
        (slot.entries_mut)(self.node)
            .values_mut()
            .try_for_each(normalize)
    }

    fn sorted<C: TimestampedNode>(&mut self, slot: &SortedSlot<P, C>) -> Result<()> {
        let children = (slot.entries_mut)(self.node);
        children.sort_by(|a, b| a.unique_id().cmp(b.unique_id()));
        children.iter_mut().try_for_each(normalize)
    }
}

/// Replace provisional ids with permanent ones across the subtree.
///
/// Keyed slots are re-keyed and sorted slots re-sorted under the new ids.
pub(crate) fn assign_permanent_ids<T: TimestampedNode>(
    node: &mut T,
    issuer: &dyn IdIssuer,
) -> Result<()> {
    if T::ISSUED_ID {
        let id = issuer.ensure_permanent_id(node.unique_id());
        node.set_unique_id(id);
    }
    T::visit_slots(&mut AssignIds { node, issuer })
}

struct AssignIds<'a, P> {
    node: &'a mut P,
    issuer: &'a dyn IdIssuer,
}

impl<P> SlotVisitor<P> for AssignIds<'_, P> {
    fn keyed<C: TimestampedNode>(&mut self, slot: &KeyedSlot<P, C>) -> Result<()> {
        let entries = (slot.entries_mut)(self.node);
        let children = std::mem::take(entries);
        let mut rekeyed = HashMap::with_capacity(children.len());
        for mut child in children.into_values() {
            assign_permanent_ids(&mut child, self.issuer)?;
            rekeyed.insert(child.unique_id().to_string(), child);
        }
        *entries = rekeyed;
        Ok(())
    }

    fn sorted<C: TimestampedNode>(&mut self, slot: &SortedSlot<P, C>) -> Result<()> {
        let children = (slot.entries_mut)(self.node);
        for child in children.iter_mut() {
            assign_permanent_ids(child, self.issuer)?;
        }
        children.sort_by(|a, b| a.unique_id().cmp(b.unique_id()));
        Ok(())
    }
}

/// Collect the id of `node` and of every descendant
pub(crate) fn subtree_ids<T: TimestampedNode>(
    node: &T,
    out: &mut HashSet<String>,
) -> Result<()> {
    out.insert(node.unique_id().to_string());
    T::visit_slots(&mut SubtreeIds { node, out })
}

struct SubtreeIds<'a, P> {
    node: &'a P,
    out: &'a mut HashSet<String>,
}

impl<P> SlotVisitor<P> for SubtreeIds<'_, P> {
    fn keyed<C: TimestampedNode>(&mut self, slot: &KeyedSlot<P, C>) -> Result<()> {
        (slot.entries)(self.node)
            .values()
            .try_for_each(|child| subtree_ids(child, self.out))
    }

    fn sorted<C: TimestampedNode>(&mut self, slot: &SortedSlot<P, C>) -> Result<()> {
        (slot.entries)(self.node)
            .iter()
            .try_for_each(|child| subtree_ids(child, self.out))
    }
}

/// Append records for `node` and every descendant, parents first.
///
/// Fails when any node lacks a timestamp, since the stored record could
/// never win or lose a later comparison correctly.
pub(crate) fn subtree_records<T: TimestampedNode>(
    node: &T,
    parent: &RecordKey,
    out: &mut Vec<Record>,
) -> Result<()> {
    node.require_last_update()?;
    let key = node.record_key(parent);
    out.push(node.to_record(parent));
    T::visit_slots(&mut SubtreeRecords {
        node,
        key: &key,
        out,
    })
}

struct SubtreeRecords<'a, P> {
    node: &'a P,
    key: &'a RecordKey,
    out: &'a mut Vec<Record>,
}

impl<P> SlotVisitor<P> for SubtreeRecords<'_, P> {
    fn keyed<C: TimestampedNode>(&mut self, slot: &KeyedSlot<P, C>) -> Result<()> {
        for child in sorted_values((slot.entries)(self.node)) {
            subtree_records(child, self.key, self.out)?;
        }
        Ok(())
    }

    fn sorted<C: TimestampedNode>(&mut self, slot: &SortedSlot<P, C>) -> Result<()> {
        for child in (slot.entries)(self.node) {
            subtree_records(child, self.key, self.out)?;
        }
        Ok(())
    }
}

/// Append the keys of every record strictly below `node`
pub(crate) fn descendant_keys<T: TimestampedNode>(
    node: &T,
    key: &RecordKey,
    out: &mut Vec<RecordKey>,
) -> Result<()> {
    T::visit_slots(&mut DescendantKeys { node, key, out })
}

struct DescendantKeys<'a, P> {
    node: &'a P,
    key: &'a RecordKey,
    out: &'a mut Vec<RecordKey>,
}

impl<P> DescendantKeys<'_, P> {
    fn push<C: TimestampedNode>(&mut self, child: &C) -> Result<()> {
        let child_key = child.record_key(self.key);
        self.out.push(child_key.clone());
        descendant_keys(child, &child_key, self.out)
    }
}

impl<P> SlotVisitor<P> for DescendantKeys<'_, P> {
    fn keyed<C: TimestampedNode>(&mut self, slot: &KeyedSlot<P, C>) -> Result<()> {
        for child in sorted_values((slot.entries)(self.node)) {
            self.push(child)?;
        }
        Ok(())
    }

    fn sorted<C: TimestampedNode>(&mut self, slot: &SortedSlot<P, C>) -> Result<()> {
        for child in (slot.entries)(self.node) {
            self.push(child)?;
        }
        Ok(())
    }
}

/// Map values in ascending key order, for deterministic output
pub(crate) fn sorted_values<C>(entries: &HashMap<String, C>) -> Vec<&C> {
    let mut pairs: Vec<(&String, &C)> = entries.iter().collect();
    pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));
    pairs.into_iter().map(|(_, child)| child).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UuidIssuer;
    use crate::models::{CategoryNode, ItemNode, ListNode};

    fn sample() -> ListNode {
        ListNode::new("L1", "Groceries", 1)
            .with_item(
                ItemNode::new("I1", "Milk", 1).with_category(CategoryNode::new("C1", "Dairy", 1)),
            )
            .with_category(CategoryNode::new("C1", "Dairy", 1))
    }

    #[test]
    fn deep_eq_sees_nested_differences() {
        let left = sample();
        let mut right = sample();
        assert!(deep_eq(&left, &right));

        right
            .items
            .get_mut("I1")
            .unwrap()
            .categories
            .get_mut("C1")
            .unwrap()
            .label = "Milk products".to_string();
        assert!(!deep_eq(&left, &right));
    }

    #[test]
    fn deep_eq_ignores_ephemeral_fields() {
        let left = sample();
        let mut right = sample();
        right.selected_categories.insert("C1".to_string());
        assert!(deep_eq(&left, &right));
    }

    #[test]
    fn subtree_records_lists_parents_before_children() {
        let mut out = Vec::new();
        subtree_records(&sample(), &RecordKey::user("alice"), &mut out).unwrap();
        let keys: Vec<String> = out.iter().map(|r| r.key().to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "user:alice/list:L1",
                "user:alice/list:L1/item:I1",
                "user:alice/list:L1/item:I1/category:C1",
                "user:alice/list:L1/category:C1",
            ]
        );
    }

    #[test]
    fn subtree_records_requires_timestamps() {
        let mut list = sample();
        list.items.get_mut("I1").unwrap().last_update = None;
        let mut out = Vec::new();
        assert!(subtree_records(&list, &RecordKey::user("alice"), &mut out).is_err());
    }

    #[test]
    fn assign_permanent_ids_shares_ids_for_the_same_candidate() {
        let issuer = UuidIssuer::new();
        let mut list = sample();
        assign_permanent_ids(&mut list, &issuer).unwrap();

        let list_category = &list.categories[0].unique_id;
        let item = list.items.values().next().unwrap();
        assert!(item.categories.contains_key(list_category));
        assert_eq!(item.unique_id, *list.items.keys().next().unwrap());
    }

    #[test]
    fn subtree_ids_reaches_nested_slots() {
        let mut ids = HashSet::new();
        subtree_ids(&sample().with_item(ItemNode::new("I2", "Eggs", 1)), &mut ids).unwrap();

        let mut ids: Vec<String> = ids.into_iter().collect();
        ids.sort();
        assert_eq!(ids, vec!["C1", "I1", "I2", "L1"]);
    }

    #[test]
    fn normalize_sorts_nested_sorted_slots() {
        let mut list = ListNode::new("L1", "Groceries", 1);
        list.categories = vec![
            CategoryNode::new("b", "B", 1),
            CategoryNode::new("a", "A", 1),
        ];
        normalize(&mut list).unwrap();
        assert_eq!(list.categories[0].unique_id, "a");
    }
}
