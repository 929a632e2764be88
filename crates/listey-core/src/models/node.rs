//! Shared node capabilities and sub-collection slot declarations

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::store::{Record, RecordKey};

/// Property names used in stored records
pub(crate) mod fields {
    pub const NAME: &str = "name";
    pub const LABEL: &str = "label";
    pub const STATUS: &str = "status";
    pub const COUNT: &str = "count";
    pub const LAST_UPDATE: &str = "last_update";
    pub const PRIVILEGE: &str = "privilege";
}

/// Record kind of a node variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    List,
    Item,
    Category,
    SharedPrivilege,
}

impl NodeKind {
    /// Kind tag as written into record keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Item => "item",
            Self::Category => "category",
            Self::SharedPrivilege => "shared_privilege",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "list" => Ok(Self::List),
            "item" => Ok(Self::Item),
            "category" => Ok(Self::Category),
            "shared_privilege" => Ok(Self::SharedPrivilege),
            other => Err(Error::InvalidInput(format!("unknown node kind '{other}'"))),
        }
    }
}

/// Lifecycle status shared by every node variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Active,
    Completed,
    Hidden,
    /// Tombstone kept so the deletion reaches other replicas
    Deleted,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Hidden => "HIDDEN",
            Self::Deleted => "DELETED",
        }
    }

    #[must_use]
    pub const fn is_deleted(self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "COMPLETED" => Ok(Self::Completed),
            "HIDDEN" => Ok(Self::Hidden),
            "DELETED" => Ok(Self::Deleted),
            other => Err(Error::InvalidInput(format!("unknown status '{other}'"))),
        }
    }
}

/// A timestamped record in the list hierarchy.
///
/// Identity is `unique_id` alone. Children live in slots declared through
/// [`TimestampedNode::visit_slots`]; every walk over a subtree (merging,
/// deep equality, persistence, loading from a store) goes through those
/// declarations in the order the variant lists them.
pub trait TimestampedNode: Clone + fmt::Debug + Sized {
    /// Record kind of this variant
    const KIND: NodeKind;

    /// Whether new nodes of this kind receive an issued permanent id.
    /// Variants keyed by an external identifier (a user id) do not.
    const ISSUED_ID: bool = true;

    fn unique_id(&self) -> &str;

    fn set_unique_id(&mut self, id: String);

    fn last_update(&self) -> Option<i64>;

    fn status(&self) -> Status;

    /// Label used for duplicate-submission detection, if the variant has one
    fn name(&self) -> Option<&str> {
        None
    }

    /// Equality on the node's own scalar fields, ignoring children
    fn shallow_eq(&self, other: &Self) -> bool;

    /// Copy of the scalar fields with every slot empty
    #[must_use]
    fn shallow_clone(&self) -> Self;

    /// Write the node's own scalar fields (not its children) into `record`
    fn write_properties(&self, record: &mut Record);

    /// Rebuild a node (without children) from a stored record
    fn from_record(record: &Record) -> Result<Self>;

    /// Visit each sub-collection slot in declaration order
    fn visit_slots<V: SlotVisitor<Self>>(visitor: &mut V) -> Result<()> {
        let _ = visitor;
        Ok(())
    }

    /// Carry request-only fields from the client node onto a merge result
    fn copy_ephemeral_from(&mut self, client: &Self) {
        let _ = client;
    }

    fn record_key(&self, parent: &RecordKey) -> RecordKey {
        parent.child(Self::KIND.as_str(), self.unique_id())
    }

    fn to_record(&self, parent: &RecordKey) -> Record {
        let mut record = Record::new(Self::KIND, self.record_key(parent));
        self.write_properties(&mut record);
        record
    }

    /// `last_update`, or a data-integrity error when it is absent
    fn require_last_update(&self) -> Result<i64> {
        self.last_update().ok_or_else(|| Error::MissingField {
            kind: Self::KIND,
            id: self.unique_id().to_string(),
            field: fields::LAST_UPDATE,
        })
    }
}

/// A slot holding children keyed by their id, order irrelevant
pub struct KeyedSlot<P, C> {
    pub name: &'static str,
    pub entries: fn(&P) -> &HashMap<String, C>,
    /// Append hook: merged children are inserted through this accessor
    pub entries_mut: fn(&mut P) -> &mut HashMap<String, C>,
}

/// A slot holding children sorted ascending by id
pub struct SortedSlot<P, C> {
    pub name: &'static str,
    pub entries: fn(&P) -> &[C],
    /// Append hook: merged children are pushed through this accessor
    pub entries_mut: fn(&mut P) -> &mut Vec<C>,
}

/// Callback invoked once per declared slot of a parent type `P`
pub trait SlotVisitor<P> {
    fn keyed<C: TimestampedNode>(&mut self, slot: &KeyedSlot<P, C>) -> Result<()>;

    fn sorted<C: TimestampedNode>(&mut self, slot: &SortedSlot<P, C>) -> Result<()>;
}
