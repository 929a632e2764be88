//! Storage-neutral record format

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::NodeKind;

/// Key kind used for the owning user at the top of every list tree
pub const USER_KIND: &str = "user";

/// One `kind:id` step of a [`RecordKey`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeySegment {
    pub kind: String,
    pub id: String,
}

/// Hierarchical record key, e.g. `user:alice/list:L1/item:I7`.
///
/// Keys order lexicographically by segment, so every descendant of a key
/// sorts directly after it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordKey(Vec<KeySegment>);

impl RecordKey {
    /// A single-segment key
    pub fn root(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self(vec![KeySegment {
            kind: kind.into(),
            id: id.into(),
        }])
    }

    /// Key of the user that owns a set of lists
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::root(USER_KIND, user_id)
    }

    #[must_use]
    pub fn child(&self, kind: impl Into<String>, id: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(KeySegment {
            kind: kind.into(),
            id: id.into(),
        });
        Self(segments)
    }

    /// Parent key, or `None` for a single-segment key
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        match self.0.split_last() {
            Some((_, rest)) if !rest.is_empty() => Some(Self(rest.to_vec())),
            _ => None,
        }
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn kind(&self) -> &str {
        self.0.last().map_or("", |segment| segment.kind.as_str())
    }

    pub fn id(&self) -> &str {
        self.0.last().map_or("", |segment| segment.id.as_str())
    }

    /// True when `other` lies strictly below this key
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}:{}", segment.kind, segment.id)?;
        }
        Ok(())
    }
}

impl FromStr for RecordKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let segments = s
            .split('/')
            .map(|part| {
                part.split_once(':')
                    .filter(|(kind, id)| !kind.is_empty() && !id.is_empty())
                    .map(|(kind, id)| KeySegment {
                        kind: kind.to_string(),
                        id: id.to_string(),
                    })
                    .ok_or_else(|| Error::InvalidInput(format!("invalid record key '{s}'")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(segments))
    }
}

impl TryFrom<String> for RecordKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RecordKey> for String {
    fn from(key: RecordKey) -> Self {
        key.to_string()
    }
}

/// A stored node: its key plus its own scalar properties, never its children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    kind: NodeKind,
    key: RecordKey,
    properties: Map<String, Value>,
}

impl Record {
    pub fn new(kind: NodeKind, key: RecordKey) -> Self {
        Self {
            kind,
            key,
            properties: Map::new(),
        }
    }

    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    pub const fn key(&self) -> &RecordKey {
        &self.key
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.properties.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.properties.get(field).filter(|value| !value.is_null())
    }

    /// Fail unless this record was written by a node of `expected` kind
    pub fn ensure_kind(&self, expected: NodeKind) -> Result<()> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(Error::WrongKind {
                expected,
                actual: self.kind,
            })
        }
    }

    pub fn str_field(&self, field: &'static str) -> Result<&str> {
        self.get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| self.missing(field))
    }

    pub fn i64_field(&self, field: &'static str) -> Result<i64> {
        self.get(field)
            .and_then(Value::as_i64)
            .ok_or_else(|| self.missing(field))
    }

    /// Parse a string property through `FromStr` (status, privilege level)
    pub fn parse_field<F>(&self, field: &'static str) -> Result<F>
    where
        F: FromStr<Err = Error>,
    {
        self.str_field(field)?.parse()
    }

    fn missing(&self, field: &'static str) -> Error {
        Error::MissingField {
            kind: self.kind,
            id: self.id().to_string(),
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_key_round_trips_through_display() {
        let key = RecordKey::user("alice")
            .child("list", "L1")
            .child("item", "I7");
        assert_eq!(key.to_string(), "user:alice/list:L1/item:I7");
        assert_eq!(key.to_string().parse::<RecordKey>().unwrap(), key);
    }

    #[test]
    fn record_key_rejects_malformed_segments() {
        assert!("user:alice/list".parse::<RecordKey>().is_err());
        assert!("".parse::<RecordKey>().is_err());
        assert!("user:/list:L1".parse::<RecordKey>().is_err());
    }

    #[test]
    fn record_key_parent_and_ancestry() {
        let list = RecordKey::user("alice").child("list", "L1");
        let item = list.child("item", "I1");
        assert_eq!(item.parent(), Some(list.clone()));
        assert!(list.is_ancestor_of(&item));
        assert!(!item.is_ancestor_of(&list));
        assert!(!list.is_ancestor_of(&list));
        assert_eq!(RecordKey::user("alice").parent(), None);
    }

    #[test]
    fn descendants_sort_directly_after_their_ancestor() {
        let list = RecordKey::user("a").child("list", "L1");
        let item = list.child("item", "I1");
        let sibling = RecordKey::user("a").child("list", "L2");
        let mut keys = vec![sibling.clone(), item.clone(), list.clone()];
        keys.sort();
        assert_eq!(keys, vec![list, item, sibling]);
    }

    #[test]
    fn record_reports_missing_and_wrong_kind() {
        let key = RecordKey::user("alice").child("list", "L1");
        let mut record = Record::new(NodeKind::List, key);
        record.set("name", "Groceries");

        assert_eq!(record.str_field("name").unwrap(), "Groceries");
        assert!(matches!(
            record.i64_field("last_update"),
            Err(Error::MissingField {
                field: "last_update",
                ..
            })
        ));
        assert!(matches!(
            record.ensure_kind(NodeKind::Item),
            Err(Error::WrongKind {
                expected: NodeKind::Item,
                actual: NodeKind::List,
            })
        ));
    }
}
