//! Shared privilege model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::node::{fields, NodeKind, Status, TimestampedNode};
use crate::error::{Error, Result};
use crate::store::Record;

/// Access level granted to another user on a list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Privilege {
    #[default]
    View,
    Edit,
    Admin,
}

impl Privilege {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::Edit => "EDIT",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privilege {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "VIEW" => Ok(Self::View),
            "EDIT" => Ok(Self::Edit),
            "ADMIN" => Ok(Self::Admin),
            other => Err(Error::InvalidInput(format!("unknown privilege '{other}'"))),
        }
    }
}

/// Another user's access to a list.
///
/// Keyed by that user's id; never receives an issued id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SharedPrivilege {
    pub user_id: String,
    #[serde(default)]
    pub privilege: Privilege,
    #[serde(default)]
    pub status: Status,
    /// Last update timestamp (Unix ms)
    #[serde(default)]
    pub last_update: Option<i64>,
}

impl SharedPrivilege {
    #[must_use]
    pub fn new(user_id: impl Into<String>, privilege: Privilege, last_update: i64) -> Self {
        Self {
            user_id: user_id.into(),
            privilege,
            status: Status::Active,
            last_update: Some(last_update),
        }
    }
}

impl TimestampedNode for SharedPrivilege {
    const KIND: NodeKind = NodeKind::SharedPrivilege;
    const ISSUED_ID: bool = false;

    fn unique_id(&self) -> &str {
        &self.user_id
    }

    fn set_unique_id(&mut self, id: String) {
        self.user_id = id;
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
        record.set(fields::PRIVILEGE, self.privilege.as_str());
        record.set(fields::STATUS, self.status.as_str());
        record.set(fields::LAST_UPDATE, self.last_update);
    }

    fn from_record(record: &Record) -> Result<Self> {
        record.ensure_kind(Self::KIND)?;
        Ok(Self {
            user_id: record.id().to_string(),
            privilege: record.parse_field(fields::PRIVILEGE)?,
            status: record.parse_field(fields::STATUS)?,
            last_update: Some(record.i64_field(fields::LAST_UPDATE)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordKey;

    #[test]
    fn privilege_record_is_keyed_by_user() {
        let parent = RecordKey::user("owner").child("list", "L1");
        let privilege = SharedPrivilege::new("bob", Privilege::Edit, 10);
        let record = privilege.to_record(&parent);

        assert_eq!(record.key().to_string(), "user:owner/list:L1/shared_privilege:bob");
        assert_eq!(SharedPrivilege::from_record(&record).unwrap(), privilege);
    }

    #[test]
    fn unknown_privilege_is_rejected() {
        assert!("OWNER".parse::<Privilege>().is_err());
    }
}
