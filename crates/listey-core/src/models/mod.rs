//! Data models for Listey

mod category;
mod item;
mod list;
mod node;
mod privilege;
pub(crate) mod walk;

pub use category::CategoryNode;
pub use item::ItemNode;
pub use list::ListNode;
pub use node::{KeyedSlot, NodeKind, SlotVisitor, SortedSlot, Status, TimestampedNode};
pub use privilege::{Privilege, SharedPrivilege};
pub use walk::{deep_eq, normalize};
