//! Last-writer-wins reconciliation of a client tree against the server tree

use std::collections::{BTreeSet, HashMap, HashSet};

use super::diagnostics::{DiagnosticSink, SyncEvent};
use super::merge::{ensure_keyed, ensure_sorted, pair_keyed, pair_sorted};
use crate::error::{Error, Result};
use crate::ids::{IdIssuer, KnownIds};
use crate::models::walk::{assign_permanent_ids, descendant_keys, subtree_ids, subtree_records};
use crate::models::{KeyedSlot, SlotVisitor, SortedSlot, TimestampedNode};
use crate::store::{RecordKey, SyncPlan};

/// Merge result for one node.
///
/// `changed_on_server` means the client's copy is stale and must adopt this
/// value; it is set on the node itself or bubbled up from any descendant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged<T> {
    pub node: T,
    pub changed_on_server: bool,
}

/// Outcome of reconciling one root
#[derive(Debug, Clone)]
pub struct SyncOutcome<T> {
    /// Merged tree, `None` when neither side yields a node
    pub merged: Option<T>,
    /// Whether the root itself is flagged changed on server
    pub changed_on_server: bool,
    /// Keys of every merged node flagged changed on server
    pub changed_keys: BTreeSet<RecordKey>,
    /// Records to upsert and delete once the run is accepted
    pub plan: SyncPlan,
}

impl<T> SyncOutcome<T> {
    pub fn is_changed(&self, key: &RecordKey) -> bool {
        self.changed_keys.contains(key)
    }
}

/// Reconcile `client` against `server` under `root_parent`.
///
/// `root_siblings` are the stored roots next to this one under
/// `root_parent`; a new client root named like one of them is skipped as a
/// duplicate submission. Ids already present in `server` are never
/// re-issued.
///
/// Performs no I/O: the returned plan is applied by the caller, and runs on
/// the same root must be serialized by the caller.
pub fn reconcile<T: TimestampedNode>(
    issuer: &dyn IdIssuer,
    sink: &mut dyn DiagnosticSink,
    root_parent: &RecordKey,
    root_siblings: &[&T],
    server: Option<&T>,
    client: Option<&T>,
) -> Result<SyncOutcome<T>> {
    Reconciler::new(issuer, sink).run(root_parent, root_siblings, server, client)
}

/// State of one reconciliation run: collaborators plus the accumulators
/// every recursive call appends to
pub struct Reconciler<'a> {
    issuer: &'a dyn IdIssuer,
    sink: &'a mut dyn DiagnosticSink,
    plan: SyncPlan,
    changed: BTreeSet<RecordKey>,
    /// Every id in the server tree
    known_ids: HashSet<String>,
}

impl<'a> Reconciler<'a> {
    pub fn new(issuer: &'a dyn IdIssuer, sink: &'a mut dyn DiagnosticSink) -> Self {
        Self {
            issuer,
            sink,
            plan: SyncPlan::default(),
            changed: BTreeSet::new(),
            known_ids: HashSet::new(),
        }
    }

    pub fn run<T: TimestampedNode>(
        mut self,
        root_parent: &RecordKey,
        root_siblings: &[&T],
        server: Option<&T>,
        client: Option<&T>,
    ) -> Result<SyncOutcome<T>> {
        if let (Some(server), Some(client)) = (server, client) {
            if server.unique_id() != client.unique_id() {
                return Err(Error::InvalidInput(format!(
                    "cannot reconcile {} {} against {}",
                    T::KIND,
                    client.unique_id(),
                    server.unique_id()
                )));
            }
        }

        if let Some(server) = server {
            subtree_ids(server, &mut self.known_ids)?;
        }

        let merged = self.reconcile(root_parent, server, client, root_siblings)?;
        let (merged, changed_on_server) = match merged {
            Some(merged) => (Some(merged.node), merged.changed_on_server),
            None => (None, false),
        };
        Ok(SyncOutcome {
            merged,
            changed_on_server,
            changed_keys: self.changed,
            plan: self.plan,
        })
    }

    fn reconcile<T: TimestampedNode>(
        &mut self,
        parent: &RecordKey,
        server: Option<&T>,
        client: Option<&T>,
        server_siblings: &[&T],
    ) -> Result<Option<Merged<T>>> {
        let merged = match (server, client) {
            (None, None) => None,
            (None, Some(client)) => self.new_from_client(parent, client, server_siblings)?,
            (Some(server), None) => Some(self.new_from_server(server)),
            (Some(server), Some(client)) => Some(self.resolve(parent, server, client)?),
        };

        Ok(merged.map(|mut merged| {
            if let Some(client) = client {
                merged.node.copy_ephemeral_from(client);
            }
            if merged.changed_on_server {
                self.changed.insert(merged.node.record_key(parent));
            }
            merged
        }))
    }

    fn new_from_client<T: TimestampedNode>(
        &mut self,
        parent: &RecordKey,
        client: &T,
        server_siblings: &[&T],
    ) -> Result<Option<Merged<T>>> {
        if client.status().is_deleted() {
            self.sink.record(SyncEvent::DiscardedUnsynced {
                kind: T::KIND,
                id: client.unique_id().to_string(),
            });
            return Ok(None);
        }

        if let Some(name) = client.name() {
            let existing = server_siblings
                .iter()
                .find(|sibling| !sibling.status().is_deleted() && sibling.name() == Some(name));
            if let Some(existing) = existing {
                self.sink.record(SyncEvent::DuplicateSkipped {
                    kind: T::KIND,
                    name: name.to_string(),
                    existing_id: existing.unique_id().to_string(),
                });
                return Ok(None);
            }
        }

        let mut node = client.clone();
        assign_permanent_ids(&mut node, &KnownIds::new(self.issuer, &self.known_ids))?;
        let before = self.plan.persist.len();
        subtree_records(&node, parent, &mut self.plan.persist)?;
        self.sink.record(SyncEvent::CreatedFromClient {
            kind: T::KIND,
            id: node.unique_id().to_string(),
            records: self.plan.persist.len() - before,
        });

        // The client must adopt the permanent ids issued above.
        Ok(Some(Merged {
            node,
            changed_on_server: true,
        }))
    }

    fn new_from_server<T: TimestampedNode>(&mut self, server: &T) -> Merged<T> {
        self.sink.record(SyncEvent::SentToClient {
            kind: T::KIND,
            id: server.unique_id().to_string(),
        });
        Merged {
            node: server.clone(),
            changed_on_server: true,
        }
    }

    fn resolve<T: TimestampedNode>(
        &mut self,
        parent: &RecordKey,
        server: &T,
        client: &T,
    ) -> Result<Merged<T>> {
        let server_update = server.require_last_update()?;
        let client_update = client.require_last_update()?;

        let mut changed_on_server = false;
        let mut node = if server_update > client_update {
            self.sink.record(SyncEvent::ServerWins {
                kind: T::KIND,
                id: server.unique_id().to_string(),
                server_update,
                client_update,
            });
            changed_on_server = true;
            server.shallow_clone()
        } else {
            let node = client.shallow_clone();
            if !client.shallow_eq(server) {
                if node.status().is_deleted() {
                    return self.tombstone(parent, server, node);
                }
                self.plan.persist.push(node.to_record(parent));
                self.sink.record(SyncEvent::UpdatedFromClient {
                    kind: T::KIND,
                    id: node.unique_id().to_string(),
                });
            }
            node
        };

        let key = node.record_key(parent);
        let mut children = ChildMerge {
            run: self,
            merged: &mut node,
            server,
            client,
            key: &key,
            changed_on_server: false,
        };
        T::visit_slots(&mut children)?;
        changed_on_server |= children.changed_on_server;

        Ok(Merged {
            node,
            changed_on_server,
        })
    }

    /// Accept a client deletion: store the tombstone and drop every server
    /// descendant. Children are not reconciled.
    fn tombstone<T: TimestampedNode>(
        &mut self,
        parent: &RecordKey,
        server: &T,
        node: T,
    ) -> Result<Merged<T>> {
        self.plan.persist.push(node.to_record(parent));
        let before = self.plan.delete.len();
        descendant_keys(server, &server.record_key(parent), &mut self.plan.delete)?;
        self.sink.record(SyncEvent::Tombstoned {
            kind: T::KIND,
            id: node.unique_id().to_string(),
            removed: self.plan.delete.len() - before,
        });
        Ok(Merged {
            node,
            changed_on_server: false,
        })
    }
}

/// Reconciles each declared slot of a merged parent
struct ChildMerge<'r, 'a, P> {
    run: &'r mut Reconciler<'a>,
    merged: &'r mut P,
    server: &'r P,
    client: &'r P,
    key: &'r RecordKey,
    changed_on_server: bool,
}

impl<P> SlotVisitor<P> for ChildMerge<'_, '_, P> {
    fn keyed<C: TimestampedNode>(&mut self, slot: &KeyedSlot<P, C>) -> Result<()> {
        let server = (slot.entries)(self.server);
        let client = (slot.entries)(self.client);
        ensure_keyed(slot.name, server)?;
        ensure_keyed(slot.name, client)?;

        let siblings: Vec<&C> = server.values().collect();
        let mut merged = HashMap::with_capacity(server.len().max(client.len()));
        for (server_child, client_child) in pair_keyed(server, client) {
            if let Some(child) = self
                .run
                .reconcile(self.key, server_child, client_child, &siblings)?
            {
                self.changed_on_server |= child.changed_on_server;
                merged.insert(child.node.unique_id().to_string(), child.node);
            }
        }

        (slot.entries_mut)(self.merged).extend(merged);
        Ok(())
    }

    fn sorted<C: TimestampedNode>(&mut self, slot: &SortedSlot<P, C>) -> Result<()> {
        let server = (slot.entries)(self.server);
        let client = (slot.entries)(self.client);
        ensure_sorted(slot.name, server)?;
        ensure_sorted(slot.name, client)?;

        let siblings: Vec<&C> = server.iter().collect();
        let mut merged = Vec::with_capacity(server.len().max(client.len()));
        for (server_child, client_child) in pair_sorted(server, client) {
            if let Some(child) = self
                .run
                .reconcile(self.key, server_child, client_child, &siblings)?
            {
                self.changed_on_server |= child.changed_on_server;
                merged.push(child.node);
            }
        }
        // Issued ids can move a new child out of walk order.
        merged.sort_by(|a, b| a.unique_id().cmp(b.unique_id()));

        (slot.entries_mut)(self.merged).extend(merged);
        Ok(())
    }
}
