//! Diagnostic events emitted during reconciliation

use crate::models::NodeKind;

/// Something noteworthy the reconciler decided about one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// New node from the client matched an active server sibling by name;
    /// treated as a retried submission and dropped
    DuplicateSkipped {
        kind: NodeKind,
        name: String,
        existing_id: String,
    },
    /// Client created and deleted the node before it ever reached the server
    DiscardedUnsynced { kind: NodeKind, id: String },
    /// New node from the client scheduled for persistence with its subtree
    CreatedFromClient {
        kind: NodeKind,
        id: String,
        records: usize,
    },
    /// Node exists only on the server and is sent down to the client
    SentToClient { kind: NodeKind, id: String },
    /// Server copy is newer than the client's
    ServerWins {
        kind: NodeKind,
        id: String,
        server_update: i64,
        client_update: i64,
    },
    /// Client copy changed the node's own fields
    UpdatedFromClient { kind: NodeKind, id: String },
    /// Client deletion accepted; descendants scheduled for removal
    Tombstoned {
        kind: NodeKind,
        id: String,
        removed: usize,
    },
}

/// Receiver for [`SyncEvent`]s, injected into each reconciliation run
pub trait DiagnosticSink {
    fn record(&mut self, event: SyncEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::DuplicateSkipped {
                kind,
                name,
                existing_id,
            } => tracing::warn!(
                %kind,
                %name,
                %existing_id,
                "New node from client matched an existing server node by name, skipping"
            ),
            SyncEvent::DiscardedUnsynced { kind, id } => {
                tracing::debug!(%kind, %id, "Node deleted on client before first sync");
            }
            SyncEvent::CreatedFromClient { kind, id, records } => {
                tracing::info!(%kind, %id, records, "Adding records for new node from client");
            }
            SyncEvent::SentToClient { kind, id } => {
                tracing::debug!(%kind, %id, "Node missing on client, sending server copy");
            }
            SyncEvent::ServerWins {
                kind,
                id,
                server_update,
                client_update,
            } => tracing::debug!(
                %kind,
                %id,
                server_update,
                client_update,
                "Server copy is newer"
            ),
            SyncEvent::UpdatedFromClient { kind, id } => {
                tracing::info!(%kind, %id, "Updating node changed on client");
            }
            SyncEvent::Tombstoned { kind, id, removed } => {
                tracing::info!(%kind, %id, removed, "Node deleted on client, removing descendants");
            }
        }
    }
}

/// Keeps every event, for assertions
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub events: Vec<SyncEvent>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&mut self, event: SyncEvent) {
        self.events.push(event);
    }
}
