//! Reconciliation engine
//!
//! Merges a client-submitted tree with the server's copy of the same tree.
//! Conflicts resolve per node by `last_update` (ties go to the client), then
//! each declared child slot is merged recursively. The run produces a merged
//! tree, the keys the client must refresh, and a [`SyncPlan`](crate::store::SyncPlan)
//! for the storage layer.

mod diagnostics;
mod merge;
mod reconcile;


pub use diagnostics::{DiagnosticSink, RecordingSink, SyncEvent, TracingSink};
pub use merge::{pair_keyed, pair_sorted, Pair, SortedPairs};
pub use reconcile::{reconcile, Merged, Reconciler, SyncOutcome};
