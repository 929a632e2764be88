//! Permanent identifier issuance

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use uuid::Uuid;

/// Replaces a client's provisional id with a permanent, globally unique one.
///
/// Must be idempotent per candidate: asking twice for the same provisional id
/// yields the same permanent id, and permanent ids pass through unchanged.
pub trait IdIssuer: Send + Sync {
    fn ensure_permanent_id(&self, candidate: &str) -> String;
}

/// Issues UUID v7 ids (time-sortable) and remembers what it issued
#[derive(Debug, Default)]
pub struct UuidIssuer {
    issued: Mutex<HashMap<String, String>>,
}

impl UuidIssuer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of provisional ids replaced so far
    pub fn issued_count(&self) -> usize {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl IdIssuer for UuidIssuer {
    fn ensure_permanent_id(&self, candidate: &str) -> String {
        if is_permanent_id(candidate) {
            return candidate.to_string();
        }
        let mut issued = self
            .issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        issued
            .entry(candidate.to_string())
            .or_insert_with(|| Uuid::now_v7().to_string())
            .clone()
    }
}

/// Passes ids already stored on the server through untouched and defers
/// every other candidate to `inner`. Stored ids need not parse as UUIDs.
pub struct KnownIds<'a> {
    inner: &'a dyn IdIssuer,
    known: &'a HashSet<String>,
}

impl<'a> KnownIds<'a> {
    pub fn new(inner: &'a dyn IdIssuer, known: &'a HashSet<String>) -> Self {
        Self { inner, known }
    }
}

impl IdIssuer for KnownIds<'_> {
    fn ensure_permanent_id(&self, candidate: &str) -> String {
        if self.known.contains(candidate) {
            return candidate.to_string();
        }
        self.inner.ensure_permanent_id(candidate)
    }
}

/// Ids that parse as UUIDs have already been issued
pub fn is_permanent_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_ids_are_replaced_once() {
        let issuer = UuidIssuer::new();
        let first = issuer.ensure_permanent_id("tmp-1");
        let second = issuer.ensure_permanent_id("tmp-1");

        assert!(is_permanent_id(&first));
        assert_eq!(first, second);
        assert_eq!(issuer.issued_count(), 1);
    }

    #[test]
    fn permanent_ids_pass_through() {
        let issuer = UuidIssuer::new();
        let id = Uuid::now_v7().to_string();
        assert_eq!(issuer.ensure_permanent_id(&id), id);
        assert_eq!(issuer.issued_count(), 0);
    }

    #[test]
    fn known_ids_are_never_reissued() {
        let issuer = UuidIssuer::new();
        let known: HashSet<String> = ["C1".to_string()].into();
        let ids = KnownIds::new(&issuer, &known);

        assert_eq!(ids.ensure_permanent_id("C1"), "C1");
        assert!(is_permanent_id(&ids.ensure_permanent_id("tmp-1")));
        assert_eq!(issuer.issued_count(), 1);
    }

    #[test]
    fn distinct_candidates_get_distinct_ids() {
        let issuer = UuidIssuer::new();
        assert_ne!(
            issuer.ensure_permanent_id("tmp-1"),
            issuer.ensure_permanent_id("tmp-2")
        );
    }
}
