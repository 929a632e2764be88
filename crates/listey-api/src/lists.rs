//! Stored lists and the sync run that reconciles a client's copy against them

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use listey_core::ids::UuidIssuer;
use listey_core::models::normalize;
use listey_core::store::{MemoryStore, RecordKey};
use listey_core::sync::TracingSink;
use listey_core::{reconcile, ListNode, TimestampedNode};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};

use crate::error::AppError;

/// One lock per list root; runs on the same root are serialized, runs on
/// different roots proceed independently.
///
/// An entry lives only while some run holds or waits on it.
#[derive(Default)]
pub struct RootLocks {
    locks: Mutex<HashMap<RecordKey, Arc<AsyncMutex<()>>>>,
}

impl RootLocks {
    pub async fn acquire(&self, root: &RecordKey) -> RootGuard<'_> {
        let lock = Arc::clone(self.entries().entry(root.clone()).or_default());
        let guard = Arc::clone(&lock).lock_owned().await;
        RootGuard {
            locks: self,
            root: root.clone(),
            lock,
            guard: Some(guard),
        }
    }

    /// Roots currently held or awaited
    pub fn tracked(&self) -> usize {
        self.entries().len()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<RecordKey, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive hold on one root; releasing the last hold forgets the root
pub struct RootGuard<'a> {
    locks: &'a RootLocks,
    root: RecordKey,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RootGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut entries = self.locks.entries();
        // The map's handle plus ours: nobody else holds or waits.
        if Arc::strong_count(&self.lock) == 2 {
            entries.remove(&self.root);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Merged tree to hand back to the client, absent when nothing survives
    pub list: Option<ListNode>,
    pub changed_on_server: Vec<RecordKey>,
    pub persisted: usize,
    pub deleted: usize,
}

#[derive(Default)]
pub struct ListService {
    store: RwLock<MemoryStore>,
    root_locks: RootLocks,
}

impl ListService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fetch(&self, user_id: &str, list_id: &str) -> Result<Option<ListNode>, AppError> {
        let key = list_key(user_id, list_id)?;
        let store = self.store.read().await;
        Ok(store.load_tree::<ListNode>(&key)?)
    }

    /// Reconcile `client` against the stored list with the same id and
    /// apply the resulting plan.
    ///
    /// Dropping the future before it completes leaves the store untouched.
    pub async fn sync(
        &self,
        user_id: &str,
        mut client: ListNode,
    ) -> Result<SyncResponse, AppError> {
        let owner = owner_key(user_id)?;
        validate_id("list id", &client.unique_id)?;
        normalize(&mut client)?;
        let root = client.record_key(&owner);

        let _guard = self.root_locks.acquire(&root).await;
        let (server, stored_lists) = {
            let store = self.store.read().await;
            let server = store.load_tree::<ListNode>(&root)?;
            // Only a new root is checked against the owner's other lists.
            let stored_lists = if server.is_none() {
                store.shallow_children::<ListNode>(&owner)?
            } else {
                Vec::new()
            };
            (server, stored_lists)
        };
        let siblings: Vec<&ListNode> = stored_lists.iter().collect();

        let issuer = UuidIssuer::new();
        let mut sink = TracingSink;
        let outcome = reconcile(
            &issuer,
            &mut sink,
            &owner,
            &siblings,
            server.as_ref(),
            Some(&client),
        )?;

        if !outcome.plan.is_empty() {
            self.store.write().await.apply(&outcome.plan);
        }
        tracing::debug!(
            root = %root,
            issued = issuer.issued_count(),
            persisted = outcome.plan.persist.len(),
            deleted = outcome.plan.delete.len(),
            "Applied sync plan"
        );

        Ok(SyncResponse {
            list: outcome.merged,
            changed_on_server: outcome.changed_keys.into_iter().collect(),
            persisted: outcome.plan.persist.len(),
            deleted: outcome.plan.delete.len(),
        })
    }
}

fn list_key(user_id: &str, list_id: &str) -> Result<RecordKey, AppError> {
    validate_id("list id", list_id)?;
    Ok(owner_key(user_id)?.child(ListNode::KIND.as_str(), list_id))
}

fn owner_key(user_id: &str) -> Result<RecordKey, AppError> {
    validate_id("user id", user_id)?;
    Ok(RecordKey::user(user_id))
}

fn validate_id(label: &str, id: &str) -> Result<(), AppError> {
    if id.trim().is_empty() {
        return Err(AppError::bad_request(format!("{label} must not be empty")));
    }
    if id.contains(['/', ':']) {
        return Err(AppError::bad_request(format!(
            "{label} must not contain '/' or ':'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use listey_core::ids::is_permanent_id;
    use listey_core::models::{CategoryNode, ItemNode, Status};
    use pretty_assertions::assert_eq;

    use super::*;

    fn groceries() -> ListNode {
        ListNode::new("tmp-list", "Groceries", 100)
            .with_item(ItemNode::new("tmp-milk", "Milk", 100).with_category(CategoryNode::new(
                "tmp-dairy",
                "Dairy",
                100,
            )))
            .with_category(CategoryNode::new("tmp-dairy", "Dairy", 100))
    }

    #[tokio::test]
    async fn new_list_is_stored_under_permanent_ids() {
        let service = ListService::new();

        let response = service.sync("alice", groceries()).await.unwrap();
        let list = response.list.unwrap();
        assert!(is_permanent_id(&list.unique_id));
        assert_eq!(response.persisted, 4);
        assert_eq!(response.deleted, 0);

        let item = list.items.values().next().unwrap();
        let tagged = item.categories.keys().next().unwrap();
        assert_eq!(tagged, &list.categories[0].unique_id);

        let stored = service.fetch("alice", &list.unique_id).await.unwrap();
        assert_eq!(stored, Some(list));
    }

    #[tokio::test]
    async fn resync_of_unchanged_list_is_a_no_op() {
        let service = ListService::new();
        let list = service
            .sync("alice", groceries())
            .await
            .unwrap()
            .list
            .unwrap();

        let response = service.sync("alice", list.clone()).await.unwrap();
        assert_eq!(response.list, Some(list));
        assert!(response.changed_on_server.is_empty());
        assert_eq!((response.persisted, response.deleted), (0, 0));
    }

    #[tokio::test]
    async fn stale_client_gets_server_changes() {
        let service = ListService::new();
        let list = service
            .sync("alice", groceries())
            .await
            .unwrap()
            .list
            .unwrap();

        let mut renamed = list.clone();
        renamed.name = "Weekly shop".to_string();
        renamed.last_update = Some(200);
        service.sync("alice", renamed).await.unwrap();

        let response = service.sync("alice", list.clone()).await.unwrap();
        let merged = response.list.unwrap();
        assert_eq!(merged.name, "Weekly shop");
        assert_eq!(
            response.changed_on_server,
            vec![RecordKey::user("alice").child("list", list.unique_id.as_str())]
        );
        assert_eq!(response.persisted, 0);
    }

    #[tokio::test]
    async fn deleting_list_removes_stored_children() {
        let service = ListService::new();
        let mut list = service
            .sync("alice", groceries())
            .await
            .unwrap()
            .list
            .unwrap();

        list.status = Status::Deleted;
        list.last_update = Some(300);
        let response = service.sync("alice", list.clone()).await.unwrap();
        assert_eq!(response.persisted, 1);
        assert_eq!(response.deleted, 3);

        let stored = service
            .fetch("alice", &list.unique_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, Status::Deleted);
        assert!(stored.items.is_empty());
        assert!(stored.categories.is_empty());
    }

    #[tokio::test]
    async fn lists_are_scoped_to_their_owner() {
        let service = ListService::new();
        let list = service
            .sync("alice", groceries())
            .await
            .unwrap()
            .list
            .unwrap();

        assert_eq!(service.fetch("bob", &list.unique_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_ids_that_would_escape_the_key() {
        let service = ListService::new();
        let err = service.fetch("alice/list:x", "L1").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = service
            .sync("alice", ListNode::new("", "Nameless", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn retried_create_does_not_duplicate_the_list() {
        let service = ListService::new();
        let first = service.sync("alice", groceries()).await.unwrap();
        let stored = first.list.unwrap();

        let retry = service.sync("alice", groceries()).await.unwrap();
        assert_eq!(retry.list, None);
        assert_eq!((retry.persisted, retry.deleted), (0, 0));

        let lists: Vec<ListNode> = service
            .store
            .read()
            .await
            .shallow_children(&RecordKey::user("alice"))
            .unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].unique_id, stored.unique_id);
    }

    #[tokio::test]
    async fn same_name_for_another_owner_is_created() {
        let service = ListService::new();
        service.sync("alice", groceries()).await.unwrap();

        let response = service.sync("bob", groceries()).await.unwrap();
        assert!(response.list.is_some());
        assert_eq!(response.persisted, 4);
    }

    #[tokio::test]
    async fn new_item_keeps_tag_to_stored_category() {
        let service = ListService::new();
        let owner = RecordKey::user("alice");
        let list = ListNode::new("shop-1", "Groceries", 100);
        let dairy = CategoryNode::new("dairy", "Dairy", 100);
        {
            let mut store = service.store.write().await;
            store.insert(list.to_record(&owner));
            store.insert(dairy.to_record(&list.record_key(&owner)));
        }
        let list = list.with_category(dairy);

        let edited = list.with_item(
            ItemNode::new("tmp-milk", "Milk", 150)
                .with_category(CategoryNode::new("dairy", "Dairy", 100)),
        );
        let merged = service.sync("alice", edited).await.unwrap().list.unwrap();

        let item = merged.items.values().next().unwrap();
        assert!(is_permanent_id(&item.unique_id));
        assert!(item.categories.contains_key("dairy"));
        assert_eq!(merged.categories[0].unique_id, "dairy");
    }

    #[tokio::test]
    async fn released_root_locks_are_forgotten() {
        let locks = RootLocks::default();
        let root = RecordKey::user("alice").child("list", "L1");

        let held = locks.acquire(&root).await;
        assert_eq!(locks.tracked(), 1);
        drop(held);
        assert_eq!(locks.tracked(), 0);

        for id in ["L2", "L3", "L4"] {
            let _guard = locks.acquire(&RecordKey::user("alice").child("list", id)).await;
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn root_lock_survives_while_a_run_waits() {
        let locks = Arc::new(RootLocks::default());
        let root = RecordKey::user("alice").child("list", "L1");

        let held = locks.acquire(&root).await;
        let waiter = {
            let locks = Arc::clone(&locks);
            let root = root.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&root).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(held);
        assert_eq!(locks.tracked(), 1);
        waiter.await.unwrap();
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn root_lock_serializes_same_root_only() {
        let locks = RootLocks::default();
        let first = RecordKey::user("alice").child("list", "L1");
        let second = RecordKey::user("alice").child("list", "L2");

        let held = locks.acquire(&first).await;
        let blocked = tokio::time::timeout(Duration::from_millis(20), locks.acquire(&first)).await;
        assert!(blocked.is_err());

        let other = tokio::time::timeout(Duration::from_millis(20), locks.acquire(&second)).await;
        assert!(other.is_ok());

        drop(held);
        let reacquired =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire(&first)).await;
        assert!(reacquired.is_ok());
    }
}
