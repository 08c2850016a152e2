/// Snapshot plus optimistic edits for one synchronized query
///
/// API Flow:
/// 1. `subscribe` opens the query through a view's [`SubscriptionManager`]
/// 2. every delivery replaces the snapshot and reconciles the queue
/// 3. `mutate` / `toggle_membership` render an edit immediately and commit it
/// 4. a failed commit rolls the edit back and returns the error
///
/// `rendered` is the only way to read state, and it always goes through
/// [`merge`]. Every change bumps a revision counter that observers can await.
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::{
    merge, Consumer, EditId, OptimisticEdit, OptimisticQueue, Snapshot, SubscriptionHandle,
    SubscriptionManager,
};
use crate::error::AppResult;
use crate::store::{FieldOp, QueryDescriptor, RemoteStore};

struct SyncState {
    snapshot: Snapshot,
    queue: OptimisticQueue,
    delivered: bool,
}

struct SyncInner {
    store: Arc<dyn RemoteStore>,
    collection: String,
    state: Mutex<SyncState>,
    revision: watch::Sender<u64>,
}

#[derive(Clone)]
pub struct ViewStateSync {
    inner: Arc<SyncInner>,
}

impl ViewStateSync {
    /// `collection` is the path edits are written under: `{collection}/{target_key}`
    pub fn new(
        store: Arc<dyn RemoteStore>,
        collection: impl Into<String>,
        edit_timeout: Duration,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(SyncInner {
                store,
                collection: collection.into(),
                state: Mutex::new(SyncState {
                    snapshot: Snapshot::empty(),
                    queue: OptimisticQueue::new(edit_timeout),
                    delivered: false,
                }),
                revision,
            }),
        }
    }

    pub fn collection(&self) -> &str {
        &self.inner.collection
    }

    /// Opens `query` and feeds its deliveries into this state
    pub async fn subscribe(
        &self,
        manager: &SubscriptionManager,
        query: QueryDescriptor,
        fallback: Snapshot,
    ) -> SubscriptionHandle {
        let sink = self.clone();
        let consumer: Consumer = Arc::new(move |snapshot| sink.receive(snapshot));
        manager.open(query, fallback, consumer).await
    }

    /// Replaces the authoritative snapshot
    pub fn receive(&self, snapshot: Snapshot) {
        {
            let mut state = self.lock();
            let dropped = state.queue.reconcile(&snapshot, Instant::now());
            if dropped > 0 {
                tracing::debug!(collection = %self.inner.collection, dropped, "Optimistic edits reconciled");
            }
            state.snapshot = snapshot;
            state.delivered = true;
        }
        self.bump();
    }

    /// Stages an edit and renders it without writing
    pub fn apply_optimistic(&self, edit: OptimisticEdit) -> EditId {
        let id = self.lock().queue.push(edit);
        self.bump();
        id
    }

    /// Issues the remote write for a staged edit
    ///
    /// On failure the edit is removed so the rendered value returns to what
    /// the snapshot and the remaining edits say. Superseded or expired edits
    /// commit as a no-op.
    pub async fn commit(&self, id: EditId) -> AppResult<()> {
        let Some(edit) = self.lock().queue.begin_commit(id) else {
            return Ok(());
        };

        let path = format!("{}/{}", self.inner.collection, edit.target_key);
        match self.inner.store.update(&path, vec![edit.to_update()]).await {
            Ok(()) => {
                {
                    let mut state = self.lock();
                    state.queue.acknowledge(id);
                    let snapshot = state.snapshot.clone();
                    state.queue.reconcile(&snapshot, Instant::now());
                }
                self.bump();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    path = %path,
                    field = %edit.field,
                    error = %e,
                    "Write failed, rolling back optimistic edit"
                );
                self.lock().queue.rollback(id);
                self.bump();
                Err(e)
            }
        }
    }

    /// Optimistically applies `op` to one field and commits it
    pub async fn mutate(&self, target_key: &str, field: &str, op: FieldOp) -> AppResult<()> {
        let id = self.apply_optimistic(OptimisticEdit::new(target_key, field, op));
        self.commit(id).await
    }

    /// Adds `value` to an array field when absent from the rendered state, otherwise removes it
    ///
    /// Returns whether the value is now a member.
    pub async fn toggle_membership(
        &self,
        target_key: &str,
        field: &str,
        value: Value,
    ) -> AppResult<bool> {
        let present = self.contains(target_key, field, &value);
        let op = if present {
            FieldOp::ArrayRemove(vec![value])
        } else {
            FieldOp::ArrayUnion(vec![value])
        };
        self.mutate(target_key, field, op).await?;
        Ok(!present)
    }

    /// Whether the rendered array field of `target_key` holds `value`
    pub fn contains(&self, target_key: &str, field: &str, value: &Value) -> bool {
        self.find(target_key)
            .and_then(|doc| doc.get(field).and_then(Value::as_array).cloned())
            .is_some_and(|items| items.contains(value))
    }

    /// Snapshot with every pending edit applied
    pub fn rendered(&self) -> Snapshot {
        let state = self.lock();
        merge(&state.snapshot, &state.queue.active(Instant::now()))
    }

    pub fn rendered_as<T: DeserializeOwned>(&self) -> Vec<T> {
        self.rendered().decode_all()
    }

    pub fn find(&self, key: &str) -> Option<crate::store::Document> {
        self.rendered().get(key).cloned()
    }

    pub fn find_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let doc = self.find(key)?;
        match doc.decode() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(document = %key, error = %e, "Skipping malformed document");
                None
            }
        }
    }

    /// True once the subscription has delivered at least once
    pub fn has_delivery(&self) -> bool {
        self.lock().delivered
    }

    pub fn pending_count(&self) -> usize {
        self.lock().queue.len()
    }

    /// Changes on every delivery and every edit transition
    pub fn revision(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|revision| *revision += 1);
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
