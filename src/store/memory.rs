/// In-process document store
///
/// Stands in for the hosted database when it is not configured and in tests.
/// Every write re-evaluates the open watches on the written collection and
/// pushes their full result sets, which matches what the hosted listener does.
/// Read and write failures can be injected to exercise fallback and rollback.
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

use super::{
    split_document_path, Document, FieldUpdate, QueryDescriptor, RemoteStore, WatchDelivery,
    WatchStream,
};
use crate::error::{AppError, AppResult};

struct Watcher {
    query: QueryDescriptor,
    tx: mpsc::UnboundedSender<WatchDelivery>,
}

#[derive(Default)]
struct MemoryInner {
    /// collection path → document id → fields
    collections: BTreeMap<String, BTreeMap<String, Map<String, Value>>>,
    watchers: Vec<Watcher>,
    read_failure: Option<String>,
    write_failure: Option<String>,
    next_id: u64,
}

impl MemoryInner {
    fn query(&self, query: &QueryDescriptor) -> Vec<Document> {
        let docs: Vec<Document> = self
            .collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        query.evaluate(&docs)
    }

    fn notify(&mut self, collection: &str) {
        self.notify_matching(|query| query.collection == collection);
    }

    fn notify_matching(&mut self, matches: impl Fn(&QueryDescriptor) -> bool) {
        let mut deliveries = Vec::new();
        for (index, watcher) in self.watchers.iter().enumerate() {
            if matches(&watcher.query) {
                deliveries.push((index, self.query(&watcher.query)));
            }
        }

        let mut closed = Vec::new();
        for (index, docs) in deliveries {
            if self.watchers[index].tx.send(Ok(docs)).is_err() {
                closed.push(index);
            }
        }
        for index in closed.into_iter().rev() {
            self.watchers.remove(index);
        }
    }

    fn check_write(&self) -> AppResult<()> {
        match &self.write_failure {
            Some(message) => Err(AppError::ExternalApi(message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every subsequent write fail with `message` (or succeed again with `None`)
    pub fn fail_writes(&self, message: Option<&str>) {
        self.lock().write_failure = message.map(str::to_string);
    }

    /// Pushes a read error to every open watch; new watches also start with it
    pub fn fail_reads(&self, message: &str) {
        let mut inner = self.lock();
        inner.read_failure = Some(message.to_string());
        inner.watchers.retain(|watcher| {
            watcher
                .tx
                .send(Err(AppError::ExternalApi(message.to_string())))
                .is_ok()
        });
    }

    /// Clears an injected read failure and redelivers every open watch's result
    pub fn restore_reads(&self) {
        let mut inner = self.lock();
        inner.read_failure = None;
        inner.notify_matching(|_| true);
    }

    /// Number of watches whose receiver is still alive
    pub fn open_watch_count(&self) -> usize {
        let mut inner = self.lock();
        inner.watchers.retain(|watcher| !watcher.tx.is_closed());
        inner.watchers.len()
    }

    pub fn document_count(&self, collection_path: &str) -> usize {
        self.lock()
            .collections
            .get(collection_path)
            .map_or(0, BTreeMap::len)
    }

    /// All documents of a collection, unordered
    pub fn documents(&self, collection_path: &str) -> Vec<Document> {
        self.lock().query(&QueryDescriptor::collection(collection_path))
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, path: &str) -> AppResult<Option<Document>> {
        let (collection, id) = split_document_path(path)?;
        let inner = self.lock();
        if let Some(message) = &inner.read_failure {
            return Err(AppError::ExternalApi(message.clone()));
        }

        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn set(&self, path: &str, value: Value) -> AppResult<()> {
        let (collection, id) = split_document_path(path)?;
        let mut inner = self.lock();
        inner.check_write()?;

        let doc = Document::new(id, value);
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc.data);
        inner.notify(collection);
        Ok(())
    }

    async fn update(&self, path: &str, updates: Vec<FieldUpdate>) -> AppResult<()> {
        let (collection, id) = split_document_path(path)?;
        let mut inner = self.lock();
        inner.check_write()?;

        let data = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| AppError::NotFound(format!("No document to update: {}", path)))?;

        for update in updates {
            let value = update.op.apply(data.get(&update.field));
            data.insert(update.field, value);
        }

        inner.notify(collection);
        Ok(())
    }

    async fn add(&self, collection_path: &str, value: Value) -> AppResult<String> {
        let mut inner = self.lock();
        inner.check_write()?;

        inner.next_id += 1;
        let id = format!("doc-{:06}", inner.next_id);
        let doc = Document::new(id.clone(), value);
        inner
            .collections
            .entry(collection_path.to_string())
            .or_default()
            .insert(id.clone(), doc.data);
        inner.notify(collection_path);
        Ok(id)
    }

    async fn watch(&self, query: &QueryDescriptor) -> AppResult<WatchStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();

        let first = match &inner.read_failure {
            Some(message) => Err(AppError::ExternalApi(message.clone())),
            None => Ok(inner.query(query)),
        };
        // The receiver is still in hand, so this send cannot fail
        let _ = tx.send(first);

        inner.watchers.push(Watcher {
            query: query.clone(),
            tx,
        });
        Ok(rx)
    }

    fn shutdown(&self) {
        self.lock().watchers.clear();
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Direction, FieldOp, FilterOp};
    use serde_json::json;

    const POSTS: &str = "artifacts/test/public/data/posts";

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = MemoryStore::new();
        let path = format!("{}/p1", POSTS);
        store.set(&path, json!({"text": "hi"})).await.unwrap();

        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.id, "p1");
        assert_eq!(doc.get("text"), Some(&json!("hi")));
        assert!(store.get(&format!("{}/nope", POSTS)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_applies_array_ops() {
        let store = MemoryStore::new();
        let path = format!("{}/p1", POSTS);
        store.set(&path, json!({"likes": ["a"]})).await.unwrap();

        store
            .update(
                &path,
                vec![FieldUpdate::new("likes", FieldOp::ArrayUnion(vec![json!("b")]))],
            )
            .await
            .unwrap();
        store
            .update(
                &path,
                vec![FieldUpdate::new("likes", FieldOp::ArrayRemove(vec![json!("a")]))],
            )
            .await
            .unwrap();

        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.get("likes"), Some(&json!(["b"])));
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let store = MemoryStore::new();
        let result = store.update(&format!("{}/ghost", POSTS), vec![]).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_watch_delivers_current_state_then_changes() {
        let store = MemoryStore::new();
        store
            .set(&format!("{}/p1", POSTS), json!({"createdAt": 1}))
            .await
            .unwrap();

        let query = QueryDescriptor::collection(POSTS).order_by("createdAt", Direction::Desc);
        let mut stream = store.watch(&query).await.unwrap();

        let first = stream.recv().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);

        store.add(POSTS, json!({"createdAt": 2})).await.unwrap();
        let second = stream.recv().await.unwrap().unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].get("createdAt"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_watch_only_sees_its_collection() {
        let store = MemoryStore::new();
        let query = QueryDescriptor::collection(POSTS).filter("uid", FilterOp::Eq, json!("u1"));
        let mut stream = store.watch(&query).await.unwrap();
        assert!(stream.recv().await.unwrap().unwrap().is_empty());

        store
            .add("artifacts/test/public/data/users", json!({"uid": "u1"}))
            .await
            .unwrap();
        assert!(stream.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        let mut stream = store
            .watch(&QueryDescriptor::collection(POSTS))
            .await
            .unwrap();
        let _ = stream.recv().await;

        store.fail_reads("permission denied");
        assert!(stream.recv().await.unwrap().is_err());

        store.fail_writes(Some("offline"));
        assert!(store.add(POSTS, json!({})).await.is_err());
        store.fail_writes(None);
        assert!(store.add(POSTS, json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_restored_reads_redeliver_current_state() {
        let store = MemoryStore::new();
        store
            .set(&format!("{}/p1", POSTS), json!({"createdAt": 1}))
            .await
            .unwrap();
        let mut stream = store
            .watch(&QueryDescriptor::collection(POSTS))
            .await
            .unwrap();
        assert_eq!(stream.recv().await.unwrap().unwrap().len(), 1);

        store.fail_reads("unavailable");
        assert!(stream.recv().await.unwrap().is_err());

        store.restore_reads();
        let recovered = stream.recv().await.unwrap().unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].id, "p1");
    }

    #[tokio::test]
    async fn test_dropped_watch_is_pruned() {
        let store = MemoryStore::new();
        let stream = store
            .watch(&QueryDescriptor::collection(POSTS))
            .await
            .unwrap();
        assert_eq!(store.open_watch_count(), 1);
        drop(stream);
        assert_eq!(store.open_watch_count(), 0);
    }
}
