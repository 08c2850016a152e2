/// Push subscription lifecycle
///
/// Each open query runs on its own task that forwards deliveries to a single
/// consumer. The consumer is invoked while the handle's liveness lock is held,
/// and `close` takes the same lock before clearing the flag, so once `close`
/// returns the consumer will not run again for that handle.
///
/// A manager keeps at most one handle per query shape; opening the same shape
/// again (for example under a new user scope) closes the previous handle first.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::AbortHandle;
use uuid::Uuid;

use super::Snapshot;
use crate::store::{QueryDescriptor, QueryShape, RemoteStore, WatchStream};

/// Receives every snapshot of one subscription
pub type Consumer = Arc<dyn Fn(Snapshot) + Send + Sync>;

#[derive(Clone)]
pub struct SubscriptionHandle {
    id: Uuid,
    shape: QueryShape,
    live: Arc<Mutex<bool>>,
    task: AbortHandle,
}

impl SubscriptionHandle {
    pub fn shape(&self) -> &QueryShape {
        &self.shape
    }

    pub fn is_live(&self) -> bool {
        *self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        *live = false;
        drop(live);
        self.task.abort();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("shape", &self.shape)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Delivers to the consumer only while the handle is live
struct GuardedConsumer {
    live: Arc<Mutex<bool>>,
    consumer: Consumer,
}

impl GuardedConsumer {
    fn deliver(&self, snapshot: Snapshot) -> bool {
        let live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        if !*live {
            return false;
        }
        (self.consumer)(snapshot);
        true
    }
}

pub struct SubscriptionManager {
    store: Arc<dyn RemoteStore>,
    handles: Mutex<HashMap<QueryShape, SubscriptionHandle>>,
}

impl SubscriptionManager {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a subscription and starts delivering to `consumer`
    ///
    /// Read errors, including a failure to open the watch, deliver `fallback`
    /// instead. The subscription is not retried; the store owns reconnection.
    pub async fn open(
        &self,
        query: QueryDescriptor,
        fallback: Snapshot,
        consumer: Consumer,
    ) -> SubscriptionHandle {
        let shape = query.shape();
        if let Some(prior) = self.take(&shape) {
            tracing::debug!(shape = %shape, "Replacing open subscription");
            prior.close();
        }

        let live = Arc::new(Mutex::new(true));
        let guarded = GuardedConsumer {
            live: live.clone(),
            consumer,
        };

        let stream = self.store.watch(&query).await;
        let collection = query.collection.clone();
        let task = tokio::spawn(async move {
            match stream {
                Ok(stream) => forward(stream, guarded, fallback, &collection).await,
                Err(e) => {
                    tracing::warn!(collection = %collection, error = %e, "Watch failed to open, delivering fallback");
                    guarded.deliver(fallback);
                }
            }
        });

        let handle = SubscriptionHandle {
            id: Uuid::new_v4(),
            shape: shape.clone(),
            live,
            task: task.abort_handle(),
        };

        tracing::debug!(shape = %shape, store = self.store.name(), "Subscription opened");
        self.lock().insert(shape, handle.clone());
        handle
    }

    /// Stops delivery; no consumer call happens after this returns
    pub fn close(&self, handle: &SubscriptionHandle) {
        handle.close();
        let mut handles = self.lock();
        if handles
            .get(&handle.shape)
            .is_some_and(|open| open.id == handle.id)
        {
            handles.remove(&handle.shape);
        }
        tracing::debug!(shape = %handle.shape, "Subscription closed");
    }

    pub fn close_all(&self) {
        let handles: Vec<SubscriptionHandle> = self.lock().drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.close();
        }
        if !handles.is_empty() {
            tracing::debug!(count = handles.len(), "Subscriptions closed");
        }
    }

    pub fn open_count(&self) -> usize {
        self.lock().len()
    }

    fn take(&self, shape: &QueryShape) -> Option<SubscriptionHandle> {
        self.lock().remove(shape)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<QueryShape, SubscriptionHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.close_all();
    }
}

async fn forward(
    mut stream: WatchStream,
    guarded: GuardedConsumer,
    fallback: Snapshot,
    collection: &str,
) {
    while let Some(delivery) = stream.recv().await {
        let snapshot = match delivery {
            Ok(documents) => Snapshot::new(documents),
            Err(e) => {
                tracing::warn!(collection = %collection, error = %e, "Read failed, delivering fallback");
                fallback.clone()
            }
        };
        if !guarded.deliver(snapshot) {
            return;
        }
    }
    tracing::debug!(collection = %collection, "Watch stream ended");
}
