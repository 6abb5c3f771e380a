//! Live query observers.
//!
//! Tracks the store observers that are currently registered and delivers
//! fresh query results to them after every write.

use crate::{dql::Select, QueryResult};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Callback invoked with the full result set of an observed query.
pub type ObserverCallback = Box<dyn Fn(QueryResult) + Send + Sync>;

/// A registered observer.
pub(crate) struct ObserverEntry {
    pub(crate) id: u64,
    pub(crate) query: Select,
    pub(crate) params: Map<String, Value>,
    callback: ObserverCallback,
    cancelled: AtomicBool,
}

impl ObserverEntry {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Hand a result to the callback. Panics are caught so one broken
    /// observer cannot stop the others from being notified.
    pub(crate) fn deliver(&self, result: QueryResult) {
        if self.is_cancelled() {
            return;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(result)));
        if outcome.is_err() {
            tracing::error!(observer_id = self.id, "store observer callback panicked");
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    observers: DashMap<u64, Arc<ObserverEntry>>,
    next_id: AtomicU64,
}

/// Manages live observers.
///
/// Cheap to clone; clones share the same set of observers.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    inner: Arc<RegistryInner>,
}

impl ObserverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer and return its handle.
    pub(crate) fn register(
        &self,
        query: Select,
        params: Map<String, Value>,
        callback: ObserverCallback,
    ) -> StoreObserver {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = Arc::new(ObserverEntry {
            id,
            query,
            params,
            callback,
            cancelled: AtomicBool::new(false),
        });
        self.inner.observers.insert(id, entry.clone());

        tracing::debug!(observer_id = id, collection = %entry.query.collection, "store observer registered");

        StoreObserver {
            entry,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unregister(&self, id: u64) -> bool {
        unregister(&self.inner, id)
    }

    /// Snapshot of the live observers, taken so that callbacks can run
    /// without holding any map shard lock.
    pub(crate) fn entries(&self) -> Vec<Arc<ObserverEntry>> {
        self.inner
            .observers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Cancel and drop every observer.
    pub fn clear(&self) {
        for entry in self.inner.observers.iter() {
            entry.value().cancel();
        }
        self.inner.observers.clear();
    }

    /// Get the number of live observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }
}

fn unregister(inner: &RegistryInner, id: u64) -> bool {
    match inner.observers.remove(&id) {
        Some((_, entry)) => {
            entry.cancel();
            tracing::debug!(observer_id = id, "store observer unregistered");
            true
        }
        None => false,
    }
}

/// Handle to a registered observer. Dropping it cancels the observer.
pub struct StoreObserver {
    entry: Arc<ObserverEntry>,
    registry: Weak<RegistryInner>,
}

impl StoreObserver {
    pub fn id(&self) -> u64 {
        self.entry.id
    }

    /// Stop receiving results. Calling it again has no effect.
    pub fn cancel(&self) {
        self.entry.cancel();
        if let Some(inner) = self.registry.upgrade() {
            unregister(&inner, self.entry.id);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.entry.is_cancelled()
    }
}

impl Drop for StoreObserver {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for StoreObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreObserver")
            .field("id", &self.entry.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
