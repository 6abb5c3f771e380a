//! The engine: one peer's store, observers and sync state behind a small
//! thread-safe API.

use crate::{
    dql::{parse, Statement},
    error::{Error, Result},
    observer::{ObserverEntry, ObserverRegistry, StoreObserver},
    snapshot::StoreSnapshot,
    store::Store,
    sync::{Identity, SyncHandle, SyncState, TransportConfig},
    QueryResult, Timestamp,
};
use parking_lot::{Mutex, ReentrantMutex};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Everything needed to open an engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub identity: Identity,
    /// Directory holding `store.json`. `None` keeps everything in memory.
    pub persistence_dir: Option<PathBuf>,
    pub transport: TransportConfig,
}

impl EngineConfig {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            persistence_dir: None,
            transport: TransportConfig::default(),
        }
    }

    pub fn with_persistence_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persistence_dir = Some(dir.into());
        self
    }
}

/// Current wall-clock time in milliseconds since the epoch.
fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as Timestamp
}

fn params_from(args: &Value) -> Result<Map<String, Value>> {
    match args {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map.clone()),
        _ => Err(Error::InvalidArguments(
            "query arguments must be a JSON object".into(),
        )),
    }
}

/// Executes statements and manages live observers.
pub struct StoreHandle {
    store: Mutex<Store>,
    writer: ReentrantMutex<()>,
    observers: ObserverRegistry,
    persistence_dir: Option<PathBuf>,
    closed: Arc<AtomicBool>,
}

impl StoreHandle {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    pub fn execute(&self, query: &str) -> Result<QueryResult> {
        self.execute_with_args(query, &Value::Null)
    }

    /// Execute a statement with named arguments (a JSON object, or null).
    ///
    /// A write either commits (in memory and, for a persistent store, on
    /// disk) or fails without any effect. Live observers are re-evaluated
    /// when the statement changed any document. Their callbacks run on this
    /// thread once the store lock has been released, in commit order.
    pub fn execute_with_args(&self, query: &str, args: &Value) -> Result<QueryResult> {
        self.ensure_open()?;
        let params = params_from(args)?;
        let statement = parse(query)?;

        if let Statement::Select(select) = &statement {
            return self.store.lock().select(select, &params);
        }

        // Held until delivery finishes. Re-entrant so callbacks may write.
        let _writer = self.writer.lock();
        let (result, notifications) = {
            let mut store = self.store.lock();
            let result = match &self.persistence_dir {
                Some(dir) => {
                    let mut staged = store.clone();
                    let result = staged.execute(&statement, &params, now_millis())?;
                    if !result.mutated_document_ids.is_empty()
                        || matches!(statement, Statement::AlterSystem { .. })
                    {
                        persist(&staged, dir)?;
                    }
                    *store = staged;
                    result
                }
                None => store.execute(&statement, &params, now_millis())?,
            };

            let notifications = if result.mutated_document_ids.is_empty() {
                Vec::new()
            } else {
                self.evaluate_observers(&store)
            };
            (result, notifications)
        };

        for (entry, observed) in notifications {
            entry.deliver(observed);
        }
        Ok(result)
    }

    /// Observe a `SELECT`. The callback receives the current result right
    /// away and the full result again after every change.
    ///
    /// No write can land between the initial result and registration.
    pub fn register_observer<F>(&self, query: &str, args: &Value, callback: F) -> Result<StoreObserver>
    where
        F: Fn(QueryResult) + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let params = params_from(args)?;
        let select = match parse(query)? {
            Statement::Select(select) => select,
            _ => {
                return Err(Error::InvalidArguments(
                    "only SELECT statements can be observed".into(),
                ))
            }
        };

        let _writer = self.writer.lock();
        let initial = self.store.lock().select(&select, &params)?;
        let observer = self.observers.register(select, params, Box::new(callback));
        if let Some(entry) = self
            .observers
            .entries()
            .into_iter()
            .find(|entry| entry.id == observer.id())
        {
            entry.deliver(initial);
        }
        Ok(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.observer_count()
    }

    fn evaluate_observers(&self, store: &Store) -> Vec<(Arc<ObserverEntry>, QueryResult)> {
        let mut notifications = Vec::new();
        for entry in self.observers.entries() {
            match store.select(&entry.query, &entry.params) {
                Ok(result) => notifications.push((entry, result)),
                Err(e) => {
                    tracing::warn!(observer_id = entry.id, error = %e, "observer query failed");
                }
            }
        }
        notifications
    }

    fn flush(&self) -> Result<()> {
        match &self.persistence_dir {
            Some(dir) => persist(&self.store.lock(), dir),
            None => Ok(()),
        }
    }
}

fn persist(store: &Store, dir: &Path) -> Result<()> {
    store.export_state().save(dir).map_err(|e| {
        tracing::error!(dir = %dir.display(), error = %e, "failed to persist store");
        e
    })
}

/// One peer of the sync mesh.
pub struct Engine {
    identity: Identity,
    transport: Mutex<TransportConfig>,
    store: StoreHandle,
    sync: SyncHandle,
    sync_state: Arc<SyncState>,
    closed: Arc<AtomicBool>,
    sync_with_v3_disabled: AtomicBool,
    small_peer_info_enabled: AtomicBool,
}

impl Engine {
    /// Open an engine, restoring persisted state when the persistence
    /// directory holds a snapshot.
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.identity.validate()?;

        let store = match &config.persistence_dir {
            Some(dir) => load_store(dir)?,
            None => Store::new(new_peer_id()),
        };

        tracing::info!(
            app_id = %config.identity.app_id(),
            peer_id = %store.peer_id(),
            persistence_dir = ?config.persistence_dir,
            "engine opened"
        );

        let closed = Arc::new(AtomicBool::new(false));
        let sync_state = Arc::new(SyncState::default());

        Ok(Self {
            identity: config.identity,
            transport: Mutex::new(config.transport),
            store: StoreHandle {
                store: Mutex::new(store),
                writer: ReentrantMutex::new(()),
                observers: ObserverRegistry::new(),
                persistence_dir: config.persistence_dir,
                closed: closed.clone(),
            },
            sync: SyncHandle::new(sync_state.clone(), closed.clone()),
            sync_state,
            closed,
            sync_with_v3_disabled: AtomicBool::new(false),
            small_peer_info_enabled: AtomicBool::new(false),
        })
    }

    /// Version string of the engine.
    pub fn sdk_version() -> &'static str {
        concat!("quickstart-engine ", env!("CARGO_PKG_VERSION"))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn peer_id(&self) -> String {
        self.store.store.lock().peer_id().clone()
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn sync(&self) -> &SyncHandle {
        &self.sync
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    pub fn start_sync(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.transport.lock().has_any_transport() {
            tracing::warn!("starting sync with every transport disabled");
        }
        if self.sync_state.start() {
            tracing::info!(app_id = %self.identity.app_id(), "sync started");
        }
        Ok(())
    }

    pub fn stop_sync(&self) -> Result<()> {
        self.ensure_open()?;
        if self.sync_state.stop() {
            tracing::info!(app_id = %self.identity.app_id(), "sync stopped");
        }
        Ok(())
    }

    pub fn is_sync_active(&self) -> bool {
        self.sync_state.is_active()
    }

    /// Edit the transport configuration in place.
    pub fn update_transport_config<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut TransportConfig),
    {
        self.ensure_open()?;
        let mut transport = self.transport.lock();
        update(&mut transport);
        tracing::debug!(transport = ?*transport, "transport config updated");
        Ok(())
    }

    pub fn transport_config(&self) -> TransportConfig {
        self.transport.lock().clone()
    }

    /// Opt out of the legacy v3 sync protocol. The embedded engine only
    /// records the choice.
    pub fn disable_sync_with_v3(&self) -> Result<()> {
        self.ensure_open()?;
        self.sync_with_v3_disabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_sync_with_v3_disabled(&self) -> bool {
        self.sync_with_v3_disabled.load(Ordering::SeqCst)
    }

    /// Toggle reporting of peer diagnostics to the sync service.
    pub fn set_small_peer_info_enabled(&self, enabled: bool) -> Result<()> {
        self.ensure_open()?;
        self.small_peer_info_enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_small_peer_info_enabled(&self) -> bool {
        self.small_peer_info_enabled.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop sync, cancel observers and subscriptions, and flush the store.
    /// Every later call fails with [`Error::Closed`]. Closing twice is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.sync_state.stop();
        self.sync_state.cancel_all();
        self.store.observers.clear();
        tracing::info!(app_id = %self.identity.app_id(), "engine closed");
        self.store.flush()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "error while closing engine");
        }
    }
}

fn new_peer_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn load_store(dir: &Path) -> Result<Store> {
    match StoreSnapshot::load(dir)? {
        Some(snapshot) => {
            tracing::debug!(
                dir = %dir.display(),
                documents = snapshot.document_count(),
                "restored store snapshot"
            );
            Ok(Store::from_snapshot(snapshot))
        }
        None => Ok(Store::new(new_peer_id())),
    }
}
