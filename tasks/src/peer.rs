//! The tasks peer: create, read, update and soft-delete tasks, observe the
//! live list, and toggle sync.

use crate::config::PeerConfig;
use crate::error::{IdLookup, Result, TasksError};
use crate::task::Task;
use futures::Stream;
use parking_lot::{Mutex, ReentrantMutex};
use quickstart_engine::{
    Engine, EngineConfig, Identity, QueryResult, StoreObserver, SyncSubscription,
};
use serde_json::{json, Value};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Collection every task lives in.
pub const TASKS_COLLECTION: &str = "tasks";

const SUBSCRIPTION_QUERY: &str = "SELECT * FROM tasks";
const SELECT_ACTIVE_QUERY: &str = "SELECT * FROM tasks WHERE NOT deleted ORDER BY _id";
const SELECT_ALL_QUERY: &str = "SELECT * FROM tasks ORDER BY _id";
const SELECT_BY_ID_QUERY: &str = "SELECT * FROM tasks WHERE _id = :id AND NOT deleted";
const SELECT_MATCHING_QUERY: &str =
    "SELECT * FROM tasks WHERE contains(_id, :idSubstring) AND NOT deleted";
const INSERT_QUERY: &str = "INSERT INTO tasks DOCUMENTS (:newTask)";
const UPDATE_QUERY: &str =
    "UPDATE tasks SET title = :title, done = :done, deleted = :deleted WHERE _id = :id";
const MARK_COMPLETE_QUERY: &str = "UPDATE tasks SET done = :done WHERE _id = :id";
const UPDATE_TITLE_QUERY: &str = "UPDATE tasks SET title = :title WHERE _id = :id";
const DELETE_QUERY: &str = "UPDATE tasks SET deleted = true WHERE _id = :id";
const EVICT_QUERY: &str = "EVICT FROM tasks WHERE deleted = true";

/// A peer that owns one sync engine and exposes the to-do list on top of it.
///
/// All operations are serialized by a recursive lock, so observer callbacks
/// running on the calling thread may call back into the peer.
pub struct TasksPeer {
    engine: Engine,
    lock: ReentrantMutex<()>,
    subscription: Mutex<Option<SyncSubscription>>,
}

impl TasksPeer {
    pub fn new(config: PeerConfig) -> Result<Self> {
        let identity = Identity::OnlinePlayground {
            app_id: config.app_id.clone(),
            token: config.token.clone(),
            enable_cloud_sync: config.enable_cloud_sync,
            custom_auth_url: config.custom_auth_url.clone(),
        };
        let mut engine_config = EngineConfig::new(identity);
        engine_config.persistence_dir = config.persistence_dir.clone();

        let engine =
            Engine::open(engine_config).map_err(TasksError::store("initialize the sync engine"))?;

        let toggles = config.transports;
        let websocket_url = config.websocket_url.clone();
        engine
            .update_transport_config(move |transport| {
                let p2p = &mut transport.peer_to_peer;
                if toggles.disable_ble {
                    p2p.bluetooth_le = false;
                }
                if toggles.disable_lan {
                    p2p.lan = false;
                }
                if toggles.disable_awdl {
                    p2p.awdl = false;
                }
                if toggles.disable_wifi_aware {
                    p2p.wifi_aware = false;
                }
                if let Some(url) = websocket_url {
                    transport.connect.websocket_urls.push(url);
                }
            })
            .map_err(TasksError::store("configure transports"))?;

        engine
            .disable_sync_with_v3()
            .map_err(TasksError::store("disable v3 sync"))?;
        engine
            .set_small_peer_info_enabled(true)
            .map_err(TasksError::store("enable small peer info"))?;
        engine
            .store()
            .execute("ALTER SYSTEM SET DQL_STRICT_MODE = false")
            .map_err(TasksError::store("disable strict mode"))?;

        tracing::info!(
            app_id = %config.app_id,
            peer_id = %engine.peer_id(),
            persistent = config.persistence_dir.is_some(),
            "tasks peer initialized"
        );

        Ok(Self {
            engine,
            lock: ReentrantMutex::new(()),
            subscription: Mutex::new(None),
        })
    }

    pub fn sdk_version() -> &'static str {
        Engine::sdk_version()
    }

    /// The underlying engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn is_sync_active(&self) -> bool {
        let _guard = self.lock.lock();
        self.engine.is_sync_active()
    }

    /// Start syncing and subscribe to the whole collection. Does nothing if
    /// sync is already running.
    pub fn start_sync(&self) -> Result<()> {
        let _guard = self.lock.lock();
        if self.engine.is_sync_active() {
            return Ok(());
        }

        self.engine
            .start_sync()
            .map_err(TasksError::store("start sync"))?;
        let subscription = self
            .engine
            .sync()
            .register_subscription(SUBSCRIPTION_QUERY)
            .map_err(TasksError::store("register sync subscription"))?;
        *self.subscription.lock() = Some(subscription);

        tracing::info!("sync started");
        Ok(())
    }

    /// Cancel the subscription and stop syncing. Does nothing if sync is not
    /// running.
    pub fn stop_sync(&self) -> Result<()> {
        let _guard = self.lock.lock();
        if !self.engine.is_sync_active() {
            return Ok(());
        }

        if let Some(subscription) = self.subscription.lock().take() {
            subscription.cancel();
        }
        self.engine
            .stop_sync()
            .map_err(TasksError::store("stop sync"))?;

        tracing::info!("sync stopped");
        Ok(())
    }

    /// Insert a new task and return its generated id.
    pub fn add_task(&self, title: &str, done: bool) -> Result<String> {
        let _guard = self.lock.lock();
        let args = json!({
            "newTask": {
                "title": title,
                "done": done,
                "deleted": false,
            }
        });
        let result = self
            .engine
            .store()
            .execute_with_args(INSERT_QUERY, &args)
            .map_err(TasksError::store("add task"))?;

        let id = result.mutated_document_ids.first().cloned().ok_or_else(|| {
            TasksError::store("add task")(quickstart_engine::Error::InvalidDocument(
                "insert reported no document id".into(),
            ))
        })?;
        tracing::debug!(task_id = %id, "added task");
        Ok(id)
    }

    /// All tasks ordered by id, optionally including soft-deleted ones.
    pub fn get_tasks(&self, include_deleted: bool) -> Result<Vec<Task>> {
        let _guard = self.lock.lock();
        let query = if include_deleted {
            SELECT_ALL_QUERY
        } else {
            SELECT_ACTIVE_QUERY
        };
        let result = self
            .engine
            .store()
            .execute(query)
            .map_err(TasksError::store("get tasks"))?;
        tasks_from(&result)
    }

    /// The non-deleted task with exactly this id.
    pub fn get_task(&self, id: &str) -> Result<Task> {
        if id.is_empty() {
            return Err(TasksError::InvalidArgument("task id must not be empty".into()));
        }
        let _guard = self.lock.lock();
        let result = self
            .engine
            .store()
            .execute_with_args(SELECT_BY_ID_QUERY, &json!({ "id": id }))
            .map_err(TasksError::store("get task"))?;
        single_task(&result, IdLookup::Exact(id.to_string()))
    }

    /// The one non-deleted task whose id contains `fragment`.
    pub fn find_matching_task(&self, fragment: &str) -> Result<Task> {
        if fragment.is_empty() {
            return Err(TasksError::InvalidArgument(
                "id substring must not be empty".into(),
            ));
        }
        let _guard = self.lock.lock();
        let result = self
            .engine
            .store()
            .execute_with_args(SELECT_MATCHING_QUERY, &json!({ "idSubstring": fragment }))
            .map_err(TasksError::store("find matching task"))?;
        single_task(&result, IdLookup::Containing(fragment.to_string()))
    }

    /// Overwrite title, done and deleted of the task with `task.id`.
    pub fn update_task(&self, task: &Task) -> Result<()> {
        let args = json!({
            "id": task.id,
            "title": task.title,
            "done": task.done,
            "deleted": task.deleted,
        });
        self.update_by_id(&task.id, UPDATE_QUERY, args, "update task")
    }

    pub fn mark_task_complete(&self, id: &str, done: bool) -> Result<()> {
        let args = json!({ "id": id, "done": done });
        self.update_by_id(id, MARK_COMPLETE_QUERY, args, "mark task complete")
    }

    pub fn update_task_title(&self, id: &str, title: &str) -> Result<()> {
        let args = json!({ "id": id, "title": title });
        self.update_by_id(id, UPDATE_TITLE_QUERY, args, "update task title")
    }

    /// Soft-delete: the task stays in the store with `deleted = true` until
    /// evicted.
    pub fn delete_task(&self, id: &str) -> Result<()> {
        self.update_by_id(id, DELETE_QUERY, json!({ "id": id }), "delete task")
    }

    /// Remove soft-deleted tasks from the local store. Returns how many were
    /// evicted.
    pub fn evict_deleted_tasks(&self) -> Result<usize> {
        let _guard = self.lock.lock();
        let result = self
            .engine
            .store()
            .execute(EVICT_QUERY)
            .map_err(TasksError::store("evict deleted tasks"))?;
        let evicted = result.mutated_document_ids.len();
        tracing::debug!(evicted, "evicted deleted tasks");
        Ok(evicted)
    }

    fn update_by_id(&self, id: &str, query: &str, args: Value, action: &'static str) -> Result<()> {
        if id.is_empty() {
            return Err(TasksError::InvalidArgument("task id must not be empty".into()));
        }
        let _guard = self.lock.lock();
        let result = self
            .engine
            .store()
            .execute_with_args(query, &args)
            .map_err(TasksError::store(action))?;

        if result.mutated_document_ids.is_empty() {
            return Err(TasksError::NotFound(IdLookup::Exact(id.to_string())));
        }
        tracing::debug!(task_id = %id, action, "task updated");
        Ok(())
    }

    /// Watch the non-deleted tasks. The callback gets the current list right
    /// away and the whole list again after every change. Dropping the
    /// returned handle stops the callbacks.
    pub fn register_tasks_observer<F>(&self, callback: F) -> Result<TasksObserver>
    where
        F: Fn(&[Task]) + Send + Sync + 'static,
    {
        let _guard = self.lock.lock();
        let observer = self
            .engine
            .store()
            .register_observer(SELECT_ACTIVE_QUERY, &Value::Null, move |result| {
                let tasks = match tasks_from(&result) {
                    Ok(tasks) => tasks,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable tasks snapshot");
                        return;
                    }
                };
                tracing::trace!(count = tasks.len(), "delivering tasks snapshot");
                if panic::catch_unwind(AssertUnwindSafe(|| callback(&tasks))).is_err() {
                    tracing::error!("tasks observer callback panicked");
                }
            })
            .map_err(TasksError::store("register tasks observer"))?;
        Ok(TasksObserver { inner: observer })
    }

    /// Stream of task list snapshots, starting with the current one.
    pub fn observe_tasks(&self) -> Result<TasksStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = self.register_tasks_observer(move |tasks| {
            // The receiver going away just means nobody is listening.
            let _ = tx.send(tasks.to_vec());
        })?;
        Ok(TasksStream { rx, observer })
    }

    /// Run any statement and return
    /// `{"items": [...], "modified_document_ids": [...]}` as JSON text.
    pub fn execute_dql_query(&self, query: &str) -> Result<String> {
        self.execute_dql_query_with_args(query, &Value::Null)
    }

    pub fn execute_dql_query_with_args(&self, query: &str, args: &Value) -> Result<String> {
        let _guard = self.lock.lock();
        let result = self
            .engine
            .store()
            .execute_with_args(query, args)
            .map_err(TasksError::store("execute query"))?;
        Ok(result.to_json().to_string())
    }
}

impl Drop for TasksPeer {
    fn drop(&mut self) {
        if let Err(e) = self.stop_sync() {
            tracing::error!(error = %e, "failed to stop sync while dropping tasks peer");
        }
        if let Err(e) = self.engine.close() {
            tracing::error!(error = %e, "failed to close engine while dropping tasks peer");
        }
    }
}

fn tasks_from(result: &QueryResult) -> Result<Vec<Task>> {
    result
        .iter()
        .map(|item| {
            item.deserialize_value::<Task>()
                .map_err(TasksError::store("decode task"))
        })
        .collect()
}

fn single_task(result: &QueryResult, lookup: IdLookup) -> Result<Task> {
    match result.item_count() {
        0 => Err(TasksError::NotFound(lookup)),
        1 => tasks_from(result)?
            .pop()
            .ok_or(TasksError::NotFound(lookup)),
        _ => Err(TasksError::Ambiguous(lookup)),
    }
}

/// Handle for a callback registered with
/// [`TasksPeer::register_tasks_observer`].
#[derive(Debug)]
pub struct TasksObserver {
    inner: StoreObserver,
}

impl TasksObserver {
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}

/// Snapshots of the non-deleted tasks as a [`Stream`].
///
/// Ends after [`cancel`](TasksStream::cancel) once buffered snapshots are
/// drained. Dropping it unsubscribes.
pub struct TasksStream {
    rx: mpsc::UnboundedReceiver<Vec<Task>>,
    observer: TasksObserver,
}

impl TasksStream {
    pub fn cancel(&mut self) {
        self.observer.cancel();
        self.rx.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.observer.is_cancelled()
    }
}

impl Stream for TasksStream {
    type Item = Vec<Task>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
