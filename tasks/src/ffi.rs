//! C ABI for hosting the tasks peer from a managed runtime.
//!
//! One peer per process lives in a global slot between
//! `tasks_initialize` and `tasks_terminate`. Everything crosses the boundary
//! as JSON strings.
//!
//! # Memory Management
//!
//! - Strings returned by `tasks_*` functions are allocated by Rust
//! - Caller must free them with `tasks_string_free`
//! - `tasks_sdk_version` returns a static string that must not be freed
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": {"kind": "illegal_state" | "generic", "message": "..."}}`

use crate::config::PeerConfig;
use crate::error::{Result, TasksError};
use crate::log::{self, LogLevel};
use crate::peer::{TasksObserver, TasksPeer};
use crate::task::Task;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr, CString};
use std::sync::{Arc, OnceLock};

/// Error payload of a failed call.
#[derive(Serialize)]
struct FfiError {
    kind: &'static str,
    message: String,
}

/// Result wrapper for FFI responses.
#[derive(Serialize)]
#[serde(untagged)]
enum FfiResult<T: Serialize> {
    Ok { ok: T },
    Err { error: FfiError },
}

impl<T: Serialize> From<Result<T>> for FfiResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => FfiResult::Ok { ok: value },
            Err(e) => {
                let kind = if e.is_illegal_state() {
                    "illegal_state"
                } else {
                    "generic"
                };
                FfiResult::Err {
                    error: FfiError {
                        kind,
                        message: e.to_string(),
                    },
                }
            }
        }
    }
}

impl<T: Serialize> FfiResult<T> {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"error":{{"kind":"generic","message":"serialization failed: {}"}}}}"#,
                e
            )
        })
    }
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `tasks_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CString::new(
            r#"{"error":{"kind":"generic","message":"string contained null bytes"}}"#,
        )
        .unwrap_or_default()
        .into_raw(),
    }
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn respond<T: Serialize>(result: Result<T>) -> *mut c_char {
    to_c_string(FfiResult::from(result).to_json())
}

unsafe fn required_arg(ptr: *const c_char, name: &str) -> Result<String> {
    from_c_string(ptr).ok_or_else(|| {
        TasksError::InvalidArgument(format!("{} must be a valid UTF-8 string", name))
    })
}

/// Callback receiving the non-deleted tasks as a JSON array. The string is
/// only valid for the duration of the call.
pub type TasksObserverCallback = extern "C" fn(tasks_json: *const c_char, user_data: *mut c_void);

/// Opaque host pointer handed back to the observer callback.
struct UserData(*mut c_void);

// The host owns the pointer and guarantees it may be used from any thread
// the callback is invoked on.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

impl UserData {
    fn get(&self) -> *mut c_void {
        self.0
    }
}

struct Bridge {
    peer: Arc<TasksPeer>,
    observers: HashMap<u64, TasksObserver>,
    next_observer_id: u64,
}

static BRIDGE: Mutex<Option<Bridge>> = parking_lot::const_mutex(None);

/// Clone the live peer out of the slot so the slot lock is not held while
/// the peer runs (observer callbacks may call back into the bridge).
fn current_peer() -> Result<Arc<TasksPeer>> {
    BRIDGE
        .lock()
        .as_ref()
        .map(|bridge| bridge.peer.clone())
        .ok_or(TasksError::NotInitialized)
}

fn with_peer<T, F>(f: F) -> *mut c_char
where
    T: Serialize,
    F: FnOnce(&TasksPeer) -> Result<T>,
{
    respond(current_peer().and_then(|peer| f(&peer)))
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Create the process-wide peer.
///
/// # Arguments
/// - `config_json`: JSON `PeerConfig`, e.g. `{"appId": "...", "token": "..."}`
///
/// # Returns
/// JSON string: `{"ok": null}` or an error. Fails with `illegal_state` when
/// a peer already exists.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_initialize(config_json: *const c_char) -> *mut c_char {
    let result = (|| -> Result<()> {
        let json = required_arg(config_json, "config")?;
        let config: PeerConfig = serde_json::from_str(&json)?;

        let mut slot = BRIDGE.lock();
        if slot.is_some() {
            return Err(TasksError::AlreadyInitialized);
        }
        let peer = TasksPeer::new(config)?;
        *slot = Some(Bridge {
            peer: Arc::new(peer),
            observers: HashMap::new(),
            next_observer_id: 1,
        });
        Ok(())
    })();
    respond(result)
}

/// Tear down the process-wide peer, cancelling its observers.
///
/// # Returns
/// JSON string: `{"ok": null}`, or `illegal_state` when no peer exists.
///
/// # Safety
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_terminate() -> *mut c_char {
    let bridge = BRIDGE.lock().take();
    match bridge {
        Some(bridge) => {
            // Dropped outside the slot lock: closing the peer may log and
            // cancel callbacks that try to reach the bridge.
            drop(bridge);
            respond(Ok(()))
        }
        None => respond::<()>(Err(TasksError::NotInitialized)),
    }
}

/// Free a string allocated by the library.
///
/// # Safety
/// - `s` must be a valid pointer from a `tasks_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn tasks_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Sync
// ============================================================================

/// # Returns
/// JSON string: `{"ok": true|false}`
///
/// # Safety
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_is_sync_active() -> *mut c_char {
    with_peer(|peer| Ok(peer.is_sync_active()))
}

/// # Safety
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_start_sync() -> *mut c_char {
    with_peer(|peer| peer.start_sync())
}

/// # Safety
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_stop_sync() -> *mut c_char {
    with_peer(|peer| peer.stop_sync())
}

// ============================================================================
// Tasks
// ============================================================================

/// Add a task.
///
/// # Returns
/// JSON string: `{"ok": "<new id>"}` or an error
///
/// # Safety
/// - `title` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_add_task(title: *const c_char, done: i32) -> *mut c_char {
    let title = match required_arg(title, "title") {
        Ok(title) => title,
        Err(e) => return respond::<()>(Err(e)),
    };
    with_peer(|peer| peer.add_task(&title, done != 0))
}

/// List tasks ordered by id.
///
/// # Returns
/// JSON string: `{"ok": [Task, ...]}`
///
/// # Safety
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_get_tasks(include_deleted: i32) -> *mut c_char {
    with_peer(|peer| peer.get_tasks(include_deleted != 0))
}

/// # Returns
/// JSON string: `{"ok": Task}` or an error when zero or several tasks match
///
/// # Safety
/// - `id` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_get_task(id: *const c_char) -> *mut c_char {
    let id = match required_arg(id, "id") {
        Ok(id) => id,
        Err(e) => return respond::<()>(Err(e)),
    };
    with_peer(|peer| peer.get_task(&id))
}

/// # Safety
/// - `fragment` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_find_matching_task(fragment: *const c_char) -> *mut c_char {
    let fragment = match required_arg(fragment, "id substring") {
        Ok(fragment) => fragment,
        Err(e) => return respond::<()>(Err(e)),
    };
    with_peer(|peer| peer.find_matching_task(&fragment))
}

/// Overwrite a task.
///
/// # Arguments
/// - `task_json`: JSON `Task` including its `_id`
///
/// # Safety
/// - `task_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_update_task(task_json: *const c_char) -> *mut c_char {
    let task = required_arg(task_json, "task")
        .and_then(|json| Task::from_json(&json).map_err(TasksError::from));
    match task {
        Ok(task) => with_peer(|peer| peer.update_task(&task)),
        Err(e) => respond::<()>(Err(e)),
    }
}

/// # Safety
/// - `id` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_mark_task_complete(id: *const c_char, done: i32) -> *mut c_char {
    let id = match required_arg(id, "id") {
        Ok(id) => id,
        Err(e) => return respond::<()>(Err(e)),
    };
    with_peer(|peer| peer.mark_task_complete(&id, done != 0))
}

/// # Safety
/// - `id` and `title` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_update_task_title(
    id: *const c_char,
    title: *const c_char,
) -> *mut c_char {
    let args = required_arg(id, "id").and_then(|id| Ok((id, required_arg(title, "title")?)));
    match args {
        Ok((id, title)) => with_peer(|peer| peer.update_task_title(&id, &title)),
        Err(e) => respond::<()>(Err(e)),
    }
}

/// Soft-delete a task.
///
/// # Safety
/// - `id` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_delete_task(id: *const c_char) -> *mut c_char {
    let id = match required_arg(id, "id") {
        Ok(id) => id,
        Err(e) => return respond::<()>(Err(e)),
    };
    with_peer(|peer| peer.delete_task(&id))
}

/// # Returns
/// JSON string: `{"ok": <number evicted>}`
///
/// # Safety
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_evict_deleted_tasks() -> *mut c_char {
    with_peer(|peer| peer.evict_deleted_tasks())
}

/// Run an arbitrary statement.
///
/// # Arguments
/// - `query`: statement text
/// - `args_json`: JSON object of named arguments, or null for none
///
/// # Returns
/// JSON string: `{"ok": {"items": [...], "modified_document_ids": [...]}}`
///
/// # Safety
/// - `query` and `args_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_execute_dql_query(
    query: *const c_char,
    args_json: *const c_char,
) -> *mut c_char {
    let query = match required_arg(query, "query") {
        Ok(query) => query,
        Err(e) => return respond::<()>(Err(e)),
    };
    let args = match from_c_string(args_json) {
        Some(json) => match serde_json::from_str::<serde_json::Value>(&json) {
            Ok(args) => args,
            Err(e) => return respond::<()>(Err(e.into())),
        },
        None => serde_json::Value::Null,
    };
    with_peer(|peer| {
        let json = peer.execute_dql_query_with_args(&query, &args)?;
        Ok(serde_json::from_str::<serde_json::Value>(&json)?)
    })
}

// ============================================================================
// Observers
// ============================================================================

/// Register a callback for the non-deleted task list. It fires once right
/// away and again after every change, on the thread that made the change.
///
/// # Returns
/// JSON string: `{"ok": <observer id>}` for `tasks_cancel_observer`
///
/// # Safety
/// - `callback` must be a valid function pointer or null
/// - `user_data` must stay valid until the observer is cancelled or the
///   peer is terminated
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_register_observer(
    callback: Option<TasksObserverCallback>,
    user_data: *mut c_void,
) -> *mut c_char {
    let Some(callback) = callback else {
        return respond::<()>(Err(TasksError::InvalidArgument(
            "callback must not be null".into(),
        )));
    };
    let user_data = UserData(user_data);

    let peer = match current_peer() {
        Ok(peer) => peer,
        Err(e) => return respond::<()>(Err(e)),
    };
    let observer = peer.register_tasks_observer(move |tasks| {
        let json = match serde_json::to_string(tasks) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode tasks for observer");
                return;
            }
        };
        match CString::new(json) {
            Ok(json) => callback(json.as_ptr(), user_data.get()),
            Err(e) => tracing::error!(error = %e, "tasks JSON contained a null byte"),
        }
    });
    let observer = match observer {
        Ok(observer) => observer,
        Err(e) => return respond::<()>(Err(e)),
    };

    let mut slot = BRIDGE.lock();
    let result = match slot.as_mut() {
        Some(bridge) if Arc::ptr_eq(&bridge.peer, &peer) => {
            let id = bridge.next_observer_id;
            bridge.next_observer_id += 1;
            bridge.observers.insert(id, observer);
            Ok(id)
        }
        // Terminated while registering
        _ => {
            observer.cancel();
            Err(TasksError::NotInitialized)
        }
    };
    drop(slot);
    respond(result)
}

/// Cancel an observer.
///
/// # Returns
/// JSON string: `{"ok": true}` if the observer existed, `{"ok": false}`
/// otherwise
///
/// # Safety
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_cancel_observer(observer_id: u64) -> *mut c_char {
    let removed = {
        let mut slot = BRIDGE.lock();
        match slot.as_mut() {
            Some(bridge) => Ok(bridge.observers.remove(&observer_id)),
            None => Err(TasksError::NotInitialized),
        }
    };
    respond(removed.map(|observer| match observer {
        Some(observer) => {
            observer.cancel();
            true
        }
        None => false,
    }))
}

// ============================================================================
// Logging
// ============================================================================

/// Log a message through the library's logger.
///
/// # Arguments
/// - `level`: 1 error, 2 warning, 3 info, 4 debug, 5 verbose
///
/// # Safety
/// - `message` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_log(level: i32, message: *const c_char) -> *mut c_char {
    let result = level_from(level).and_then(|level| {
        let message = required_arg(message, "message")?;
        log::log(level, message);
        Ok(())
    });
    respond(result)
}

/// # Safety
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_set_minimum_log_level(level: i32) -> *mut c_char {
    respond(level_from(level).map(log::set_minimum_log_level))
}

/// # Returns
/// JSON string: `{"ok": <level number>}`
///
/// # Safety
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_get_minimum_log_level() -> *mut c_char {
    respond(Ok(log::get_minimum_log_level() as i32))
}

/// # Safety
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_set_logging_enabled(enabled: i32) -> *mut c_char {
    log::set_logging_enabled(enabled != 0);
    respond(Ok(()))
}

/// Copy the active log file to `destination`.
///
/// # Returns
/// JSON string: `{"ok": <bytes copied>}` or an error when no log file is
/// active
///
/// # Safety
/// - `destination` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tasks_string_free`
#[no_mangle]
pub unsafe extern "C" fn tasks_export_log(destination: *const c_char) -> *mut c_char {
    let result = required_arg(destination, "destination").and_then(log::export_log);
    respond(result)
}

fn level_from(level: i32) -> Result<LogLevel> {
    LogLevel::from_i32(level)
        .ok_or_else(|| TasksError::InvalidArgument(format!("unknown log level {}", level)))
}

// ============================================================================
// Utility
// ============================================================================

/// Get the version of the underlying sync engine, as reported by
/// [`TasksPeer::sdk_version`].
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn tasks_sdk_version() -> *const c_char {
    static VERSION: OnceLock<CString> = OnceLock::new();
    VERSION
        .get_or_init(|| CString::new(TasksPeer::sdk_version()).unwrap_or_default())
        .as_ptr()
}
