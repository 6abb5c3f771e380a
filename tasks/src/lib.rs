//! # Quickstart Tasks
//!
//! A shared to-do list on top of the quickstart sync engine.
//!
//! [`TasksPeer`] owns one engine and exposes create, read, update,
//! soft-delete and evict operations on the `tasks` collection, plus live
//! observation of the non-deleted tasks as a callback or a
//! [`futures::Stream`]. The [`ffi`] module exposes the same surface over a
//! C ABI for managed hosts.
//!
//! ## Quick Start
//!
//! ```rust
//! use quickstart_tasks::{PeerConfig, TasksPeer};
//!
//! let peer = TasksPeer::new(PeerConfig::new("my-app-id", "my-token")).unwrap();
//!
//! let id = peer.add_task("Buy milk", false).unwrap();
//! peer.mark_task_complete(&id, true).unwrap();
//!
//! let tasks = peer.get_tasks(false).unwrap();
//! assert_eq!(tasks.len(), 1);
//! assert!(tasks[0].done);
//!
//! peer.delete_task(&id).unwrap();
//! assert!(peer.get_tasks(false).unwrap().is_empty());
//! ```

pub mod config;
pub mod dql;
pub mod error;
pub mod ffi;
pub mod log;
pub mod peer;
pub mod task;

pub use config::{ConfigError, PeerConfig, TransportToggles};
pub use error::{IdLookup, Result, TasksError};
pub use log::{LogConfig, LogLevel};
pub use peer::{TasksObserver, TasksPeer, TasksStream, TASKS_COLLECTION};
pub use task::Task;
