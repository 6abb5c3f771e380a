//! # Quickstart Engine
//!
//! An embedded, single-process stand-in for a peer-to-peer sync database.
//!
//! The engine keeps schemaless JSON documents in named collections and
//! executes a small SQL-like query language (DQL) against them. Live
//! observers are notified with fresh results after every write, and the whole
//! store can be persisted to a directory as a deterministic JSON snapshot.
//!
//! Replication is not implemented: starting sync and registering
//! subscriptions are tracked as state so that applications can be built and
//! tested against the same API a networked peer offers.
//!
//! ## Core Concepts
//!
//! ### Documents
//!
//! A [`Document`] is a JSON object with a reserved, immutable `_id` field.
//! Ids are generated on insert unless the inserted object supplies one.
//!
//! ### Statements
//!
//! The [`dql`] module parses `SELECT`, `INSERT`, `UPDATE`, `EVICT` and
//! `ALTER SYSTEM` statements. Named `:placeholders` are bound from a JSON
//! object of arguments.
//!
//! ### Observers and subscriptions
//!
//! [`StoreHandle::register_observer`] delivers the full result of a `SELECT`
//! now and after each change. [`SyncHandle::register_subscription`] records
//! which documents the peer wants from the mesh.
//!
//! ## Quick Start
//!
//! ```rust
//! use quickstart_engine::{Engine, EngineConfig, Identity};
//! use serde_json::json;
//!
//! let engine = Engine::open(EngineConfig::new(Identity::OnlinePlayground {
//!     app_id: "my-app".into(),
//!     token: "playground-token".into(),
//!     enable_cloud_sync: false,
//!     custom_auth_url: None,
//! }))
//! .unwrap();
//!
//! let inserted = engine
//!     .store()
//!     .execute_with_args(
//!         "INSERT INTO tasks DOCUMENTS (:task)",
//!         &json!({"task": {"title": "Buy milk", "done": false}}),
//!     )
//!     .unwrap();
//! assert_eq!(inserted.mutated_document_ids.len(), 1);
//!
//! let open = engine
//!     .store()
//!     .execute("SELECT * FROM tasks WHERE NOT done ORDER BY _id")
//!     .unwrap();
//! assert_eq!(open.item_count(), 1);
//! assert_eq!(open.items[0].value()["title"], json!("Buy milk"));
//! ```
//!
//! ## Persistence
//!
//! Set [`EngineConfig::persistence_dir`] to keep a [`StoreSnapshot`] in
//! `<dir>/store.json`. It is loaded on open and rewritten after every write.

pub mod clock;
pub mod document;
pub mod dql;
pub mod engine;
pub mod error;
pub mod observer;
pub mod result;
pub mod snapshot;
pub mod store;
pub mod sync;

// Re-export main types at crate root
pub use clock::LogicalClock;
pub use document::{new_document_id, Document, Metadata, ID_FIELD};
pub use engine::{Engine, EngineConfig, StoreHandle};
pub use error::{Error, Result};
pub use observer::{ObserverCallback, ObserverRegistry, StoreObserver};
pub use result::{QueryResult, QueryResultItem};
pub use snapshot::{StoreSnapshot, SNAPSHOT_FILE_NAME, SNAPSHOT_FORMAT_VERSION};
pub use store::{Collection, Store, QUERY_RESULT_CAP};
pub use sync::{
    ConnectConfig, Identity, PeerToPeerConfig, SyncHandle, SyncSubscription, TransportConfig,
};

/// Type aliases for clarity
pub type DocumentId = String;
pub type CollectionName = String;
pub type PeerId = String;
pub type Timestamp = u64;
