//! Snapshot types for persisting and restoring store state.
//!
//! Snapshots are the bridge between the in-memory [`Store`](crate::Store) and
//! the persistence directory. They use `BTreeMap` throughout so the same state
//! always serializes to the same bytes.

use crate::{
    error::{Error, Result},
    CollectionName, Document, DocumentId, LogicalClock, PeerId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// File name of the snapshot inside a persistence directory.
pub const SNAPSHOT_FILE_NAME: &str = "store.json";

/// A point-in-time snapshot of the store state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Peer that owns the store
    pub peer_id: PeerId,
    /// Current logical clock state
    pub clock: LogicalClock,
    /// All documents organized by collection, then by document id
    pub collections: BTreeMap<CollectionName, BTreeMap<DocumentId, Document>>,
    /// Values recorded by `ALTER SYSTEM SET`
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

impl StoreSnapshot {
    /// Create a new empty snapshot.
    pub fn new(peer_id: impl Into<PeerId>) -> Self {
        let peer_id = peer_id.into();
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            peer_id: peer_id.clone(),
            clock: LogicalClock::new(peer_id),
            collections: BTreeMap::new(),
            settings: BTreeMap::new(),
        }
    }

    /// Add a document to the snapshot.
    pub fn add_document(&mut self, collection: impl Into<CollectionName>, document: Document) {
        self.collections
            .entry(collection.into())
            .or_default()
            .insert(document.id.clone(), document);
    }

    /// Count documents across all collections.
    pub fn document_count(&self) -> usize {
        self.collections.values().map(|c| c.len()).sum()
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }

    /// Path of the snapshot file inside `dir`.
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(SNAPSHOT_FILE_NAME)
    }

    /// Load the snapshot stored in `dir`, if there is one.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = Self::path_in(dir);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Self::from_json(&json).map(Some)
    }

    /// Write the snapshot into `dir`, replacing any previous one.
    ///
    /// The file is written next to its final location and renamed into place,
    /// so readers never observe a half-written snapshot.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let json = self.to_json_pretty()?;
        let path = Self::path_in(dir);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
