//! Sync configuration and bookkeeping.
//!
//! Replication itself is out of scope for the embedded engine: starting sync
//! flips a flag and subscriptions are recorded so callers can inspect what a
//! real peer would be asking the mesh for.

use crate::{
    dql::{parse, Statement},
    error::{Error, Result},
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Which peer-to-peer transports the peer may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerToPeerConfig {
    pub bluetooth_le: bool,
    pub lan: bool,
    pub awdl: bool,
    pub wifi_aware: bool,
}

impl Default for PeerToPeerConfig {
    fn default() -> Self {
        Self {
            bluetooth_le: true,
            lan: true,
            awdl: true,
            wifi_aware: true,
        }
    }
}

/// Servers the peer connects to directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectConfig {
    pub websocket_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    pub peer_to_peer: PeerToPeerConfig,
    pub connect: ConnectConfig,
}

impl TransportConfig {
    pub fn enable_all_peer_to_peer(&mut self) {
        self.peer_to_peer = PeerToPeerConfig::default();
    }

    /// True if any transport, peer-to-peer or server, is enabled.
    pub fn has_any_transport(&self) -> bool {
        let p2p = &self.peer_to_peer;
        p2p.bluetooth_le
            || p2p.lan
            || p2p.awdl
            || p2p.wifi_aware
            || !self.connect.websocket_urls.is_empty()
    }
}

/// How the peer authenticates with the sync service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Identity {
    #[serde(rename_all = "camelCase")]
    OnlinePlayground {
        app_id: String,
        token: String,
        enable_cloud_sync: bool,
        custom_auth_url: Option<String>,
    },
}

impl Identity {
    pub fn app_id(&self) -> &str {
        match self {
            Identity::OnlinePlayground { app_id, .. } => app_id,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Identity::OnlinePlayground { app_id, .. } if app_id.trim().is_empty() => Err(
                Error::InvalidIdentity("app_id must not be empty".into()),
            ),
            Identity::OnlinePlayground { .. } => Ok(()),
        }
    }
}

struct SubscriptionEntry {
    query: String,
    cancelled: AtomicBool,
}

/// Sync activity flag plus the set of live subscriptions.
#[derive(Default)]
pub(crate) struct SyncState {
    active: AtomicBool,
    subscriptions: DashMap<u64, Arc<SubscriptionEntry>>,
    next_id: AtomicU64,
}

impl SyncState {
    /// Returns true if sync was not already running.
    pub(crate) fn start(&self) -> bool {
        !self.active.swap(true, Ordering::SeqCst)
    }

    /// Returns true if sync was running.
    pub(crate) fn stop(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel_all(&self) {
        for entry in self.subscriptions.iter() {
            entry.value().cancelled.store(true, Ordering::SeqCst);
        }
        self.subscriptions.clear();
    }
}

/// Entry point for sync subscriptions, obtained from
/// [`Engine::sync`](crate::Engine::sync).
pub struct SyncHandle {
    state: Arc<SyncState>,
    closed: Arc<AtomicBool>,
}

impl SyncHandle {
    pub(crate) fn new(state: Arc<SyncState>, closed: Arc<AtomicBool>) -> Self {
        Self { state, closed }
    }

    /// Ask the mesh for every document matching `query`. Only `SELECT`
    /// statements can be subscribed to.
    pub fn register_subscription(&self, query: &str) -> Result<SyncSubscription> {
        self.register_subscription_with_args(query, &Value::Null)
    }

    pub fn register_subscription_with_args(
        &self,
        query: &str,
        args: &Value,
    ) -> Result<SyncSubscription> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        if !matches!(args, Value::Null | Value::Object(_)) {
            return Err(Error::InvalidArguments(
                "query arguments must be a JSON object".into(),
            ));
        }
        match parse(query)? {
            Statement::Select(_) => {}
            _ => {
                return Err(Error::InvalidArguments(
                    "only SELECT statements can be subscribed to".into(),
                ))
            }
        }

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = Arc::new(SubscriptionEntry {
            query: query.to_string(),
            cancelled: AtomicBool::new(false),
        });
        self.state.subscriptions.insert(id, entry.clone());
        tracing::info!(subscription_id = id, query = %query, "sync subscription registered");

        Ok(SyncSubscription {
            id,
            entry,
            state: Arc::downgrade(&self.state),
        })
    }

    /// Queries of every live subscription.
    pub fn subscriptions(&self) -> Vec<String> {
        self.state
            .subscriptions
            .iter()
            .map(|entry| entry.value().query.clone())
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.state.subscriptions.len()
    }
}

/// Handle to a sync subscription. Dropping it cancels the subscription.
pub struct SyncSubscription {
    id: u64,
    entry: Arc<SubscriptionEntry>,
    state: Weak<SyncState>,
}

impl SyncSubscription {
    pub fn query(&self) -> &str {
        &self.entry.query
    }

    pub fn cancel(&self) {
        if self.entry.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(state) = self.state.upgrade() {
            state.subscriptions.remove(&self.id);
            tracing::info!(subscription_id = self.id, "sync subscription cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.entry.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for SyncSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for SyncSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSubscription")
            .field("id", &self.id)
            .field("query", &self.entry.query)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
