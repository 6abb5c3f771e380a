//! Logical clock stamped on every write to the store.

use crate::PeerId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A Lamport-style clock owned by one peer.
///
/// Clocks order by counter first and fall back to the peer id, which gives a
/// total order across writes from every peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalClock {
    pub peer_id: PeerId,
    pub counter: u64,
}

impl LogicalClock {
    /// Create a new clock for a peer, starting at counter 0.
    pub fn new(peer_id: impl Into<PeerId>) -> Self {
        Self {
            peer_id: peer_id.into(),
            counter: 0,
        }
    }

    /// Create a clock with a specific counter value.
    pub fn with_counter(peer_id: impl Into<PeerId>, counter: u64) -> Self {
        Self {
            peer_id: peer_id.into(),
            counter,
        }
    }

    /// Increment the clock and return the new value.
    pub fn tick(&mut self) -> &Self {
        self.counter += 1;
        self
    }

    /// Move this clock forward to at least `other`.
    pub fn merge(&mut self, other: &LogicalClock) {
        self.counter = self.counter.max(other.counter);
    }
}

impl Ord for LogicalClock {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.counter.cmp(&other.counter) {
            Ordering::Equal => self.peer_id.cmp(&other.peer_id),
            other => other,
        }
    }
}

impl PartialOrd for LogicalClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
