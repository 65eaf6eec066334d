//! Struct and implementation of the entry in the Kademlia routing table
use std::time::{Duration, Instant};

use crate::common::{NodeId, PeerId};

#[derive(Debug, Clone, PartialEq)]
/// Entry in a Kademlia k-bucket.
///
/// Holds only the identity; addresses live in the address book.
pub struct RoutingEntry {
    pub(crate) id: NodeId,
    pub(crate) peer: PeerId,
    pub(crate) last_seen: Instant,
}

impl RoutingEntry {
    /// Creates a new entry for a peer seen at `last_seen`.
    pub fn new(peer: PeerId, last_seen: Instant) -> RoutingEntry {
        RoutingEntry {
            id: peer.node_id(),
            peer,
            last_seen,
        }
    }

    // === Getters ===

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Returns `true` if this peer has not been contacted for longer than `stale_after`.
    pub fn is_stale(&self, now: Instant, stale_after: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > stale_after
    }
}
