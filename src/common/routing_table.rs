//! Simplified Kademlia routing table

use std::collections::BTreeMap;
use std::slice::Iter;
use std::time::{Duration, Instant};

use crate::common::{ClosestNodes, NodeId, PeerId, RoutingEntry};

/// K = the default maximum size of a k-bucket.
pub const MAX_BUCKET_SIZE_K: usize = 20;

/// The age of an entry's `last_seen` after which it may be replaced in a full bucket.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
/// Simplified Kademlia routing table.
///
/// Buckets are keyed by [NodeId::distance] from the local Id, so bucket `d`
/// holds the peers sharing exactly `256 - d` leading bits with us.
///
/// There is no way to remove a peer: entries only leave when a newcomer
/// replaces a stale one in a full bucket.
pub struct RoutingTable {
    id: NodeId,
    buckets: BTreeMap<u16, KBucket>,
    stale_after: Duration,
}

impl RoutingTable {
    /// Create a new [RoutingTable] with a given id.
    pub fn new(id: NodeId) -> Self {
        RoutingTable {
            id,
            buckets: BTreeMap::new(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    // === Options ===

    /// Set how long an entry must go without contact before a newcomer may evict it.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Returns the [NodeId] of this node, where the distance is measured from.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    // === Public Methods ===

    /// Record a successful contact with `peer`, and return `true` if it is now in the table.
    pub fn touch(&mut self, peer: PeerId) -> bool {
        self.touch_at(peer, Instant::now())
    }

    /// Same as [Self::touch] with an explicit observation time.
    pub fn touch_at(&mut self, peer: PeerId, now: Instant) -> bool {
        let entry = RoutingEntry::new(peer, now);
        let distance = self.id.distance(entry.id());

        if distance == 0 {
            // Do not add self to the routing_table
            return false;
        }

        let stale_after = self.stale_after;

        self.buckets
            .entry(distance)
            .or_default()
            .touch(entry, stale_after)
    }

    /// Return up to `k` entries sorted by ascending XOR distance to `target`,
    /// skipping `exclude` if it is known.
    pub fn find_closest(
        &self,
        target: &NodeId,
        k: usize,
        exclude: Option<&PeerId>,
    ) -> Vec<RoutingEntry> {
        let mut closest = ClosestNodes::new(*target);

        for node in self.nodes() {
            if Some(node.peer()) == exclude {
                continue;
            }
            closest.add(node.clone());
        }

        closest.truncate(k);
        closest.into_iter().collect()
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(|bucket| bucket.is_empty())
    }

    /// Return the number of entries in this routing table.
    pub fn size(&self) -> usize {
        self.buckets.values().map(KBucket::len).sum()
    }

    /// Returns an iterator over the entries in this routing table, nearest bucket first.
    pub fn nodes(&self) -> impl Iterator<Item = &RoutingEntry> {
        self.buckets.values().flat_map(KBucket::iter)
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        let distance = self.id.distance(&peer.node_id());

        self.buckets
            .get(&distance)
            .map(|bucket| bucket.contains(peer))
            .unwrap_or(false)
    }

    // === Private Methods ===

    #[cfg(test)]
    fn bucket(&self, distance: u16) -> Option<&KBucket> {
        self.buckets.get(&distance)
    }
}

/// Kbuckets are similar to LRU caches that evict stale entries,
/// without dropping any live entries in the process.
#[derive(Debug, Clone)]
pub struct KBucket {
    /// Entries in the k-bucket, sorted by the least recently seen.
    nodes: Vec<RoutingEntry>,
}

impl KBucket {
    pub fn new() -> Self {
        KBucket {
            nodes: Vec::with_capacity(MAX_BUCKET_SIZE_K),
        }
    }

    // === Public Methods ===

    /// Insert or refresh an entry, returns `false` if the bucket is full of live entries.
    pub fn touch(&mut self, incoming: RoutingEntry, stale_after: Duration) -> bool {
        if let Some(index) = self.nodes.iter().position(|n| n.peer == incoming.peer) {
            // Move to the most recently seen end.
            let mut existing = self.nodes.remove(index);
            existing.last_seen = existing.last_seen.max(incoming.last_seen);
            self.nodes.push(existing);

            true
        } else if self.nodes.len() < MAX_BUCKET_SIZE_K {
            self.nodes.push(incoming);

            true
        } else if self.nodes[0].is_stale(incoming.last_seen, stale_after) {
            // Remove the least recently seen entry and add the new one
            self.nodes.remove(0);
            self.nodes.push(incoming);

            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, RoutingEntry> {
        self.nodes.iter()
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.iter().any(|node| &node.peer == peer)
    }
}

impl Default for KBucket {
    fn default() -> Self {
        Self::new()
    }
}
