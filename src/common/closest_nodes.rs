use std::cmp::Ordering;
use std::vec::IntoIter;

use crate::common::{NodeId, RoutingEntry};

#[derive(Debug, Clone)]
/// Routing entries sorted by ascending XOR distance to a target.
///
/// Ties (only possible between distinct identities hashing to the same Id)
/// are broken by identity bytes, so results are reproducible.
pub struct ClosestNodes {
    target: NodeId,
    nodes: Vec<RoutingEntry>,
}

impl ClosestNodes {
    pub fn new(target: NodeId) -> Self {
        Self {
            target,
            nodes: Vec::new(),
        }
    }

    // === Getters ===

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn nodes(&self) -> &[RoutingEntry] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // === Public Methods ===

    /// Insert an entry at its sorted position, ignoring identities already present.
    pub fn add(&mut self, node: RoutingEntry) {
        let seek = node.id.xor(&self.target);

        if let Err(pos) = self.nodes.binary_search_by(|entry| {
            match entry.id.xor(&self.target).cmp(&seek) {
                Ordering::Equal => entry.peer.cmp(&node.peer),
                ordering => ordering,
            }
        }) {
            self.nodes.insert(pos, node)
        }
    }

    /// Keep only the first `k` entries.
    pub fn truncate(&mut self, k: usize) {
        self.nodes.truncate(k)
    }
}

impl IntoIterator for ClosestNodes {
    type Item = RoutingEntry;
    type IntoIter = IntoIter<RoutingEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl<'a> IntoIterator for &'a ClosestNodes {
    type Item = &'a RoutingEntry;
    type IntoIter = std::slice::Iter<'a, RoutingEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
