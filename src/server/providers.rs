//! Manage announced providers for content keys

use std::{
    fmt::Debug,
    num::NonZeroUsize,
    sync::{Mutex, PoisonError},
};

use bytes::Bytes;
use lru::LruCache;

use crate::common::{PeerEntry, PeerId};

/// Storage of provider records.
///
/// Implementations must be safe to call from many request handlers at once.
/// The engine only ever merges into it, expiry and capacity are up to the store.
pub trait ProviderStore: Debug + Send + Sync {
    /// Merge `provider` into the providers of `key`, replacing any
    /// previous entry for the same peer.
    fn add_provider(&self, key: &[u8], provider: PeerEntry);

    /// Providers known for `key`, at most one entry per peer.
    fn get_providers(&self, key: &[u8]) -> Vec<PeerEntry>;
}

#[derive(Debug)]
/// An LRU cache of providers per content key.
pub struct MemoryProviderStore {
    keys: Mutex<LruCache<Bytes, LruCache<PeerId, Vec<Bytes>>>>,
    max_providers: NonZeroUsize,
}

impl MemoryProviderStore {
    pub fn new(max_keys: NonZeroUsize, max_providers: NonZeroUsize) -> Self {
        Self {
            keys: Mutex::new(LruCache::new(max_keys)),
            max_providers,
        }
    }

    /// Number of content keys with at least one provider.
    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProviderStore for MemoryProviderStore {
    fn add_provider(&self, key: &[u8], provider: PeerEntry) {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(providers) = keys.get_mut(key) {
            providers.put(provider.peer, provider.addresses);
        } else {
            let mut providers = LruCache::new(self.max_providers);
            providers.put(provider.peer, provider.addresses);
            keys.put(Bytes::copy_from_slice(key), providers);
        };
    }

    fn get_providers(&self, key: &[u8]) -> Vec<PeerEntry> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);

        match keys.get(key) {
            Some(providers) => providers
                .iter()
                .map(|(peer, addresses)| PeerEntry::new(peer.clone(), addresses.clone()))
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn store(max_keys: usize, max_providers: usize) -> MemoryProviderStore {
        MemoryProviderStore::new(
            NonZeroUsize::new(max_keys).unwrap(),
            NonZeroUsize::new(max_providers).unwrap(),
        )
    }

    #[test]
    fn dedup_by_peer() {
        let store = store(10, 10);

        let peer = PeerId::random();

        store.add_provider(b"a", PeerEntry::new(peer.clone(), vec![Bytes::from_static(b"1")]));
        store.add_provider(b"a", PeerEntry::new(peer.clone(), vec![Bytes::from_static(b"2")]));

        let providers = store.get_providers(b"a");

        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].peer, peer);
        assert_eq!(providers[0].addresses, vec![Bytes::from_static(b"2")]);
    }

    #[test]
    fn keys_are_independent() {
        let store = store(10, 10);

        store.add_provider(b"a", PeerEntry::without_addresses(PeerId::random()));
        store.add_provider(b"a", PeerEntry::without_addresses(PeerId::random()));
        store.add_provider(b"b", PeerEntry::without_addresses(PeerId::random()));

        assert_eq!(store.get_providers(b"a").len(), 2);
        assert_eq!(store.get_providers(b"b").len(), 1);
        assert!(store.get_providers(b"c").is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn max_providers_per_key() {
        let store = store(10, 2);

        let peers: Vec<PeerId> = (0..3).map(|_| PeerId::random()).collect();

        for peer in &peers {
            store.add_provider(b"a", PeerEntry::without_addresses(peer.clone()));
        }

        let providers: Vec<PeerId> = store
            .get_providers(b"a")
            .into_iter()
            .map(|entry| entry.peer)
            .collect();

        assert_eq!(providers.len(), 2);
        assert!(!providers.contains(&peers[0]));
    }

    #[test]
    fn max_keys() {
        let store = store(2, 10);

        store.add_provider(b"a", PeerEntry::without_addresses(PeerId::random()));
        store.add_provider(b"b", PeerEntry::without_addresses(PeerId::random()));
        store.add_provider(b"c", PeerEntry::without_addresses(PeerId::random()));

        assert!(store.get_providers(b"a").is_empty());
        assert_eq!(store.len(), 2);
    }
}
