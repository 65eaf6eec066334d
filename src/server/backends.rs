//! Capabilities the engine borrows from the rest of the node.

use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{PoisonError, RwLock},
};

use futures::future::{self, BoxFuture, FutureExt};
use multiaddr::Multiaddr;

use crate::common::{NameRecord, PeerId, PutValueArguments};

/// Knows where peers (including ourselves) can currently be reached.
pub trait AddressBook: Debug + Send + Sync {
    fn addresses_of<'a>(&'a self, peer: &'a PeerId) -> BoxFuture<'a, Vec<Multiaddr>>;
}

/// Local block storage.
pub trait Blockstore: Debug + Send + Sync {
    /// Resolves to `true` if a block with this content key is held locally.
    fn has_any<'a>(&'a self, key: &'a [u8]) -> BoxFuture<'a, bool>;
}

/// Parses and checks the signature of the name record carried by a PUT_VALUE.
pub trait RecordValidator: Debug + Send + Sync {
    /// Returns the publisher and the record, or `None` if the record is
    /// malformed or its signature doesn't verify.
    fn parse_and_validate(&self, request: &PutValueArguments) -> Option<(PeerId, NameRecord)>;
}

#[derive(Debug, Default)]
/// [AddressBook] backed by a map, filled in by whoever observes addresses.
pub struct MemoryAddressBook {
    addresses: RwLock<HashMap<PeerId, Vec<Multiaddr>>>,
}

impl MemoryAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the known addresses of `peer`.
    pub fn set_addresses(&self, peer: PeerId, addresses: Vec<Multiaddr>) {
        self.addresses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer, addresses);
    }

    pub fn forget(&self, peer: &PeerId) {
        self.addresses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peer);
    }
}

impl AddressBook for MemoryAddressBook {
    fn addresses_of<'a>(&'a self, peer: &'a PeerId) -> BoxFuture<'a, Vec<Multiaddr>> {
        let addresses = self
            .addresses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer)
            .cloned()
            .unwrap_or_default();

        future::ready(addresses).boxed()
    }
}

#[cfg(test)]
mod test {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn memory_address_book() {
        let book = MemoryAddressBook::new();
        let peer = PeerId::random();
        let addr: Multiaddr = "/ip4/1.1.1.1/tcp/4001".parse().unwrap();

        assert!(block_on(book.addresses_of(&peer)).is_empty());

        book.set_addresses(peer.clone(), vec![addr.clone()]);
        assert_eq!(block_on(book.addresses_of(&peer)), vec![addr]);

        book.forget(&peer);
        assert!(block_on(book.addresses_of(&peer)).is_empty());
    }
}
