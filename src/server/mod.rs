//! Answering Kademlia requests from remote peers.

pub mod backends;
pub mod providers;
pub mod records;
mod stats;

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use futures::future::join_all;
use tracing::{debug, trace};

use crate::common::{
    AddProviderArguments, FindNodeArguments, GetProvidersArguments, GetValueArguments, Message,
    NameRecord, NodeId, PeerAddresses, PeerEntry, PeerId, PutValueArguments, Record,
    RoutingTable,
};
use crate::config::Config;
use crate::{Error, Result};

use backends::{AddressBook, Blockstore, RecordValidator};
use providers::{MemoryProviderStore, ProviderStore};
use records::{MemoryRecordStore, RecordStore};
use stats::Statistics;

pub use stats::Info;

/// Where replies to a single inbound request are written.
///
/// Usually the encoding half of the stream the request arrived on.
pub trait ReplySink {
    fn send(&mut self, reply: Message) -> std::io::Result<()>;
}

impl ReplySink for Vec<Message> {
    fn send(&mut self, reply: Message) -> std::io::Result<()> {
        self.push(reply);
        Ok(())
    }
}

#[derive(Debug)]
/// The Kademlia protocol responder.
///
/// Holds the routing table and answers PUT_VALUE, GET_VALUE, ADD_PROVIDER,
/// GET_PROVIDERS, FIND_NODE and PING requests. Safe to share between as many
/// stream handlers as the transport runs in parallel.
pub struct DhtServer {
    local_peer: PeerId,
    routing_table: RwLock<RoutingTable>,
    providers: Arc<dyn ProviderStore>,
    records: Arc<dyn RecordStore>,
    address_book: Arc<dyn AddressBook>,
    blocks: Arc<dyn Blockstore>,
    validator: Arc<dyn RecordValidator>,
    closest_peers: usize,
    /// Serializes the lookup-compare-store of PUT_VALUE.
    put_lock: Mutex<()>,
    stats: Statistics,
}

impl DhtServer {
    /// Start building a server for `local_peer` with its mandatory collaborators.
    pub fn builder(
        local_peer: PeerId,
        address_book: Arc<dyn AddressBook>,
        blocks: Arc<dyn Blockstore>,
        validator: Arc<dyn RecordValidator>,
    ) -> DhtServerBuilder {
        DhtServerBuilder {
            local_peer,
            address_book,
            blocks,
            validator,
            config: Config::default(),
            providers: None,
            records: None,
        }
    }

    // === Getters ===

    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    /// Counters about the requests handled so far.
    pub fn info(&self) -> Info {
        self.stats.snapshot()
    }

    /// Number of peers currently in the routing table.
    pub fn routing_table_size(&self) -> usize {
        self.table().size()
    }

    // === Routing table ===

    /// A connection we dialed succeeded, so `peer` is reachable: add or refresh it.
    pub fn add_outgoing_connection(&self, peer: PeerId) {
        let added = self.table_mut().touch(peer.clone());
        trace!(?peer, added, "Outgoing connection");
    }

    /// Inbound connections are never added to the routing table, anyone can dial us.
    pub fn add_incoming_connection(&self, peer: PeerId) {
        trace!(?peer, "Ignoring incoming connection for routing");
    }

    /// The `k` known peers closest to `key` that have at least one known address.
    pub async fn get_k_closest_peers(&self, key: &[u8], k: usize) -> Vec<PeerAddresses> {
        self.closest_with_addresses(key, k, None).await
    }

    // === Stores ===

    pub fn get_providers(&self, key: &[u8]) -> Vec<PeerEntry> {
        self.providers.get_providers(key)
    }

    /// Store a record unconditionally, for records we publish ourselves.
    pub fn add_record(&self, publisher: PeerId, record: NameRecord) {
        let _guard = self.put_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.records.put(publisher, record);
    }

    pub fn get_record(&self, publisher: &PeerId) -> Option<NameRecord> {
        self.records.get(publisher)
    }

    // === Requests ===

    /// Handle one decoded request from the authenticated `source` peer,
    /// writing any reply to `reply`.
    ///
    /// Invalid or stale records and unauthorized provider entries are dropped
    /// silently. Returns an error only for unknown message types, or if the
    /// reply could not be written; either way the stream should be reset.
    pub async fn handle<S: ReplySink + ?Sized>(
        &self,
        message: Message,
        source: &PeerId,
        reply: &mut S,
    ) -> Result<()> {
        self.stats.request(message.message_type(), message.encoded_len());

        match message {
            Message::PutValue(request) => self.handle_put_value(request, source, reply),
            Message::GetValue(request) => self.handle_get_value(request, source, reply).await,
            Message::AddProvider(request) => {
                self.handle_add_provider(request, source);
                Ok(())
            }
            Message::GetProviders(request) => {
                self.handle_get_providers(request, source, reply).await
            }
            Message::FindNode(request) => self.handle_find_node(request, source, reply).await,
            // Not used any more
            Message::Ping => Ok(()),
            Message::Unsupported(code) => {
                debug!(?source, code, "Unknown kademlia message type");
                Err(Error::UnsupportedMessageType(code))
            }
        }
    }

    fn handle_put_value<S: ReplySink + ?Sized>(
        &self,
        request: PutValueArguments,
        source: &PeerId,
        reply: &mut S,
    ) -> Result<()> {
        let Some((publisher, candidate)) = self.validator.parse_and_validate(&request) else {
            debug!(?source, request_type = "put_value", "Invalid name record");
            self.stats.record_rejected();
            return Ok(());
        };

        {
            let _guard = self.put_lock.lock().unwrap_or_else(PoisonError::into_inner);

            if let Some(existing) = self.records.get(&publisher) {
                if !candidate.is_newer_than(&existing) {
                    debug!(
                        ?source,
                        ?publisher,
                        sequence = candidate.sequence(),
                        stored = existing.sequence(),
                        "Name record is not newer than the stored one"
                    );
                    self.stats.record_rejected();
                    return Ok(());
                }
            }

            trace!(?source, ?publisher, sequence = candidate.sequence(), "Storing name record");
            self.records.put(publisher, candidate);
        }

        self.stats.record_stored();

        // Echo the request as acknowledgement.
        self.send(reply, Message::PutValue(request))
    }

    async fn handle_get_value<S: ReplySink + ?Sized>(
        &self,
        mut request: GetValueArguments,
        source: &PeerId,
        reply: &mut S,
    ) -> Result<()> {
        trace!(?source, request_type = "get_value", "Handling request");

        request.record = PeerId::from_ipns_key(&request.key)
            .and_then(|publisher| self.records.get(&publisher))
            .map(|record| Record {
                key: request.key.clone(),
                value: record.raw().clone(),
            });
        request.closer_peers = self.closer_peers(&request.key, None).await;

        self.send(reply, Message::GetValue(request))
    }

    fn handle_add_provider(&self, request: AddProviderArguments, source: &PeerId) {
        let AddProviderArguments {
            key,
            provider_peers,
        } = request;

        let (accepted, rejected): (Vec<PeerEntry>, Vec<PeerEntry>) = provider_peers
            .into_iter()
            .partition(|provider| &provider.peer == source);

        if !rejected.is_empty() {
            debug!(
                ?source,
                ?key,
                rejected = rejected.len(),
                request_type = "add_provider",
                "Ignoring providers other than the sender"
            );
            self.stats.providers_rejected(rejected.len() as u64);
        }

        self.stats.providers_added(accepted.len() as u64);

        for provider in accepted {
            self.providers.add_provider(&key, provider);
        }
    }

    async fn handle_get_providers<S: ReplySink + ?Sized>(
        &self,
        mut request: GetProvidersArguments,
        source: &PeerId,
        reply: &mut S,
    ) -> Result<()> {
        trace!(?source, key = ?request.key, request_type = "get_providers", "Handling request");

        let mut providers = self.providers.get_providers(&request.key);

        if self.blocks.has_any(&request.key).await {
            let addresses = self.address_book.addresses_of(&self.local_peer).await;

            providers.retain(|provider| provider.peer != self.local_peer);
            providers.push(PeerAddresses::new(self.local_peer.clone(), addresses).to_public_entry());
        }

        request.provider_peers = providers.into_iter().map(PeerEntry::retain_public).collect();
        request.closer_peers = self.closer_peers(&request.key, None).await;

        self.send(reply, Message::GetProviders(request))
    }

    async fn handle_find_node<S: ReplySink + ?Sized>(
        &self,
        mut request: FindNodeArguments,
        source: &PeerId,
        reply: &mut S,
    ) -> Result<()> {
        trace!(?source, request_type = "find_node", "Handling request");

        request.closer_peers = if &request.key[..] == self.local_peer.as_bytes() {
            // Peers query for us to check liveness, answer with ourselves but no addresses.
            vec![PeerEntry::without_addresses(self.local_peer.clone())]
        } else {
            self.closer_peers(&request.key, Some(source)).await
        };

        self.send(reply, Message::FindNode(request))
    }

    // === Private Methods ===

    fn send<S: ReplySink + ?Sized>(&self, reply: &mut S, message: Message) -> Result<()> {
        let kind = message.message_type();
        let size = message.encoded_len();

        reply.send(message)?;
        self.stats.reply(kind, size);

        Ok(())
    }

    /// Closer peers as they go on the wire.
    async fn closer_peers(&self, key: &[u8], exclude: Option<&PeerId>) -> Vec<PeerEntry> {
        self.closest_with_addresses(key, self.closest_peers, exclude)
            .await
            .iter()
            .map(PeerAddresses::to_public_entry)
            .collect()
    }

    async fn closest_with_addresses(
        &self,
        key: &[u8],
        k: usize,
        exclude: Option<&PeerId>,
    ) -> Vec<PeerAddresses> {
        let target = NodeId::hash_of(key);

        let closest = self.table().find_closest(&target, k, exclude);

        let resolved = join_all(closest.into_iter().map(|entry| async move {
            let addresses = self.address_book.addresses_of(entry.peer()).await;
            PeerAddresses::new(entry.peer().clone(), addresses)
        }))
        .await;

        resolved
            .into_iter()
            .filter(|peer| !peer.addresses.is_empty())
            .collect()
    }

    fn table(&self) -> RwLockReadGuard<'_, RoutingTable> {
        self.routing_table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn table_mut(&self) -> RwLockWriteGuard<'_, RoutingTable> {
        self.routing_table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for [DhtServer], see [DhtServer::builder].
pub struct DhtServerBuilder {
    local_peer: PeerId,
    address_book: Arc<dyn AddressBook>,
    blocks: Arc<dyn Blockstore>,
    validator: Arc<dyn RecordValidator>,
    config: Config,
    providers: Option<Arc<dyn ProviderStore>>,
    records: Option<Arc<dyn RecordStore>>,
}

impl DhtServerBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use a custom provider store instead of [MemoryProviderStore].
    pub fn providers(mut self, providers: Arc<dyn ProviderStore>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Use a custom record store instead of [MemoryRecordStore].
    pub fn records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn build(self) -> DhtServer {
        let config = self.config;
        let defaults = Config::default();

        let providers = self.providers.unwrap_or_else(|| {
            Arc::new(MemoryProviderStore::new(
                non_zero(config.max_provider_keys, defaults.max_provider_keys),
                non_zero(config.max_providers_per_key, defaults.max_providers_per_key),
            ))
        });
        let records = self.records.unwrap_or_else(|| {
            Arc::new(MemoryRecordStore::new(non_zero(
                config.max_records,
                defaults.max_records,
            )))
        });

        let routing_table =
            RoutingTable::new(self.local_peer.node_id()).with_stale_after(config.stale_after);

        DhtServer {
            local_peer: self.local_peer,
            routing_table: RwLock::new(routing_table),
            providers,
            records,
            address_book: self.address_book,
            blocks: self.blocks,
            validator: self.validator,
            closest_peers: config.closest_peers,
            put_lock: Mutex::new(()),
            stats: Statistics::default(),
        }
    }
}

fn non_zero(value: usize, default: usize) -> NonZeroUsize {
    NonZeroUsize::new(value)
        .or(NonZeroUsize::new(default))
        .unwrap_or(NonZeroUsize::MIN)
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, thread};

    use futures::future::{self, BoxFuture, FutureExt};

    use super::*;
    use crate::common::MAX_BUCKET_SIZE_K;
    use backends::MemoryAddressBook;

    #[derive(Debug)]
    struct Empty;

    impl Blockstore for Empty {
        fn has_any<'a>(&'a self, _key: &'a [u8]) -> BoxFuture<'a, bool> {
            future::ready(false).boxed()
        }
    }

    impl RecordValidator for Empty {
        fn parse_and_validate(&self, _request: &PutValueArguments) -> Option<(PeerId, NameRecord)> {
            None
        }
    }

    #[test]
    fn concurrent_connections_keep_buckets_bounded() {
        let server = DhtServer::builder(
            PeerId::random(),
            Arc::new(MemoryAddressBook::new()),
            Arc::new(Empty),
            Arc::new(Empty),
        )
        .build();

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        server.add_outgoing_connection(PeerId::random());
                    }
                });
            }

            for _ in 0..2 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let target = NodeId::random();
                        let closest = server.table().find_closest(&target, MAX_BUCKET_SIZE_K, None);
                        assert!(closest.len() <= MAX_BUCKET_SIZE_K);
                    }
                });
            }
        });

        let table = server.table();

        let mut buckets: HashMap<u16, usize> = HashMap::new();
        for entry in table.nodes() {
            *buckets.entry(table.id().distance(entry.id())).or_default() += 1;
        }

        assert!(buckets.values().all(|&size| size <= MAX_BUCKET_SIZE_K));
        assert_eq!(table.size(), table.nodes().count());
    }
}
