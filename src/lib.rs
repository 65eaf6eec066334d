#![doc = include_str!("../README.md")]

mod common;
mod config;
mod error;
pub mod reprovider;
pub mod server;

pub use crate::common::{
    is_public, is_public_multiaddr, messages, ClosestNodes, KBucket, Message, MessageType,
    NameRecord, NodeId, PeerAddresses, PeerEntry, PeerId, Record, RoutingEntry, RoutingTable,
    DEFAULT_STALE_AFTER, ID_SIZE, IPNS_KEY_PREFIX, MAX_BUCKET_SIZE_K, MAX_DISTANCE,
};
pub use config::{
    Config, DEFAULT_PROVIDE_CONCURRENCY, DEFAULT_REPROVIDE_INTERVAL, MAX_PROVIDERS_PER_KEY,
    MAX_PROVIDER_KEYS, MAX_RECORDS,
};
pub use error::{Error, Result};
pub use reprovider::{DhtClient, LocalBlocks, PublishReport, ReprovideScheduler};
pub use server::{
    backends::{AddressBook, Blockstore, MemoryAddressBook, RecordValidator},
    providers::{MemoryProviderStore, ProviderStore},
    records::{MemoryRecordStore, RecordStore},
    DhtServer, DhtServerBuilder, Info, ReplySink,
};

pub use bytes::Bytes;
pub use multiaddr::Multiaddr;
