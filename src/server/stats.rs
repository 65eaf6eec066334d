//! Counters about the requests served by a [DhtServer](crate::DhtServer).
//!
//! Byte counts are protobuf encoded sizes, see [Message::encoded_len](crate::Message::encoded_len).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::MessageType;

#[derive(Debug, Default)]
pub(crate) struct Statistics {
    requests: [AtomicU64; 6],
    unsupported: AtomicU64,
    replies: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_sent_per_kind: [AtomicU64; 6],
    records_stored: AtomicU64,
    records_rejected: AtomicU64,
    providers_added: AtomicU64,
    providers_rejected: AtomicU64,
}

impl Statistics {
    pub fn request(&self, kind: Option<MessageType>, size: usize) {
        self.bytes_received.fetch_add(size as u64, Ordering::Relaxed);

        match kind {
            Some(kind) => self.requests[index(kind)].fetch_add(1, Ordering::Relaxed),
            None => self.unsupported.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn reply(&self, kind: Option<MessageType>, size: usize) {
        self.replies.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(size as u64, Ordering::Relaxed);

        if let Some(kind) = kind {
            self.bytes_sent_per_kind[index(kind)].fetch_add(size as u64, Ordering::Relaxed);
        }
    }

    pub fn record_stored(&self) {
        self.records_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.records_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn providers_added(&self, count: u64) {
        self.providers_added.fetch_add(count, Ordering::Relaxed);
    }

    pub fn providers_rejected(&self, count: u64) {
        self.providers_rejected.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Info {
        Info {
            requests: load_all(&self.requests),
            unsupported: self.unsupported.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_sent_per_kind: load_all(&self.bytes_sent_per_kind),
            records_stored: self.records_stored.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            providers_added: self.providers_added.load(Ordering::Relaxed),
            providers_rejected: self.providers_rejected.load(Ordering::Relaxed),
        }
    }
}

fn load_all(counters: &[AtomicU64; 6]) -> [u64; 6] {
    let mut values = [0; 6];
    for (value, counter) in values.iter_mut().zip(counters.iter()) {
        *value = counter.load(Ordering::Relaxed);
    }
    values
}

fn index(kind: MessageType) -> usize {
    match kind {
        MessageType::PutValue => 0,
        MessageType::GetValue => 1,
        MessageType::AddProvider => 2,
        MessageType::GetProviders => 3,
        MessageType::FindNode => 4,
        MessageType::Ping => 5,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Point in time view of the server's counters.
pub struct Info {
    requests: [u64; 6],
    unsupported: u64,
    replies: u64,
    bytes_received: u64,
    bytes_sent: u64,
    bytes_sent_per_kind: [u64; 6],
    records_stored: u64,
    records_rejected: u64,
    providers_added: u64,
    providers_rejected: u64,
}

impl Info {
    /// Requests of this kind handled so far.
    pub fn requests(&self, kind: MessageType) -> u64 {
        self.requests[index(kind)]
    }

    /// Requests rejected for carrying an unknown type.
    pub fn unsupported(&self) -> u64 {
        self.unsupported
    }

    /// Replies written to reply sinks.
    pub fn replies(&self) -> u64 {
        self.replies
    }

    /// Encoded size of every request handled, unknown kinds included.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Encoded size of every reply written.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Encoded size of the replies written to requests of this kind.
    pub fn bytes_sent_for(&self, kind: MessageType) -> u64 {
        self.bytes_sent_per_kind[index(kind)]
    }

    /// PUT_VALUE records accepted into the record store.
    pub fn records_stored(&self) -> u64 {
        self.records_stored
    }

    /// PUT_VALUE records dropped as invalid or stale.
    pub fn records_rejected(&self) -> u64 {
        self.records_rejected
    }

    pub fn providers_added(&self) -> u64 {
        self.providers_added
    }

    /// ADD_PROVIDER entries claiming a peer other than the sender.
    pub fn providers_rejected(&self) -> u64 {
        self.providers_rejected
    }
}
