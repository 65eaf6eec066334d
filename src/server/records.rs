//! Name records store.

use std::{
    fmt::Debug,
    num::NonZeroUsize,
    sync::{Mutex, PoisonError},
};

use lru::LruCache;

use crate::common::{NameRecord, PeerId};

/// Storage of the latest name record per publisher.
///
/// `put` overwrites unconditionally, deciding whether a record is newer is
/// the engine's job. Implementations must be safe to call concurrently.
pub trait RecordStore: Debug + Send + Sync {
    fn get(&self, publisher: &PeerId) -> Option<NameRecord>;

    fn put(&self, publisher: PeerId, record: NameRecord);
}

#[derive(Debug)]
/// Bounded in-memory [RecordStore], evicting the least recently used publisher.
pub struct MemoryRecordStore {
    records: Mutex<LruCache<PeerId, NameRecord>>,
}

impl MemoryRecordStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            records: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, publisher: &PeerId) -> Option<NameRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(publisher)
            .cloned()
    }

    fn put(&self, publisher: PeerId, record: NameRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(publisher, record);
    }
}
