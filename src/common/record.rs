//! Helper functions and structs for name (IPNS) records.

use std::cmp::Ordering;
use std::time::SystemTime;

use bytes::Bytes;

#[derive(Clone, Debug, PartialEq, Eq)]
/// A validated, signed name record as published by its key holder.
///
/// The signature has already been checked by a
/// [RecordValidator](crate::RecordValidator); only the fields needed to
/// order competing records are exposed.
pub struct NameRecord {
    /// The record exactly as received, served back verbatim on GET_VALUE.
    raw: Bytes,
    /// Monotonically increasing sequence number chosen by the publisher.
    sequence: u64,
    /// End of the record's validity window.
    validity: SystemTime,
}

impl NameRecord {
    pub fn new(raw: impl Into<Bytes>, sequence: u64, validity: SystemTime) -> Self {
        Self {
            raw: raw.into(),
            sequence,
            validity,
        }
    }

    // === Getters ===

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn validity(&self) -> SystemTime {
        self.validity
    }

    // === Public Methods ===

    /// Orders records by freshness: the higher sequence number wins,
    /// on equal sequence numbers the later validity wins.
    pub fn freshness_cmp(&self, other: &NameRecord) -> Ordering {
        self.sequence
            .cmp(&other.sequence)
            .then_with(|| self.validity.cmp(&other.validity))
    }

    /// Returns `true` if this record should replace `other`.
    pub fn is_newer_than(&self, other: &NameRecord) -> bool {
        self.freshness_cmp(other) == Ordering::Greater
    }
}
