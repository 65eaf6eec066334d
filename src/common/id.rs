//! Kademlia node Id, and the peer identities it is derived from.
use bytes::Bytes;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt::{self, Debug, Display, Formatter};

use crate::{Error, Result};

/// The size of node IDs in bytes.
pub const ID_SIZE: usize = 32;
/// Distance between two Ids that differ in their very first bit.
pub const MAX_DISTANCE: u16 = ID_SIZE as u16 * 8;

/// Prefix of keys that address name records in GET_VALUE / PUT_VALUE.
pub const IPNS_KEY_PREFIX: &[u8] = b"/ipns/";

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Kademlia node Id or a lookup target.
///
/// Only ever used as a position in the XOR metric space, never as a credential.
pub struct NodeId(pub [u8; ID_SIZE]);

impl NodeId {
    pub fn random() -> NodeId {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; ID_SIZE] = rng.gen();

        NodeId(random_bytes)
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE].
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<NodeId> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(Error::InvalidIdSize(bytes.len()));
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp.copy_from_slice(bytes);

        Ok(NodeId(tmp))
    }

    /// Position of arbitrary bytes (a peer identity or a content key) in the keyspace.
    pub fn hash_of(bytes: &[u8]) -> NodeId {
        NodeId(Sha256::digest(bytes).into())
    }

    /// Full XOR of two Ids, comparable as a big-endian integer.
    pub fn xor(&self, other: &NodeId) -> NodeId {
        let mut result = [0_u8; ID_SIZE];

        for (i, (a, b)) in self.0.iter().zip(other.0.iter()).enumerate() {
            result[i] = a ^ b;
        }

        NodeId(result)
    }

    /// Simplified XOR distance between this Id and a target Id.
    ///
    /// The distance is the number of trailing bits after the common prefix.
    ///
    /// Distance to self is 0
    /// Distance to the furthest Id is 256
    /// Distance to an Id with 5 leading matching bits is 251
    pub fn distance(&self, other: &NodeId) -> u16 {
        for i in 0..ID_SIZE {
            let a = self.0[i];
            let b = other.0[i];

            if a != b {
                let leading_zeros = i as u32 * 8 + (a ^ b).leading_zeros();

                return MAX_DISTANCE - leading_zeros as u16;
            }
        }

        0
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

impl From<[u8; ID_SIZE]> for NodeId {
    fn from(bytes: [u8; ID_SIZE]) -> Self {
        NodeId(bytes)
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Identity of a remote (or the local) peer: the multihash bytes of its public key.
///
/// The bytes are opaque to this crate; authenticity is established by the transport.
pub struct PeerId(Bytes);

impl PeerId {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        PeerId(bytes.into())
    }

    /// A random sha2-256 multihash shaped identity, useful for tests and simulations.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let digest: [u8; 32] = rng.gen();

        let mut bytes = Vec::with_capacity(34);
        bytes.extend_from_slice(&[0x12, 0x20]);
        bytes.extend_from_slice(&digest);

        PeerId(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }

    /// Position of this peer in the routing table keyspace.
    pub fn node_id(&self) -> NodeId {
        NodeId::hash_of(&self.0)
    }

    /// Extract the publisher from a `/ipns/<identity>` record key.
    pub fn from_ipns_key(key: &[u8]) -> Option<Self> {
        match key.strip_prefix(IPNS_KEY_PREFIX) {
            Some(rest) if !rest.is_empty() => Some(PeerId(Bytes::copy_from_slice(rest))),
            _ => None,
        }
    }

    /// The `/ipns/<identity>` key name records of this publisher are stored under.
    pub fn to_ipns_key(&self) -> Bytes {
        let mut key = Vec::with_capacity(IPNS_KEY_PREFIX.len() + self.0.len());
        key.extend_from_slice(IPNS_KEY_PREFIX);
        key.extend_from_slice(&self.0);

        key.into()
    }
}

impl Debug for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId(")?;
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

impl From<&[u8]> for PeerId {
    fn from(bytes: &[u8]) -> Self {
        PeerId(Bytes::copy_from_slice(bytes))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn distance_to_self() {
        let id = NodeId::random();
        let distance = id.distance(&id);
        assert_eq!(distance, 0)
    }

    #[test]
    fn distance_to_id() {
        let id = NodeId::from_bytes([0b1000_0000; ID_SIZE]).unwrap();
        let mut other = [0b1000_0000; ID_SIZE];
        other[0] = 0b1000_0100;
        let other = NodeId(other);

        assert_eq!(id.distance(&other), 251);
    }

    #[test]
    fn distance_to_furthest() {
        let id = NodeId::random();

        let mut opposite = [0_u8; ID_SIZE];
        for (i, &value) in id.as_bytes().iter().enumerate() {
            opposite[i] = value ^ 0xff;
        }

        let distance = id.distance(&NodeId(opposite));

        assert_eq!(distance, MAX_DISTANCE)
    }

    #[test]
    fn xor_orders_like_distance() {
        let target = NodeId([0; ID_SIZE]);

        let mut near = [0_u8; ID_SIZE];
        near[ID_SIZE - 1] = 1;
        let mut far = [0_u8; ID_SIZE];
        far[0] = 1;

        assert!(NodeId(near).xor(&target) < NodeId(far).xor(&target));
        assert!(NodeId(near).distance(&target) < NodeId(far).distance(&target));
    }

    #[test]
    fn from_bytes_rejects_wrong_size() {
        assert!(matches!(
            NodeId::from_bytes([0_u8; 20]),
            Err(Error::InvalidIdSize(20))
        ));
    }

    #[test]
    fn node_id_is_sha256_of_identity() {
        let peer = PeerId::new(&b"hello"[..]);

        assert_eq!(
            peer.node_id().to_string(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn ipns_key_roundtrip() {
        let peer = PeerId::random();

        let key = peer.to_ipns_key();

        assert!(key.starts_with(b"/ipns/"));
        assert_eq!(PeerId::from_ipns_key(&key), Some(peer));
        assert_eq!(PeerId::from_ipns_key(b"/ipfs/abc"), None);
        assert_eq!(PeerId::from_ipns_key(b"/ipns/"), None);
    }
}
