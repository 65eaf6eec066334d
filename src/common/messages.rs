//! Structured Kademlia wire messages.
//!
//! Decoding from and encoding to protobuf frames is the transport's job;
//! the engine only ever sees these already decoded values, but knows their
//! encoded size for traffic accounting.

use bytes::Bytes;

use crate::common::{is_public, PeerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Request kinds known to this node, with their protocol numbers.
pub enum MessageType {
    PutValue,
    GetValue,
    AddProvider,
    GetProviders,
    FindNode,
    Ping,
}

impl MessageType {
    pub const ALL: [MessageType; 6] = [
        MessageType::PutValue,
        MessageType::GetValue,
        MessageType::AddProvider,
        MessageType::GetProviders,
        MessageType::FindNode,
        MessageType::Ping,
    ];

    /// Numeric value of this kind on the wire.
    pub fn code(&self) -> i32 {
        match self {
            MessageType::PutValue => 0,
            MessageType::GetValue => 1,
            MessageType::AddProvider => 2,
            MessageType::GetProviders => 3,
            MessageType::FindNode => 4,
            MessageType::Ping => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<MessageType> {
        MessageType::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MessageType::PutValue => "put_value",
            MessageType::GetValue => "get_value",
            MessageType::AddProvider => "add_provider",
            MessageType::GetProviders => "get_providers",
            MessageType::FindNode => "find_node",
            MessageType::Ping => "ping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// A peer as placed in `closerPeers` or `providerPeers`.
pub struct PeerEntry {
    pub peer: PeerId,
    /// Encoded multiaddrs.
    pub addresses: Vec<Bytes>,
}

impl PeerEntry {
    pub fn new(peer: PeerId, addresses: Vec<Bytes>) -> Self {
        Self { peer, addresses }
    }

    /// An entry that says nothing about where the peer can be reached.
    pub fn without_addresses(peer: PeerId) -> Self {
        Self {
            peer,
            addresses: Vec::new(),
        }
    }

    /// Size of this entry encoded as a protobuf `Message.Peer`.
    pub fn encoded_len(&self) -> usize {
        bytes_field_len(self.peer.as_bytes().len())
            + self
                .addresses
                .iter()
                .map(|addr| nested_field_len(addr.len()))
                .sum::<usize>()
    }

    /// Drop every address a remote peer couldn't use.
    pub fn retain_public(mut self) -> Self {
        self.addresses.retain(|addr| is_public(addr));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Bytes,
    pub value: Bytes,
}

impl Record {
    /// Size of this record encoded as a protobuf `Record`.
    pub fn encoded_len(&self) -> usize {
        bytes_field_len(self.key.len()) + bytes_field_len(self.value.len())
    }
}

// === PUT_VALUE ===
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutValueArguments {
    pub key: Bytes,
    pub record: Record,
}

// === GET_VALUE ===
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetValueArguments {
    pub key: Bytes,
    pub record: Option<Record>,
    pub closer_peers: Vec<PeerEntry>,
}

// === ADD_PROVIDER ===
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddProviderArguments {
    pub key: Bytes,
    pub provider_peers: Vec<PeerEntry>,
}

// === GET_PROVIDERS ===
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetProvidersArguments {
    pub key: Bytes,
    pub provider_peers: Vec<PeerEntry>,
    pub closer_peers: Vec<PeerEntry>,
}

// === FIND_NODE ===
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindNodeArguments {
    pub key: Bytes,
    pub closer_peers: Vec<PeerEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A Kademlia request, or the reply populated from it.
pub enum Message {
    PutValue(PutValueArguments),
    GetValue(GetValueArguments),
    AddProvider(AddProviderArguments),
    GetProviders(GetProvidersArguments),
    FindNode(FindNodeArguments),
    /// Obsolete, kept so older peers don't get their streams reset.
    Ping,
    /// A message type code the decoder didn't recognise.
    Unsupported(i32),
}

impl Message {
    pub fn put_value(key: impl Into<Bytes>, record: Record) -> Self {
        Message::PutValue(PutValueArguments {
            key: key.into(),
            record,
        })
    }

    pub fn get_value(key: impl Into<Bytes>) -> Self {
        Message::GetValue(GetValueArguments {
            key: key.into(),
            record: None,
            closer_peers: Vec::new(),
        })
    }

    pub fn add_provider(key: impl Into<Bytes>, provider_peers: Vec<PeerEntry>) -> Self {
        Message::AddProvider(AddProviderArguments {
            key: key.into(),
            provider_peers,
        })
    }

    pub fn get_providers(key: impl Into<Bytes>) -> Self {
        Message::GetProviders(GetProvidersArguments {
            key: key.into(),
            provider_peers: Vec::new(),
            closer_peers: Vec::new(),
        })
    }

    pub fn find_node(key: impl Into<Bytes>) -> Self {
        Message::FindNode(FindNodeArguments {
            key: key.into(),
            closer_peers: Vec::new(),
        })
    }

    // === Getters ===

    /// Size of this message encoded as the Kademlia protobuf `Message`,
    /// without the length prefix of the frame.
    pub fn encoded_len(&self) -> usize {
        let none: &[PeerEntry] = &[];

        let (key, record, closer_peers, provider_peers) = match self {
            Message::PutValue(args) => (&args.key[..], Some(&args.record), none, none),
            Message::GetValue(args) => (
                &args.key[..],
                args.record.as_ref(),
                &args.closer_peers[..],
                none,
            ),
            Message::AddProvider(args) => (&args.key[..], None, none, &args.provider_peers[..]),
            Message::GetProviders(args) => (
                &args.key[..],
                None,
                &args.closer_peers[..],
                &args.provider_peers[..],
            ),
            Message::FindNode(args) => (&args.key[..], None, &args.closer_peers[..], none),
            Message::Ping | Message::Unsupported(_) => (&[][..], None, none, none),
        };

        let code = self.type_code();
        // proto3 leaves default values out.
        let type_len = if code == 0 {
            0
        } else {
            1 + varint_len(code as i64 as u64)
        };

        type_len
            + bytes_field_len(key.len())
            + record.map_or(0, |record| nested_field_len(record.encoded_len()))
            + closer_peers
                .iter()
                .chain(provider_peers)
                .map(|peer| nested_field_len(peer.encoded_len()))
                .sum::<usize>()
    }

    /// The kind of this message, `None` for [Message::Unsupported].
    pub fn message_type(&self) -> Option<MessageType> {
        match self {
            Message::PutValue(_) => Some(MessageType::PutValue),
            Message::GetValue(_) => Some(MessageType::GetValue),
            Message::AddProvider(_) => Some(MessageType::AddProvider),
            Message::GetProviders(_) => Some(MessageType::GetProviders),
            Message::FindNode(_) => Some(MessageType::FindNode),
            Message::Ping => Some(MessageType::Ping),
            Message::Unsupported(_) => None,
        }
    }

    /// Numeric type code, as it was (or will be) on the wire.
    pub fn type_code(&self) -> i32 {
        match self {
            Message::Unsupported(code) => *code,
            other => other.message_type().map(|kind| kind.code()).unwrap_or(-1),
        }
    }

    pub fn key(&self) -> Option<&Bytes> {
        match self {
            Message::PutValue(PutValueArguments { key, .. })
            | Message::GetValue(GetValueArguments { key, .. })
            | Message::AddProvider(AddProviderArguments { key, .. })
            | Message::GetProviders(GetProvidersArguments { key, .. })
            | Message::FindNode(FindNodeArguments { key, .. }) => Some(key),
            Message::Ping | Message::Unsupported(_) => None,
        }
    }

    /// Peers listed in `closerPeers`, empty for kinds without that field.
    pub fn closer_peers(&self) -> &[PeerEntry] {
        match self {
            Message::GetValue(GetValueArguments { closer_peers, .. })
            | Message::GetProviders(GetProvidersArguments { closer_peers, .. })
            | Message::FindNode(FindNodeArguments { closer_peers, .. }) => closer_peers,
            _ => &[],
        }
    }

    /// Peers listed in `providerPeers`, empty for kinds without that field.
    pub fn provider_peers(&self) -> &[PeerEntry] {
        match self {
            Message::AddProvider(AddProviderArguments { provider_peers, .. })
            | Message::GetProviders(GetProvidersArguments { provider_peers, .. }) => {
                provider_peers
            }
            _ => &[],
        }
    }
}

// === Protobuf sizes ===
// Every field number used here is below 16, so each field key takes one byte.

fn varint_len(value: u64) -> usize {
    (64 - (value | 1).leading_zeros() as usize).div_ceil(7)
}

/// A singular `bytes` field, omitted when empty.
fn bytes_field_len(len: usize) -> usize {
    if len == 0 {
        0
    } else {
        nested_field_len(len)
    }
}

/// A length-delimited field that is always written: embedded messages and repeated entries.
fn nested_field_len(len: usize) -> usize {
    1 + varint_len(len as u64) + len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes() {
        for kind in MessageType::ALL {
            assert_eq!(MessageType::from_code(kind.code()), Some(kind));
        }
        assert_eq!(MessageType::from_code(6), None);
        assert_eq!(MessageType::FindNode.code(), 4);
        assert_eq!(Message::Unsupported(42).type_code(), 42);
        assert_eq!(Message::find_node(&b"k"[..]).type_code(), 4);
    }

    #[test]
    fn accessors() {
        let provider = PeerEntry::without_addresses(PeerId::random());
        let message = Message::add_provider(&b"key"[..], vec![provider.clone()]);

        assert_eq!(message.key().map(|k| &k[..]), Some(&b"key"[..]));
        assert_eq!(message.provider_peers(), &[provider]);
        assert!(message.closer_peers().is_empty());
        assert_eq!(Message::Ping.key(), None);
    }

    #[test]
    fn retain_public() {
        let private: multiaddr::Multiaddr = "/ip4/192.168.0.2/tcp/1".parse().unwrap();
        let public: multiaddr::Multiaddr = "/ip4/9.9.9.9/tcp/1".parse().unwrap();

        let entry = PeerEntry::new(
            PeerId::random(),
            vec![
                private.to_vec().into(),
                public.to_vec().into(),
                Bytes::from_static(&[0xff]),
            ],
        )
        .retain_public();

        assert_eq!(entry.addresses, vec![Bytes::from(public.to_vec())]);
    }

    #[test]
    fn encoded_sizes() {
        // type = 5
        assert_eq!(Message::Ping.encoded_len(), 2);
        // type = 4, key = "abc"
        assert_eq!(Message::find_node(&b"abc"[..]).encoded_len(), 2 + 5);
        // PUT_VALUE is type 0 and left out, record { key = "k", value = "v" }
        let put = Message::put_value(
            &b"k"[..],
            Record {
                key: Bytes::from_static(b"k"),
                value: Bytes::from_static(b"v"),
            },
        );
        assert_eq!(put.encoded_len(), 3 + 2 + 6);
        // Negative enum values take ten bytes.
        assert_eq!(Message::Unsupported(-1).encoded_len(), 11);

        let provider = PeerEntry::new(
            PeerId::new(&b"id"[..]),
            vec![Bytes::from_static(b"abc")],
        );
        assert_eq!(provider.encoded_len(), 4 + 5);

        let mut reply = Message::get_providers(&b"k"[..]);
        if let Message::GetProviders(args) = &mut reply {
            args.provider_peers.push(provider.clone());
            args.closer_peers.push(provider);
        }
        assert_eq!(reply.encoded_len(), 2 + 3 + 2 * (2 + 9));
    }

    #[test]
    fn long_fields_use_multi_byte_lengths() {
        let key = Bytes::from(vec![0_u8; 200]);

        // 200 needs a two byte varint.
        assert_eq!(Message::get_value(key).encoded_len(), 2 + 1 + 2 + 200);
    }
}
