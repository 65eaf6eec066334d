//! Peer addresses, and which of them are worth telling a remote peer about.

use std::net::{Ipv4Addr, Ipv6Addr};

use multiaddr::{Multiaddr, Protocol};

use crate::common::{PeerEntry, PeerId};

#[derive(Debug, Clone, PartialEq, Eq)]
/// A peer and the addresses it may currently be reachable at.
pub struct PeerAddresses {
    pub peer: PeerId,
    pub addresses: Vec<Multiaddr>,
}

impl PeerAddresses {
    pub fn new(peer: PeerId, addresses: Vec<Multiaddr>) -> Self {
        Self { peer, addresses }
    }

    /// Wire form of this peer, keeping only publicly reachable addresses.
    pub fn to_public_entry(&self) -> PeerEntry {
        PeerEntry {
            peer: self.peer.clone(),
            addresses: self
                .addresses
                .iter()
                .filter(|addr| is_public_multiaddr(addr))
                .map(|addr| addr.to_vec().into())
                .collect(),
        }
    }

    /// Wire form of this peer with every address, unfiltered.
    pub fn to_entry(&self) -> PeerEntry {
        PeerEntry {
            peer: self.peer.clone(),
            addresses: self
                .addresses
                .iter()
                .map(|addr| addr.to_vec().into())
                .collect(),
        }
    }
}

/// Returns `true` if an encoded multiaddr is usable by a remote peer.
///
/// Bytes that don't decode as a multiaddr are not public.
pub fn is_public(address: &[u8]) -> bool {
    match Multiaddr::try_from(address.to_vec()) {
        Ok(addr) => is_public_multiaddr(&addr),
        Err(_) => false,
    }
}

/// Returns `true` unless the first IP component of `addr` is loopback,
/// site-local, link-local or unspecified.
///
/// An IPv6 zone is taken as public, addresses without any IP component are not.
pub fn is_public_multiaddr(addr: &Multiaddr) -> bool {
    for part in addr.iter() {
        match part {
            Protocol::Ip6zone(_) => return true,
            Protocol::Ip4(ip) => return is_public_ipv4(&ip),
            Protocol::Ip6(ip) => return is_public_ipv6(&ip),
            _ => {}
        }
    }

    false
}

fn is_public_ipv4(ip: &Ipv4Addr) -> bool {
    !(ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified())
}

fn is_public_ipv6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_public_ipv4(&v4);
    }

    let first = ip.segments()[0];
    // fec0::/10
    let site_local = first & 0xffc0 == 0xfec0;
    // fe80::/10
    let link_local = first & 0xffc0 == 0xfe80;

    !(ip.is_loopback() || site_local || link_local || ip.is_unspecified())
}
