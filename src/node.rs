//! Node identity
//!
//! A replica is identified on the wire by the raw bytes of its host
//! address: 4 bytes for IPv4, 16 for IPv6. The id length is a process-wide
//! constant established once at startup from the local address; every
//! counter context in a running process uses that length.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

use bytes::Bytes;

/// Opaque fixed-length replica identifier (raw address bytes).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Bytes);

impl NodeId {
    /// Wrap raw address bytes.
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// The raw id bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Id length in bytes (4 for IPv4, 16 for IPv6).
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True only for a zero-length id, which no valid address produces.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode back to an address, when the byte length permits.
    pub fn to_ip_addr(&self) -> Option<IpAddr> {
        match self.0.len() {
            4 => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(&self.0);
                Some(IpAddr::V4(Ipv4Addr::from(octets)))
            }
            16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&self.0);
                Some(IpAddr::V6(Ipv6Addr::from(octets)))
            }
            _ => None,
        }
    }
}

impl From<IpAddr> for NodeId {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => Self(Bytes::copy_from_slice(&v4.octets())),
            IpAddr::V6(v6) => Self(Bytes::copy_from_slice(&v6.octets())),
        }
    }
}

impl From<Ipv4Addr> for NodeId {
    fn from(addr: Ipv4Addr) -> Self {
        Self(Bytes::copy_from_slice(&addr.octets()))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_ip_addr() {
            Some(addr) => write!(f, "{addr}"),
            None => write!(f, "?.?.?.?"),
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

static LOCAL_NODE: OnceLock<NodeId> = OnceLock::new();

/// Establish the local node identity from `addr`.
///
/// One-shot: the first call wins and later calls are no-ops that return
/// the cached id. Must run before any counter context operation that
/// consults the local identity.
pub fn init_local_node(addr: IpAddr) -> &'static NodeId {
    LOCAL_NODE.get_or_init(|| NodeId::from(addr))
}

/// The cached local node identity.
///
/// Falls back to 127.0.0.1 when [`init_local_node`] has not run, matching
/// a resolve-at-startup loopback deployment.
pub fn local_node_id() -> &'static NodeId {
    LOCAL_NODE.get_or_init(|| NodeId::from(Ipv4Addr::LOCALHOST))
}
