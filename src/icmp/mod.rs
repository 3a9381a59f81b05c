//! ICMP and ICMPv6 echo packet codec plus the sockets the packets travel over.

use std::net::IpAddr;

mod endpoint;
mod message;
mod payload;
mod sequence_number;
pub(crate) mod socket;
mod ttl;

pub(crate) use endpoint::Icmp;
pub use message::{decode, encode_echo_request, Echo, Message, MessageBody, MessageType};
pub use payload::{EchoPayload, PAYLOAD_PREFIX_LEN, PAYLOAD_SIZE};
pub use sequence_number::SequenceNumber;
pub use ttl::Ttl;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(ip_addr: &IpAddr) -> Self {
        match ip_addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "IPv4"),
            AddressFamily::V6 => write!(f, "IPv6"),
        }
    }
}
