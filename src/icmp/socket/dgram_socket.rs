use super::{hop_limit, new_icmp_socket, TSocket};
use crate::icmp::{AddressFamily, Ttl};
use socket2::Type;
use std::net::IpAddr;
use std::{io, time::Duration};

/// Unprivileged ICMP socket. The kernel strips the IP header and rewrites the echo
/// identifier; the hop count arrives as ancillary data.
pub(crate) struct DgramSocket {
    pub(super) socket: socket2::Socket,
}

impl DgramSocket {
    pub(crate) fn new(family: AddressFamily, read_timeout: Duration) -> Result<Self, io::Error> {
        tracing::trace!("creating {} DgramSocket", family);
        let socket = new_icmp_socket(family, Type::DGRAM, read_timeout)?;
        hop_limit::enable(&socket, family)?;
        Ok(DgramSocket { socket })
    }
}

impl TSocket for DgramSocket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<Ttl>)> {
        hop_limit::recv(&self.socket, buf)
    }
}
