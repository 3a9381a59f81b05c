use super::{hop_limit, new_icmp_socket, recv_with_addr, TSocket};
use crate::icmp::{AddressFamily, Ttl};
use pnet_packet::ipv4::Ipv4Packet;
use socket2::Type;
use std::net::IpAddr;
use std::{io, time::Duration};

const RECV_BUFFER_LEN: usize = 512;

pub(crate) struct RawSocket {
    pub(super) socket: socket2::Socket,
    family: AddressFamily,
}

impl RawSocket {
    pub(crate) fn new(family: AddressFamily, read_timeout: Duration) -> Result<Self, io::Error> {
        tracing::trace!("creating {} RawSocket", family);
        let socket = new_icmp_socket(family, Type::RAW, read_timeout)?;
        if family == AddressFamily::V6 {
            hop_limit::enable(&socket, family)?;
        }
        Ok(RawSocket { socket, family })
    }
}

impl TSocket for RawSocket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<Ttl>)> {
        if self.family == AddressFamily::V6 {
            // Raw ICMPv6 sockets deliver the ICMP message only, the hop limit comes as
            // ancillary data.
            return hop_limit::recv(&self.socket, buf);
        }

        // On a raw IPv4 socket we get an IP packet.
        let mut recv_buf = [0u8; RECV_BUFFER_LEN];
        let (n_bytes, ip_addr) = recv_with_addr(&self.socket, &mut recv_buf)?;
        let ipv4_packet = Ipv4Packet::new(&recv_buf[..n_bytes])
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "could not initialize IPv4 package"))?;
        // The total length field is not in network byte order on every platform, so only
        // the header length is trusted.
        let header_len = usize::from(ipv4_packet.get_header_length()) * 4;
        let ip_payload = recv_buf
            .get(header_len..n_bytes)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "IPv4 header exceeds received data"))?;
        if buf.len() < ip_payload.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "buffer too small"));
        }
        // Return only the ICMP content
        buf[..ip_payload.len()].copy_from_slice(ip_payload);
        Ok((ip_payload.len(), ip_addr, Some(ipv4_packet.get_ttl().into())))
    }
}
