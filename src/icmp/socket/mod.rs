use crate::icmp::{AddressFamily, Ttl};
use socket2::{Domain, Protocol, Type};
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use std::{io, time::Duration};

pub(crate) use dgram_socket::DgramSocket;
pub(crate) use raw_socket::RawSocket;

mod dgram_socket;
mod hop_limit;
mod raw_socket;

pub(crate) trait TSocket: Send + Sync {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize>;

    /// Receives one ICMP message (without IP header) into `buf`. The hop count is only
    /// reported where the socket exposes it.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<Ttl>)>;
}

/// Kind of socket used for both families. Raw sockets need privileges; datagram ICMP
/// sockets need the user's group to be allowed by `net.ipv4.ping_group_range` on Linux.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SocketType {
    Dgram,
    Raw,
}

impl SocketType {
    pub(crate) fn from_privileged(privileged: bool) -> Self {
        if privileged {
            SocketType::Raw
        } else {
            SocketType::Dgram
        }
    }

    /// Whether the kernel leaves the ICMP identifier of outbound echo requests alone.
    /// Datagram ICMP sockets overwrite it with the socket's local port.
    pub(crate) fn preserves_identifier(self) -> bool {
        self == SocketType::Raw
    }
}

pub(crate) enum Socket {
    Raw(RawSocket),
    Dgram(DgramSocket),
}

impl Socket {
    pub(crate) fn new(
        socket_type: SocketType,
        family: AddressFamily,
        source: Option<IpAddr>,
        read_timeout: Duration,
    ) -> Result<Self, io::Error> {
        let socket = match socket_type {
            SocketType::Dgram => Socket::Dgram(DgramSocket::new(family, read_timeout)?),
            SocketType::Raw => Socket::Raw(RawSocket::new(family, read_timeout)?),
        };
        if let Some(source) = source.filter(|ip| AddressFamily::of(ip) == family) {
            tracing::trace!("binding {} socket to {}", family, source);
            socket.inner().bind(&SocketAddr::new(source, 0).into())?;
        }
        Ok(socket)
    }

    fn inner(&self) -> &socket2::Socket {
        match self {
            Socket::Dgram(socket) => &socket.socket,
            Socket::Raw(socket) => &socket.socket,
        }
    }
}

impl TSocket for Socket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        match self {
            Socket::Dgram(socket) => socket.send_to(buf, addr),
            Socket::Raw(socket) => socket.send_to(buf, addr),
        }
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<Ttl>)> {
        match self {
            Socket::Dgram(socket) => socket.recv_from(buf),
            Socket::Raw(socket) => socket.recv_from(buf),
        }
    }
}

fn new_icmp_socket(family: AddressFamily, ty: Type, read_timeout: Duration) -> io::Result<socket2::Socket> {
    let socket = match family {
        AddressFamily::V4 => socket2::Socket::new(Domain::IPV4, ty, Some(Protocol::ICMPV4))?,
        AddressFamily::V6 => socket2::Socket::new(Domain::IPV6, ty, Some(Protocol::ICMPV6))?,
    };
    socket.set_read_timeout(Some(read_timeout))?;
    Ok(socket)
}

fn recv_with_addr(socket: &socket2::Socket, buf: &mut [u8]) -> io::Result<(usize, IpAddr)> {
    // Socket2 gives a safety guaranty which allows us to do an unsafe cast from `&mut [u8]`
    // to `&mut [std::mem::MaybeUninit<u8>]`: it never writes uninitialised bytes into the buffer.
    // https://docs.rs/socket2/0.4.7/socket2/struct.Socket.html#method.recv
    let (n_bytes, socket_addr) =
        socket.recv_from(unsafe { &mut *(std::ptr::addr_of_mut!(*buf) as *mut [MaybeUninit<u8>]) })?;
    let ip_addr = socket_addr
        .as_socket()
        .map(|addr| addr.ip())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "error in extracting IP address from SockAddr"))?;
    Ok((n_bytes, ip_addr))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::collections::{HashSet, VecDeque};
    use std::sync::Arc;
    use std::sync::Mutex;

    use pnet_packet::icmp::IcmpTypes;
    use pnet_packet::icmpv6::Icmpv6Types;

    #[derive(Clone, Copy, PartialEq, Eq)]
    pub(crate) enum OnSend {
        ReturnErr,
        ReturnDefault,
    }

    #[derive(PartialEq, Eq, Clone, Copy)]
    pub(crate) enum OnReceive {
        /// Never receives anything.
        ReturnWouldBlock,
        /// Fails with a non-timeout error.
        ReturnErr,
        /// Echoes every request back as a reply, except to silent addresses.
        ReturnEcho,
    }

    type VecOfBuffersAndAddresses = Arc<Mutex<Vec<(Vec<u8>, IpAddr)>>>;

    /// Stands in for a socket of one family. Clones share all state.
    #[derive(Clone)]
    pub(crate) struct SocketMock {
        family: AddressFamily,
        on_send: OnSend,
        on_receive: OnReceive,
        silent: Arc<Mutex<HashSet<IpAddr>>>,
        replies_per_request: usize,
        hop_limit: Arc<Mutex<Option<Ttl>>>,
        sent: VecOfBuffersAndAddresses,
        pending: Arc<Mutex<VecDeque<Result<(Vec<u8>, IpAddr), io::ErrorKind>>>>,
        received_cnt: Arc<Mutex<usize>>,
        recv_calls: Arc<Mutex<usize>>,
    }

    impl SocketMock {
        pub(crate) fn new(family: AddressFamily, on_send: OnSend, on_receive: OnReceive) -> Self {
            Self {
                family,
                on_send,
                on_receive,
                silent: Arc::new(Mutex::new(HashSet::new())),
                replies_per_request: 1,
                hop_limit: Arc::new(Mutex::new(Some(Ttl(64)))),
                sent: Arc::new(Mutex::new(vec![])),
                pending: Arc::new(Mutex::new(VecDeque::new())),
                received_cnt: Arc::new(Mutex::new(0)),
                recv_calls: Arc::new(Mutex::new(0)),
            }
        }

        pub(crate) fn new_echo(family: AddressFamily) -> Self {
            Self::new(family, OnSend::ReturnDefault, OnReceive::ReturnEcho)
        }

        /// Requests to `addr` are recorded but never answered.
        pub(crate) fn with_silent(self, addr: IpAddr) -> Self {
            self.silent.lock().unwrap().insert(addr);
            self
        }

        /// Hop count reported with every received packet.
        pub(crate) fn with_hop_limit(self, hop_limit: Option<Ttl>) -> Self {
            *self.hop_limit.lock().unwrap() = hop_limit;
            self
        }

        /// Every echoed request is answered `n` times.
        pub(crate) fn with_replies_per_request(mut self, n: usize) -> Self {
            self.replies_per_request = n;
            self
        }

        /// Queues raw ICMP bytes to be returned by a later `recv_from`.
        pub(crate) fn inject(&self, bytes: Vec<u8>, from: IpAddr) {
            self.pending.lock().unwrap().push_back(Ok((bytes, from)));
        }

        /// Queues a read error to be returned by a later `recv_from`.
        pub(crate) fn inject_error(&self, kind: io::ErrorKind) {
            self.pending.lock().unwrap().push_back(Err(kind));
        }

        pub(crate) fn sent_packets(&self) -> Vec<(Vec<u8>, IpAddr)> {
            self.sent.lock().unwrap().clone()
        }

        pub(crate) fn recv_calls(&self) -> usize {
            *self.recv_calls.lock().unwrap()
        }

        pub(crate) fn should_send_number_of_messages(&self, n: usize) -> &Self {
            assert_eq!(n, self.sent.lock().unwrap().len());
            self
        }

        pub(crate) fn should_send_to_address(&self, addr: &IpAddr) -> &Self {
            assert!(self.sent.lock().unwrap().iter().any(|e| *addr == e.1));
            self
        }

        pub(crate) fn should_receive_number_of_messages(&self, n: usize) -> &Self {
            assert_eq!(n, *self.received_cnt.lock().unwrap());
            self
        }

        fn reply_type(&self) -> u8 {
            match self.family {
                AddressFamily::V4 => IcmpTypes::EchoReply.0,
                AddressFamily::V6 => Icmpv6Types::EchoReply.0,
            }
        }

        fn would_block() -> io::Error {
            // Stand in for the read timeout of a real socket without spinning.
            std::thread::sleep(Duration::from_millis(1));
            io::Error::new(io::ErrorKind::WouldBlock, "simulating would-block in mock")
        }
    }

    impl TSocket for SocketMock {
        fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
            if self.on_send == OnSend::ReturnErr {
                return Err(io::Error::new(io::ErrorKind::Other, "simulating error in mock"));
            }
            let ip_addr = addr
                .as_socket()
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "error in extracting IP address from SockAddr"))?
                .ip();
            self.sent.lock().unwrap().push((buf.to_vec(), ip_addr));

            if self.on_receive == OnReceive::ReturnEcho && !self.silent.lock().unwrap().contains(&ip_addr) {
                let mut reply = buf.to_vec();
                reply[0] = self.reply_type();
                let mut pending = self.pending.lock().unwrap();
                for _ in 0..self.replies_per_request {
                    pending.push_back(Ok((reply.clone(), ip_addr)));
                }
            }
            Ok(buf.len())
        }

        fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<Ttl>)> {
            *self.recv_calls.lock().unwrap() += 1;
            if self.on_receive == OnReceive::ReturnErr {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "simulating error in mock"));
            }

            let next = self.pending.lock().unwrap().pop_front();
            let (package_bytes, ip_addr) = match next {
                None => return Err(Self::would_block()),
                Some(Err(kind)) => return Err(io::Error::new(kind, "simulating injected error in mock")),
                Some(Ok(package)) => package,
            };
            if buf.len() < package_bytes.len() {
                return Err(io::Error::new(io::ErrorKind::Other, "buffer too small"));
            }
            buf[..package_bytes.len()].copy_from_slice(&package_bytes);
            *self.received_cnt.lock().unwrap() += 1;

            Ok((package_bytes.len(), ip_addr, *self.hop_limit.lock().unwrap()))
        }
    }

    #[test]
    fn socket_type_from_privileged() {
        assert_eq!(SocketType::Raw, SocketType::from_privileged(true));
        assert_eq!(SocketType::Dgram, SocketType::from_privileged(false));
        assert!(SocketType::Raw.preserves_identifier());
        assert!(!SocketType::Dgram.preserves_identifier());
    }

    #[test]
    fn mock_echoes_requests_except_to_silent_addresses() {
        let loud: IpAddr = "127.0.0.1".parse().unwrap();
        let silent: IpAddr = "127.0.0.2".parse().unwrap();
        let socket = SocketMock::new_echo(AddressFamily::V4).with_silent(silent);

        socket.send_to(&[8, 0, 0, 0, 0, 0, 0, 1], &SocketAddr::new(loud, 0).into()).unwrap();
        socket.send_to(&[8, 0, 0, 0, 0, 0, 0, 2], &SocketAddr::new(silent, 0).into()).unwrap();

        let mut buf = [0u8; 64];
        let (n, from, ttl) = socket.recv_from(&mut buf).unwrap();
        assert_eq!(8, n);
        assert_eq!(loud, from);
        assert_eq!(Some(Ttl(64)), ttl);
        assert_eq!(0, buf[0]);
        assert_eq!(io::ErrorKind::WouldBlock, socket.recv_from(&mut buf).unwrap_err().kind());
        socket.should_send_number_of_messages(2).should_receive_number_of_messages(1);
    }
}
