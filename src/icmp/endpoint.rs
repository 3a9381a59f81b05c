use super::socket::TSocket;
use super::{encode_echo_request, AddressFamily, EchoPayload, SequenceNumber};
use crate::ping_error::{PingError, PingResult};
use crate::records::PingReceiveRecord;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::SystemTime;

const RECV_BUFFER_LEN: usize = 512;

/// One family's ICMP socket together with the codec for that family.
pub(crate) struct Icmp<S> {
    family: AddressFamily,
    socket: S,
}

impl<S> Icmp<S>
where
    S: TSocket,
{
    pub(crate) fn new(family: AddressFamily, socket: S) -> Icmp<S> {
        Icmp { family, socket }
    }

    pub(crate) fn family(&self) -> AddressFamily {
        self.family
    }

    /// Sends one echo request. The send time written into the payload is taken right
    /// before the packet is handed to the socket.
    pub(crate) fn send_echo(
        &self,
        ip_addr: IpAddr,
        identifier: u16,
        sequence_number: SequenceNumber,
        tracker: u64,
    ) -> PingResult<usize> {
        if AddressFamily::of(&ip_addr) != self.family {
            return Err(PingError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot send to {ip_addr} on an {} socket", self.family),
            )));
        }
        let addr: socket2::SockAddr = SocketAddr::new(ip_addr, 0).into();
        let payload = EchoPayload::new(SystemTime::now(), tracker);
        let package = encode_echo_request(self.family, identifier, sequence_number, &payload.encode())?;
        Ok(self.socket.send_to(&package, &addr)?)
    }

    /// Reads one packet. A read timeout is not an error, it yields `Ok(None)`. So do an
    /// interrupted read and a packet that could not be taken apart, which is dropped.
    pub(crate) fn try_receive(&self) -> io::Result<Option<PingReceiveRecord>> {
        let mut buf = [0u8; RECV_BUFFER_LEN];
        match self.socket.recv_from(&mut buf) {
            Err(e)
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) =>
            {
                Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                tracing::trace!("drop unreadable packet on {} socket: {}", self.family, e);
                Ok(None)
            }
            Err(e) => Err(e),
            Ok((package_size, ip_addr, ttl)) => {
                let receive_time = SystemTime::now();
                Ok(Some(PingReceiveRecord { bytes: buf[..package_size].to_vec(), ip_addr, ttl, receive_time }))
            }
        }
    }
}
