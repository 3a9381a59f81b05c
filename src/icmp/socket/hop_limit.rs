//! Hop count of received packets from ancillary data (`IP_RECVTTL` / `IPV6_RECVHOPLIMIT`).
//!
//! Used where the kernel hands out the ICMP message without its IP header: datagram
//! sockets of both families and raw IPv6 sockets.

use crate::icmp::{AddressFamily, Ttl};
use std::io;
use std::net::IpAddr;

#[cfg(target_os = "linux")]
mod imp {
    use super::{AddressFamily, IpAddr, Ttl};
    use std::os::unix::io::AsRawFd;
    use std::{io, mem, ptr};

    // Room for one cmsghdr carrying an int, with generous slack. u64 keeps it aligned.
    const CONTROL_WORDS: usize = 16;

    pub(super) fn enable(socket: &socket2::Socket, family: AddressFamily) -> io::Result<()> {
        let (level, name) = match family {
            AddressFamily::V4 => (libc::IPPROTO_IP, libc::IP_RECVTTL),
            AddressFamily::V6 => (libc::IPPROTO_IPV6, libc::IPV6_RECVHOPLIMIT),
        };
        let enable: libc::c_int = 1;
        // Safety: the option value points to a live c_int of the length passed.
        let result = unsafe {
            libc::setsockopt(
                socket.as_raw_fd(),
                level,
                name,
                ptr::addr_of!(enable).cast::<libc::c_void>(),
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)] // socklen_t and controllen fit the small buffers
    #[allow(clippy::cast_sign_loss)] // n_bytes is checked to be non-negative
    pub(super) fn recv(socket: &socket2::Socket, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<Ttl>)> {
        // Safety: all-zero is a valid sockaddr_storage and msghdr.
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut control = [0u64; CONTROL_WORDS];
        let mut iov = libc::iovec { iov_base: buf.as_mut_ptr().cast::<libc::c_void>(), iov_len: buf.len() };
        let mut msg: libc::msghdr = unsafe { mem::zeroed() };
        msg.msg_name = ptr::addr_of_mut!(storage).cast::<libc::c_void>();
        msg.msg_namelen = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        msg.msg_iov = ptr::addr_of_mut!(iov);
        msg.msg_iovlen = 1;
        msg.msg_control = control.as_mut_ptr().cast::<libc::c_void>();
        msg.msg_controllen = mem::size_of_val(&control) as _;

        // Safety: every pointer in msg refers to a buffer owned by this frame, sized as stated.
        let n_bytes = unsafe { libc::recvmsg(socket.as_raw_fd(), &mut msg, 0) };
        if n_bytes < 0 {
            return Err(io::Error::last_os_error());
        }

        // Safety: the kernel filled `storage` and reported its length in msg_namelen.
        let sock_addr = unsafe { socket2::SockAddr::new(storage, msg.msg_namelen) };
        let ip_addr = sock_addr
            .as_socket()
            .map(|addr| addr.ip())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "error in extracting IP address from SockAddr"))?;

        Ok((n_bytes as usize, ip_addr, hop_limit(&msg)))
    }

    fn hop_limit(msg: &libc::msghdr) -> Option<Ttl> {
        let mut ttl = None;
        // Safety: msg was filled by recvmsg, the CMSG_* macros stay within msg_control.
        unsafe {
            let mut cmsg = libc::CMSG_FIRSTHDR(msg);
            while !cmsg.is_null() {
                let header = &*cmsg;
                let is_hop_limit = (header.cmsg_level == libc::IPPROTO_IP && header.cmsg_type == libc::IP_TTL)
                    || (header.cmsg_level == libc::IPPROTO_IPV6 && header.cmsg_type == libc::IPV6_HOPLIMIT);
                if is_hop_limit {
                    let value = ptr::read_unaligned(libc::CMSG_DATA(cmsg).cast::<libc::c_int>());
                    ttl = u8::try_from(value).ok().map(Ttl);
                }
                cmsg = libc::CMSG_NXTHDR(msg, cmsg);
            }
        }
        ttl
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use super::{AddressFamily, IpAddr, Ttl};
    use std::io;

    pub(super) fn enable(_socket: &socket2::Socket, _family: AddressFamily) -> io::Result<()> {
        Ok(())
    }

    pub(super) fn recv(socket: &socket2::Socket, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<Ttl>)> {
        let (n_bytes, ip_addr) = super::super::recv_with_addr(socket, buf)?;
        Ok((n_bytes, ip_addr, None))
    }
}

/// Asks the kernel to attach the hop count to every packet read from `socket`.
pub(super) fn enable(socket: &socket2::Socket, family: AddressFamily) -> io::Result<()> {
    imp::enable(socket, family)
}

/// Reads one packet together with its hop count, if the kernel attached one.
pub(super) fn recv(socket: &socket2::Socket, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<Ttl>)> {
    imp::recv(socket, buf)
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use socket2::{Domain, Protocol, Socket, Type};
    use std::net::{Ipv4Addr, SocketAddr};
    use std::time::Duration;

    // UDP on loopback needs no privileges and goes through the same cmsg path.
    #[test]
    fn recv_reports_ttl_of_loopback_datagram() {
        let receiver = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).unwrap();
        receiver.bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).into()).unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
        enable(&receiver, AddressFamily::V4).unwrap();
        let sender = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).unwrap();
        sender.set_ttl(42).unwrap();

        sender.send_to(b"hop", &receiver.local_addr().unwrap()).unwrap();
        let mut buf = [0u8; 16];
        let (n_bytes, ip_addr, ttl) = recv(&receiver, &mut buf).unwrap();

        assert_eq!(b"hop", &buf[..n_bytes]);
        assert_eq!(IpAddr::V4(Ipv4Addr::LOCALHOST), ip_addr);
        assert_eq!(Some(Ttl(42)), ttl);
    }

    #[test]
    fn recv_without_enable_reports_no_ttl() {
        let receiver = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).unwrap();
        receiver.bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).into()).unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
        let sender = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).unwrap();

        sender.send_to(b"x", &receiver.local_addr().unwrap()).unwrap();
        let mut buf = [0u8; 16];
        let (_, _, ttl) = recv(&receiver, &mut buf).unwrap();

        assert_eq!(None, ttl);
    }

    #[test]
    fn recv_times_out_like_recv_from() {
        let receiver = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).unwrap();
        receiver.bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).into()).unwrap();
        receiver.set_read_timeout(Some(Duration::from_millis(10))).unwrap();
        enable(&receiver, AddressFamily::V4).unwrap();

        let mut buf = [0u8; 16];
        let kind = recv(&receiver, &mut buf).unwrap_err().kind();

        assert!(matches!(kind, io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut));
    }
}
