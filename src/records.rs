use crate::icmp::Ttl;
use std::net::IpAddr;
use std::time::SystemTime;

/// A packet read from one of the sockets, not yet decoded.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct PingReceiveRecord {
    pub bytes: Vec<u8>,
    pub ip_addr: IpAddr,
    pub ttl: Option<Ttl>,
    pub receive_time: SystemTime,
}
