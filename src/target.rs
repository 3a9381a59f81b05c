use crate::icmp::{AddressFamily, SequenceNumber, Ttl};
use crate::ping_error::{PingError, PingResult};
use crate::statistics::Statistics;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct Replies {
    received: usize,
    rtts: Vec<Duration>,
    ttl: Option<Ttl>,
}

/// Ping state of one address for the duration of a run.
#[derive(Debug)]
pub(crate) struct Target {
    address: String,
    ip_addr: IpAddr,
    sequence_number: SequenceNumber,
    // Only the sender loop increments this.
    sent: AtomicUsize,
    // Both receiver loops may record replies at the same time.
    replies: Mutex<Replies>,
}

impl Target {
    pub(crate) fn new(address: String, ip_addr: IpAddr, sequence_number: SequenceNumber) -> Self {
        Target { address, ip_addr, sequence_number, sent: AtomicUsize::new(0), replies: Mutex::new(Replies::default()) }
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn ip_addr(&self) -> IpAddr {
        self.ip_addr
    }

    pub(crate) fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.ip_addr)
    }

    pub(crate) fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }

    pub(crate) fn mark_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }

    /// Records a reply unless it would make `received` exceed `sent`. Returns whether it
    /// was recorded.
    pub(crate) fn record_reply(&self, rtt: Duration, ttl: Option<Ttl>) -> bool {
        let mut replies = self.replies();
        if replies.received >= self.sent() {
            return false;
        }
        replies.received += 1;
        replies.rtts.push(rtt);
        if ttl.is_some() {
            replies.ttl = ttl;
        }
        true
    }

    pub(crate) fn received(&self) -> usize {
        self.replies().received
    }

    pub(crate) fn statistics(&self) -> Statistics {
        let replies = self.replies();
        Statistics::new(self.address.clone(), self.ip_addr, self.sent(), replies.received, replies.rtts.clone(), replies.ttl)
    }

    fn replies(&self) -> MutexGuard<'_, Replies> {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// All targets of a run, indexed by sequence number. Built once, never changed.
#[derive(Debug, Default)]
pub(crate) struct TargetTable {
    targets: Vec<Target>,
}

impl TargetTable {
    /// Resolves every address and hands out sequence numbers in input order.
    pub(crate) fn resolve(addresses: &[String]) -> PingResult<Self> {
        Self::build(addresses, resolve_address)
    }

    pub(crate) fn build<F>(addresses: &[String], mut resolve: F) -> PingResult<Self>
    where
        F: FnMut(&str) -> PingResult<IpAddr>,
    {
        let max = SequenceNumber::capacity();
        if addresses.len() > max {
            return Err(PingError::TooManyAddresses { count: addresses.len(), max });
        }
        let mut targets = Vec::with_capacity(addresses.len());
        for (index, address) in addresses.iter().enumerate() {
            let sequence_number =
                SequenceNumber::from_index(index).ok_or(PingError::TooManyAddresses { count: addresses.len(), max })?;
            let ip_addr = resolve(address)?;
            tracing::trace!("target {} resolved to {} with sequence number {}", address, ip_addr, sequence_number);
            targets.push(Target::new(address.clone(), ip_addr, sequence_number));
        }
        Ok(TargetTable { targets })
    }

    pub(crate) fn get(&self, sequence_number: SequenceNumber) -> Option<&Target> {
        self.targets.get(sequence_number.index()?)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.targets.len()
    }
}

fn resolve_address(address: &str) -> PingResult<IpAddr> {
    if let Ok(ip_addr) = address.parse::<IpAddr>() {
        return Ok(ip_addr);
    }
    let mut resolved = (address, 0)
        .to_socket_addrs()
        .map_err(|source| PingError::Resolve { address: address.to_owned(), source })?;
    resolved.next().map(|addr| addr.ip()).ok_or_else(|| PingError::NoAddress { address: address.to_owned() })
}
