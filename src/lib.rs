//! Pings many IPv4 and IPv6 hosts at once and reports per-host statistics.
//!
//! All echo requests of one run share a single socket per address family. Replies are
//! told apart by their sequence number, which is the position of the host in the input
//! list, and by a per-run tracker in the payload.

#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub use batch_pinger::BatchPinger;
pub use icmp::socket::SocketType;
pub use icmp::{AddressFamily, Ttl};
pub use ping_error::{PingError, PingResult};
pub use statistics::Statistics;

mod batch_pinger;
mod correlator;
mod gate;
pub mod icmp;
mod ping_error;
mod ping_receiver;
mod ping_sender;
mod records;
mod session;
mod statistics;
mod target;
