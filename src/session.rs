use rand::Rng;

/// Marks the packets of one `BatchPinger`.
///
/// The identifier goes into the ICMP identifier field of every request, the tracker into
/// its payload. Replies carrying anything else belong to another pinger.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Session {
    pub identifier: u16,
    pub tracker: u64,
}

impl Session {
    pub(crate) fn new() -> Self {
        let mut rng = rand::thread_rng();
        Session { identifier: rng.gen(), tracker: rng.gen() }
    }
}
