use crate::ping_error::{PingError, PingResult};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Size of the echo payload sent with every request.
pub const PAYLOAD_SIZE: usize = 56;

const TIMESTAMP_LEN: usize = 8;
const TRACKER_LEN: usize = 8;

/// Length of the meaningful prefix of a payload: send timestamp followed by the tracker.
pub const PAYLOAD_PREFIX_LEN: usize = TIMESTAMP_LEN + TRACKER_LEN;

/// Data carried in the payload of every echo request.
///
/// Layout: bytes `[0, 8)` hold the send time as nanoseconds since the Unix epoch, bytes
/// `[8, 16)` hold the session tracker, both big endian. The rest is zero padding.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EchoPayload {
    pub sent_at: SystemTime,
    pub tracker: u64,
}

impl EchoPayload {
    pub fn new(sent_at: SystemTime, tracker: u64) -> Self {
        EchoPayload { sent_at, tracker }
    }

    pub fn encode(&self) -> [u8; PAYLOAD_SIZE] {
        let mut buf = [0u8; PAYLOAD_SIZE];
        buf[..TIMESTAMP_LEN].copy_from_slice(&time_to_nanos(self.sent_at).to_be_bytes());
        buf[TIMESTAMP_LEN..PAYLOAD_PREFIX_LEN].copy_from_slice(&self.tracker.to_be_bytes());
        buf
    }

    pub fn decode(payload: &[u8]) -> PingResult<Self> {
        if payload.len() < PAYLOAD_PREFIX_LEN {
            return Err(PingError::PayloadTooShort { len: payload.len(), expected: PAYLOAD_PREFIX_LEN });
        }
        let mut timestamp = [0u8; TIMESTAMP_LEN];
        timestamp.copy_from_slice(&payload[..TIMESTAMP_LEN]);
        let mut tracker = [0u8; TRACKER_LEN];
        tracker.copy_from_slice(&payload[TIMESTAMP_LEN..PAYLOAD_PREFIX_LEN]);

        Ok(EchoPayload {
            sent_at: UNIX_EPOCH + Duration::from_nanos(u64::from_be_bytes(timestamp)),
            tracker: u64::from_be_bytes(tracker),
        })
    }

    /// Round trip time of this request, given the time its reply arrived.
    pub fn rtt(&self, received_at: SystemTime) -> Duration {
        // A clock step backwards between send and receive yields zero rather than an error.
        received_at.duration_since(self.sent_at).unwrap_or(Duration::ZERO)
    }
}

// Saturates at u64::MAX nanoseconds (year 2554); times before the epoch map to zero.
fn time_to_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}
