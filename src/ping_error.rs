use crate::icmp::AddressFamily;
use std::io;

pub type PingResult<T> = std::result::Result<T, PingError>;

#[derive(Debug, thiserror::Error)]
pub enum PingError {
    #[error("too many addresses: got {count}, at most {max} are supported")]
    TooManyAddresses { count: usize, max: usize },

    #[error("could not open {family} socket: {source}")]
    SocketOpen {
        family: AddressFamily,
        #[source]
        source: io::Error,
    },

    #[error("could not resolve address {address:?}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("address {address:?} did not resolve to any IP address")]
    NoAddress { address: String },

    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("insufficient data received: got {len} bytes, expected at least {expected}")]
    PayloadTooShort { len: usize, expected: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io::ErrorKind;

    #[test]
    fn fmt_too_many_addresses() {
        let ping_error = PingError::TooManyAddresses { count: 70000, max: 65535 };
        assert_eq!("too many addresses: got 70000, at most 65535 are supported", format!("{ping_error}"));
    }

    #[test]
    fn fmt_socket_open_names_family() {
        let ping_error =
            PingError::SocketOpen { family: AddressFamily::V6, source: io::Error::from(ErrorKind::PermissionDenied) };
        assert!(format!("{ping_error}").starts_with("could not open IPv6 socket"));
        assert!(ping_error.source().is_some());
    }

    #[test]
    fn fmt_payload_too_short() {
        let ping_error = PingError::PayloadTooShort { len: 4, expected: 16 };
        assert_eq!("insufficient data received: got 4 bytes, expected at least 16", format!("{ping_error}"));
        assert!(ping_error.source().is_none());
    }

    #[test]
    fn ping_error_from_std_io_error() {
        let std_io_error = io::Error::new(ErrorKind::Other, "simulated");
        let ping_error: PingError = PingError::from(std_io_error);
        assert!(matches!(ping_error, PingError::Io(_)));
        assert_eq!("simulated", format!("{ping_error}"));
    }
}
