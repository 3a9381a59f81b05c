use crate::correlator::{Correlation, Correlator};
use crate::gate::Gate;
use crate::icmp::socket::TSocket;
use crate::icmp::{decode, Icmp};
use crate::records::PingReceiveRecord;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ReceiverExit {
    GateClosed,
    /// The socket failed with something other than a read timeout.
    SocketError,
}

/// Reads replies from one family's socket until the gate closes.
pub(crate) struct PingReceiver<S> {
    icmp: Arc<Icmp<S>>,
    correlator: Arc<Correlator>,
    gate: Gate,
    debug: bool,
}

impl<S> PingReceiver<S>
where
    S: TSocket + 'static,
{
    pub(crate) fn new(icmp: Arc<Icmp<S>>, correlator: Arc<Correlator>, gate: Gate, debug: bool) -> Self {
        PingReceiver { icmp, correlator, gate, debug }
    }

    pub(crate) fn run(&self) -> ReceiverExit {
        let family = self.icmp.family();
        tracing::trace!("PingReceiver {} start", family);
        while !self.gate.is_closed() {
            match self.icmp.try_receive() {
                Ok(None) => {}
                Err(e) => {
                    // Only this family stops; the sender still closes the gate for the rest.
                    tracing::error!("error receiving on {} socket, stopping receiver: {}", family, e);
                    return ReceiverExit::SocketError;
                }
                Ok(Some(record)) => {
                    self.process(record);
                }
            }
        }
        tracing::trace!("PingReceiver {} end", family);
        ReceiverExit::GateClosed
    }

    fn process(&self, record: PingReceiveRecord) -> Option<Correlation> {
        let PingReceiveRecord { bytes, ip_addr, ttl, receive_time } = record;
        let message = match decode(&bytes, self.icmp.family()) {
            Ok(message) => message,
            Err(e) => {
                if self.debug {
                    tracing::debug!("drop packet from {}: {}", ip_addr, e);
                }
                return None;
            }
        };
        let message_type = message.message_type;
        let Some(echo) = message.into_echo_reply() else {
            if self.debug {
                tracing::debug!("drop {:?} packet from {}", message_type, ip_addr);
            }
            return None;
        };

        match self.correlator.correlate(&echo, receive_time, ttl) {
            Ok(correlation) => {
                if self.debug {
                    match correlation {
                        Correlation::Matched { sequence_number, rtt } => {
                            tracing::debug!("reply from {} seq {} rtt {:?}", ip_addr, sequence_number, rtt);
                        }
                        Correlation::ForeignSession => {
                            tracing::debug!("drop reply from {} with foreign id {:#06x}", ip_addr, echo.identifier);
                        }
                        Correlation::UnknownSequence(sequence_number) => {
                            tracing::debug!("drop reply from {} with unknown seq {}", ip_addr, sequence_number);
                        }
                        Correlation::Duplicate(sequence_number) => {
                            tracing::debug!("drop duplicate reply from {} seq {}", ip_addr, sequence_number);
                        }
                    }
                }
                Some(correlation)
            }
            Err(e) => {
                if self.debug {
                    tracing::debug!("drop reply from {}: {}", ip_addr, e);
                }
                None
            }
        }
    }
}
