use crate::icmp::{Echo, EchoPayload, SequenceNumber, Ttl};
use crate::ping_error::PingResult;
use crate::session::Session;
use crate::target::TargetTable;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// What became of one echo reply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Correlation {
    Matched { sequence_number: SequenceNumber, rtt: Duration },
    /// Sent by another pinger, or by this host for someone else.
    ForeignSession,
    UnknownSequence(SequenceNumber),
    /// A reply beyond the number of requests sent to that target.
    Duplicate(SequenceNumber),
}

/// Assigns echo replies to the target that sent the matching request.
pub(crate) struct Correlator {
    session: Session,
    targets: Arc<TargetTable>,
    verify_identifier: bool,
}

impl Correlator {
    /// With `verify_identifier` unset the ICMP identifier is ignored and only the tracker
    /// in the payload decides whether a reply belongs to this session.
    pub(crate) fn new(session: Session, targets: Arc<TargetTable>, verify_identifier: bool) -> Self {
        Correlator { session, targets, verify_identifier }
    }

    pub(crate) fn correlate(&self, echo: &Echo, received_at: SystemTime, ttl: Option<Ttl>) -> PingResult<Correlation> {
        if self.verify_identifier && echo.identifier != self.session.identifier {
            return Ok(Correlation::ForeignSession);
        }
        let payload = EchoPayload::decode(&echo.payload)?;
        if payload.tracker != self.session.tracker {
            return Ok(Correlation::ForeignSession);
        }
        let Some(target) = self.targets.get(echo.sequence_number) else {
            return Ok(Correlation::UnknownSequence(echo.sequence_number));
        };

        let rtt = payload.rtt(received_at);
        if !target.record_reply(rtt, ttl) {
            return Ok(Correlation::Duplicate(echo.sequence_number));
        }
        Ok(Correlation::Matched { sequence_number: echo.sequence_number, rtt })
    }
}
