use crate::gate::Gate;
use crate::icmp::socket::TSocket;
use crate::icmp::{AddressFamily, Icmp};
use crate::session::Session;
use crate::target::TargetTable;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How the sender loop ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Termination {
    /// All rounds were sent and the grace interval passed.
    CountReached,
    /// The overall timeout fired first.
    TimedOut,
    /// The gate was already closed by someone else.
    Halted,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct SendSchedule {
    pub interval: Duration,
    pub count: usize,
    pub timeout: Duration,
}

enum Wakeup {
    Tick,
    Deadline,
    Closed,
}

/// Paces the send rounds and decides when the run is over. It is the only loop that
/// closes the gate.
pub(crate) struct PingSender<S> {
    icmpv4: Arc<Icmp<S>>,
    icmpv6: Arc<Icmp<S>>,
    targets: Arc<TargetTable>,
    session: Session,
    schedule: SendSchedule,
    gate: Gate,
    debug: bool,
}

impl<S> PingSender<S>
where
    S: TSocket + 'static,
{
    pub(crate) fn new(
        icmpv4: Arc<Icmp<S>>,
        icmpv6: Arc<Icmp<S>>,
        targets: Arc<TargetTable>,
        session: Session,
        schedule: SendSchedule,
        gate: Gate,
        debug: bool,
    ) -> Self {
        PingSender { icmpv4, icmpv6, targets, session, schedule, gate, debug }
    }

    pub(crate) fn run(&self) -> Termination {
        let SendSchedule { interval, count, timeout } = self.schedule;
        let start = Instant::now();
        // Armed once. A timeout too large to represent never fires.
        let deadline = start.checked_add(timeout);
        let mut next_tick = start.checked_add(interval);
        let mut rounds = 0;
        tracing::trace!("PingSender start with count {}, interval {:?}, timeout {:?}", count, interval, timeout);

        while rounds < count {
            // A tick too far away to represent never comes, no more rounds are sent.
            if next_tick.is_none() {
                break;
            }
            match self.wait(next_tick, deadline) {
                Wakeup::Closed => return Termination::Halted,
                Wakeup::Deadline => return self.close(Termination::TimedOut),
                Wakeup::Tick => {}
            }
            self.send_round();
            rounds += 1;
            next_tick = next_tick.and_then(|tick| tick.checked_add(interval)).map(|tick| tick.max(Instant::now()));
        }

        if self.debug {
            tracing::debug!("send end after {} rounds, count {}", rounds, count);
        }
        // Grace period for trailing replies.
        match self.wait(Instant::now().checked_add(interval), deadline) {
            Wakeup::Closed => Termination::Halted,
            Wakeup::Deadline => self.close(Termination::TimedOut),
            Wakeup::Tick => self.close(Termination::CountReached),
        }
    }

    fn send_round(&self) {
        for target in self.targets.iter() {
            let icmp = match target.family() {
                AddressFamily::V4 => &self.icmpv4,
                AddressFamily::V6 => &self.icmpv6,
            };
            // Counted before the send and regardless of its result; replies are capped at `sent`.
            target.mark_sent();
            let result =
                icmp.send_echo(target.ip_addr(), self.session.identifier, target.sequence_number(), self.session.tracker);
            if let Err(e) = result {
                if self.debug {
                    tracing::debug!("failed to send echo request to {}: {}", target.address(), e);
                }
            }
        }
        tracing::trace!("PingSender round sent to {} targets", self.targets.len());
    }

    /// Waits for the earlier of `tick` and `deadline`; `None` means never. With neither
    /// there is nothing to wait for and the tick is reported right away.
    fn wait(&self, tick: Option<Instant>, deadline: Option<Instant>) -> Wakeup {
        let (until, wakeup) = match (tick, deadline) {
            (Some(tick), Some(deadline)) if deadline <= tick => (Some(deadline), Wakeup::Deadline),
            (Some(tick), _) => (Some(tick), Wakeup::Tick),
            (None, Some(deadline)) => (Some(deadline), Wakeup::Deadline),
            (None, None) => (None, Wakeup::Tick),
        };
        let closed = match until {
            Some(until) => self.gate.wait_until(until),
            None => self.gate.is_closed(),
        };
        if closed {
            Wakeup::Closed
        } else {
            wakeup
        }
    }

    fn close(&self, termination: Termination) -> Termination {
        if self.gate.close() {
            tracing::trace!("PingSender closed the gate: {:?}", termination);
            termination
        } else {
            Termination::Halted
        }
    }
}
