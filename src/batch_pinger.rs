use crate::correlator::Correlator;
use crate::gate::Gate;
use crate::icmp::socket::{Socket, SocketType, TSocket};
use crate::icmp::{AddressFamily, Icmp, SequenceNumber};
use crate::ping_error::{PingError, PingResult};
use crate::ping_receiver::PingReceiver;
use crate::ping_sender::{PingSender, SendSchedule, Termination};
use crate::session::Session;
use crate::statistics::Statistics;
use crate::target::TargetTable;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_COUNT: usize = 5;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100_000);
const MAX_RECEIVE_WAIT: Duration = Duration::from_millis(100);
const MIN_RECEIVE_WAIT: Duration = Duration::from_millis(1);

type OnFinish = Box<dyn Fn(&HashMap<String, Statistics>) + Send + Sync>;

/// Pings a fixed set of addresses concurrently over one IPv4 and one IPv6 socket.
///
/// ```no_run
/// let mut pinger = batch_ping::BatchPinger::new(["127.0.0.1", "::1"], false)?;
/// pinger.set_count(3);
/// pinger.run()?;
/// for (address, statistics) in pinger.statistics() {
///     println!("{address}: {:.0}% loss", statistics.packet_loss * 100.0);
/// }
/// # Ok::<(), batch_ping::PingError>(())
/// ```
pub struct BatchPinger {
    addresses: Vec<String>,
    socket_type: SocketType,
    session: Session,
    interval: Duration,
    count: usize,
    timeout: Duration,
    source: Option<IpAddr>,
    debug: bool,
    on_finish: Option<OnFinish>,
    targets: Arc<TargetTable>,
}

impl BatchPinger {
    /// Raw sockets are used when `privileged` is set, datagram ICMP sockets otherwise.
    /// Fails if there are more addresses than sequence numbers.
    pub fn new<I, A>(addresses: I, privileged: bool) -> PingResult<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let addresses: Vec<String> = addresses.into_iter().map(Into::into).collect();
        let max = SequenceNumber::capacity();
        if addresses.len() > max {
            return Err(PingError::TooManyAddresses { count: addresses.len(), max });
        }
        Ok(BatchPinger {
            addresses,
            socket_type: SocketType::from_privileged(privileged),
            session: Session::new(),
            interval: DEFAULT_INTERVAL,
            count: DEFAULT_COUNT,
            timeout: DEFAULT_TIMEOUT,
            source: None,
            debug: false,
            on_finish: None,
            targets: Arc::new(TargetTable::default()),
        })
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn socket_type(&self) -> SocketType {
        self.socket_type
    }

    /// Time between two send rounds.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of echo requests sent to every address.
    pub fn set_count(&mut self, count: usize) {
        self.count = count;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Ends the run after `timeout`, regardless of how many packets were sent or received.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Local address to send from. Only the socket of the same family is bound.
    pub fn set_source(&mut self, source: IpAddr) {
        self.source = Some(source);
    }

    pub fn source(&self) -> Option<IpAddr> {
        self.source
    }

    /// Emits per-packet `tracing` debug events (drops, matches, send failures).
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Called by [`BatchPinger::finish`] with the statistics of every address.
    pub fn set_on_finish<F>(&mut self, on_finish: F)
    where
        F: Fn(&HashMap<String, Statistics>) + Send + Sync + 'static,
    {
        self.on_finish = Some(Box::new(on_finish));
    }

    /// Opens both sockets and pings every address until all rounds are sent or the
    /// timeout fires. Blocks until the run is over.
    ///
    /// Only configuration and startup problems are errors. Anything going wrong with
    /// individual packets shows up as loss in [`BatchPinger::statistics`].
    pub fn run(&mut self) -> PingResult<()> {
        let read_timeout = self.receive_wait();
        let socket_v4 = Socket::new(self.socket_type, AddressFamily::V4, self.source, read_timeout)
            .map_err(|source| PingError::SocketOpen { family: AddressFamily::V4, source })?;
        // On failure the IPv4 socket is closed when it goes out of scope.
        let socket_v6 = Socket::new(self.socket_type, AddressFamily::V6, self.source, read_timeout)
            .map_err(|source| PingError::SocketOpen { family: AddressFamily::V6, source })?;

        self.run_with_sockets(socket_v4, socket_v6, &Gate::new()).map(|_| ())
    }

    /// Statistics of the last run, keyed by address as given to [`BatchPinger::new`].
    /// Empty before the first run.
    pub fn statistics(&self) -> HashMap<String, Statistics> {
        self.targets.iter().map(|target| (target.address().to_owned(), target.statistics())).collect()
    }

    /// Hands the statistics to the `on_finish` callback, if there is one.
    pub fn finish(&self) {
        if let Some(on_finish) = &self.on_finish {
            on_finish(&self.statistics());
        }
    }

    fn receive_wait(&self) -> Duration {
        self.interval.clamp(MIN_RECEIVE_WAIT, MAX_RECEIVE_WAIT)
    }

    fn run_with_sockets<S>(&mut self, socket_v4: S, socket_v6: S, gate: &Gate) -> PingResult<Termination>
    where
        S: TSocket + 'static,
    {
        let targets = Arc::new(TargetTable::resolve(&self.addresses)?);
        self.targets = targets.clone();
        if self.debug {
            tracing::debug!(
                "session id {:#06x}, tracker {:#018x}, {} targets",
                self.session.identifier,
                self.session.tracker,
                targets.len()
            );
        }

        let icmpv4 = Arc::new(Icmp::new(AddressFamily::V4, socket_v4));
        let icmpv6 = Arc::new(Icmp::new(AddressFamily::V6, socket_v6));
        let correlator =
            Arc::new(Correlator::new(self.session, targets.clone(), self.socket_type.preserves_identifier()));

        let receiver_threads: Vec<JoinHandle<_>> = [icmpv4.clone(), icmpv6.clone()]
            .into_iter()
            .map(|icmp| {
                let receiver = PingReceiver::new(icmp, correlator.clone(), gate.clone(), self.debug);
                std::thread::spawn(move || receiver.run())
            })
            .collect();

        let schedule = SendSchedule { interval: self.interval, count: self.count, timeout: self.timeout };
        let sender = PingSender::new(icmpv4, icmpv6, targets, self.session, schedule, gate.clone(), self.debug);
        let sender_thread = std::thread::spawn(move || sender.run());

        // Join everything before reacting to a panic so no loop outlives the run.
        let sender_result = sender_thread.join();
        let receiver_results: Vec<_> = receiver_threads.into_iter().map(JoinHandle::join).collect();
        for receiver_result in receiver_results {
            match receiver_result {
                Ok(exit) => tracing::trace!("receiver exit: {:?}", exit),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        let termination = sender_result.unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        tracing::trace!("run finished: {:?}", termination);
        Ok(termination)
    }
}
