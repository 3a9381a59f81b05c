use crate::icmp::Ttl;
use std::net::IpAddr;
use std::time::Duration;

/// Result of pinging one address.
#[derive(Clone, Debug, PartialEq)]
pub struct Statistics {
    /// The address as it was handed to `BatchPinger::new`.
    pub address: String,
    pub ip_addr: IpAddr,
    pub packets_sent: usize,
    pub packets_received: usize,
    /// Fraction of lost packets in `[0, 1]`.
    pub packet_loss: f64,
    /// Round trip times in order of arrival.
    pub rtts: Vec<Duration>,
    pub min_rtt: Duration,
    pub max_rtt: Duration,
    pub avg_rtt: Duration,
    /// Population standard deviation of `rtts`.
    pub std_dev_rtt: Duration,
    /// Hop count of the last reply, where the socket reports it.
    pub ttl: Option<Ttl>,
}

impl Statistics {
    pub(crate) fn new(
        address: String,
        ip_addr: IpAddr,
        packets_sent: usize,
        packets_received: usize,
        rtts: Vec<Duration>,
        ttl: Option<Ttl>,
    ) -> Self {
        let min_rtt = rtts.iter().min().copied().unwrap_or_default();
        let max_rtt = rtts.iter().max().copied().unwrap_or_default();
        let (avg_rtt, std_dev_rtt) = mean_and_std_dev(&rtts);
        Statistics {
            address,
            ip_addr,
            packets_sent,
            packets_received,
            packet_loss: packet_loss(packets_sent, packets_received),
            rtts,
            min_rtt,
            max_rtt,
            avg_rtt,
            std_dev_rtt,
            ttl,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn packet_loss(sent: usize, received: usize) -> f64 {
    if sent == 0 {
        return 0.0;
    }
    sent.saturating_sub(received) as f64 / sent as f64
}

#[allow(clippy::cast_precision_loss)]
fn mean_and_std_dev(rtts: &[Duration]) -> (Duration, Duration) {
    if rtts.is_empty() {
        return (Duration::ZERO, Duration::ZERO);
    }
    let n = rtts.len() as f64;
    let mean = rtts.iter().map(Duration::as_secs_f64).sum::<f64>() / n;
    let variance = rtts.iter().map(|rtt| (rtt.as_secs_f64() - mean).powi(2)).sum::<f64>() / n;
    (Duration::from_secs_f64(mean), Duration::from_secs_f64(variance.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn statistics(sent: usize, received: usize, rtts_ms: &[u64]) -> Statistics {
        let rtts = rtts_ms.iter().map(|ms| Duration::from_millis(*ms)).collect();
        Statistics::new("host".to_owned(), IpAddr::V4(Ipv4Addr::LOCALHOST), sent, received, rtts, None)
    }

    fn assert_close(expected: Duration, actual: Duration) {
        let diff = if expected > actual { expected - actual } else { actual - expected };
        assert!(diff < Duration::from_micros(1), "expected {expected:?}, got {actual:?}");
    }

    #[test]
    fn nothing_sent_means_no_loss() {
        let statistics = statistics(0, 0, &[]);

        assert!(statistics.packet_loss.abs() < f64::EPSILON);
        assert_eq!(Duration::ZERO, statistics.min_rtt);
        assert_eq!(Duration::ZERO, statistics.max_rtt);
        assert_eq!(Duration::ZERO, statistics.avg_rtt);
        assert_eq!(Duration::ZERO, statistics.std_dev_rtt);
    }

    #[test]
    fn nothing_received_means_total_loss() {
        let statistics = statistics(5, 0, &[]);
        assert!((statistics.packet_loss - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_loss() {
        let statistics = statistics(4, 3, &[1, 2, 3]);
        assert!((statistics.packet_loss - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn loss_never_negative() {
        // A host answering twice must not produce negative loss.
        let statistics = statistics(1, 2, &[1, 1]);
        assert!(statistics.packet_loss.abs() < f64::EPSILON);
    }

    #[test]
    fn rtt_aggregates() {
        let statistics = statistics(8, 8, &[2, 4, 4, 4, 5, 5, 7, 9]);

        assert_eq!(Duration::from_millis(2), statistics.min_rtt);
        assert_eq!(Duration::from_millis(9), statistics.max_rtt);
        assert_close(Duration::from_millis(5), statistics.avg_rtt);
        assert_close(Duration::from_millis(2), statistics.std_dev_rtt);
    }

    #[test]
    fn single_sample_has_no_deviation() {
        let statistics = statistics(1, 1, &[12]);

        assert_eq!(Duration::from_millis(12), statistics.min_rtt);
        assert_close(Duration::from_millis(12), statistics.avg_rtt);
        assert_close(Duration::ZERO, statistics.std_dev_rtt);
    }
}
