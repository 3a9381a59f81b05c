use batch_ping::{BatchPinger, Statistics};
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

type GenericError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(argh::FromArgs)]
/// batch-ping - send ICMP ECHO_REQUEST to many hosts at once
struct Args {
    #[argh(option, short = 'c', default = "5")]
    /// number of echo requests per host
    count: usize,

    #[argh(option, short = 'i', default = "1000")]
    /// milliseconds between two rounds
    interval: u64,

    #[argh(option, short = 't', default = "100_000")]
    /// seconds until the run is cut short
    timeout: u64,

    #[argh(option, short = 'S')]
    /// source address to send from
    source: Option<IpAddr>,

    #[argh(switch)]
    /// use raw sockets (needs root or CAP_NET_RAW)
    privileged: bool,

    #[argh(switch, short = 'd')]
    /// log every packet
    debug: bool,

    #[argh(positional)]
    /// host names or IP addresses
    addresses: Vec<String>,
}

fn print_statistics(addresses: &[String], statistics: &HashMap<String, Statistics>) {
    for address in addresses {
        let Some(s) = statistics.get(address) else {
            continue;
        };
        println!("--- {} ({}) ping statistics ---", s.address, s.ip_addr);
        println!(
            "{} packets transmitted, {} packets received, {:.1}% packet loss",
            s.packets_sent,
            s.packets_received,
            s.packet_loss * 100.0
        );
        if !s.rtts.is_empty() {
            println!(
                "round-trip min/avg/max/stddev = {:?}/{:?}/{:?}/{:?}",
                s.min_rtt, s.avg_rtt, s.max_rtt, s.std_dev_rtt
            );
        }
        if let Some(ttl) = s.ttl {
            println!("ttl = {}", ttl);
        }
    }
}

fn main() -> Result<(), GenericError> {
    let args: Args = argh::from_env();

    let level = if args.debug { tracing::Level::DEBUG } else { tracing::Level::WARN };
    let subscriber = tracing_subscriber::FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let addresses = args.addresses.clone();
    let mut pinger = BatchPinger::new(args.addresses, args.privileged)?;
    pinger.set_count(args.count);
    pinger.set_interval(Duration::from_millis(args.interval));
    pinger.set_timeout(Duration::from_secs(args.timeout));
    pinger.set_debug(args.debug);
    if let Some(source) = args.source {
        pinger.set_source(source);
    }
    pinger.set_on_finish(move |statistics| print_statistics(&addresses, statistics));

    pinger.run()?;
    pinger.finish();
    Ok(())
}
