use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
pub struct CliOpt {
    /// Whether the run should be non-deterministic, i.e. using a non-constant seed for the random
    /// number generator
    #[arg(long, global = true)]
    pub non_deterministic: bool,

    /// The random seed used for the simulated network (governing injected packet loss and packet
    /// ids)
    #[arg(long, global = true, default_value_t = 42)]
    pub network_rng_seed: u64,

    /// Path where the replay log will be stored
    #[arg(long, global = true, default_value = "replay-log.json")]
    pub replay_log: PathBuf,

    /// Path where the per-flow statistics will be stored
    #[arg(long, global = true, default_value = "flow-stats.json")]
    pub flow_stats: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Three sites in a triangle, where the direct HQ-DC link fails
    Failover(FailoverOpt),
    /// A VoIP call competing with bulk transfers over a bottleneck
    Qos(QosOpt),
    /// A client under a DDoS attack, with optional rate limiting, IPsec and eavesdropping
    Security(SecurityOpt),
    /// A remote link failure, handled with static or dynamic routing
    MultiHop(MultiHopOpt),
    /// Traffic steered through two clouds by a periodic policy
    Policy(PolicyOpt),
    /// A simulation described by JSON files
    Custom(CustomOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct FailoverOpt {
    /// The duration of the run, in seconds
    #[arg(long, default_value = "20", value_parser = parse_secs)]
    pub duration: Duration,

    /// When the HQ-DC link goes down, in seconds
    #[arg(long, default_value = "10", value_parser = parse_secs)]
    pub failure_at: Duration,

    /// When the HQ-DC link comes back up, in seconds
    #[arg(long, value_parser = parse_secs)]
    pub restore_at: Option<Duration>,

    /// Keep the HQ-DC link up for the whole run
    #[arg(long)]
    pub no_failure: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct QosOpt {
    /// Use a single FIFO queue per link instead of strict-priority bands
    #[arg(long)]
    pub no_qos: bool,

    /// The number of packets each queue band can hold
    #[arg(long, default_value_t = 50)]
    pub queue_packets: usize,

    /// The duration of the run, in seconds
    #[arg(long, default_value = "30", value_parser = parse_secs)]
    pub duration: Duration,
}

#[derive(Parser, Debug, Clone)]
pub struct SecurityOpt {
    /// Let attackers flood the server, starting at 10 seconds
    #[arg(long)]
    pub ddos: bool,

    /// The number of attackers, when `--ddos` is set
    #[arg(long, default_value_t = 5)]
    pub attackers: u8,

    /// Per-source rate limit at the router, in bits per second
    #[arg(long)]
    pub rate_limit_bps: Option<u64>,

    /// Protect the legitimate traffic with IPsec
    #[arg(long)]
    pub ipsec: bool,

    /// Count the packets that go through the router
    #[arg(long)]
    pub eavesdrop: bool,

    /// The duration of the run, in seconds
    #[arg(long, default_value = "40", value_parser = parse_secs)]
    pub duration: Duration,
}

#[derive(Parser, Debug, Clone)]
pub struct MultiHopOpt {
    /// Recompute routes when an interface changes state, instead of using static tables
    #[arg(long)]
    pub dynamic_routing: bool,

    /// When the DC's interface towards the DR site goes down, in seconds
    #[arg(long, default_value = "10", value_parser = parse_secs)]
    pub failure_at: Duration,

    /// When the DC's interface towards the DR site comes back up, in seconds (never, if absent)
    #[arg(long, value_parser = parse_secs)]
    pub restore_at: Option<Duration>,

    /// The duration of the run, in seconds
    #[arg(long, default_value = "30", value_parser = parse_secs)]
    pub duration: Duration,
}

#[derive(Parser, Debug, Clone)]
pub struct PolicyOpt {
    /// How long the router keeps a next hop before switching, in seconds
    #[arg(long, default_value = "5", value_parser = parse_secs)]
    pub period: Duration,

    /// The duration of the run, in seconds
    #[arg(long, default_value = "32", value_parser = parse_secs)]
    pub duration: Duration,
}

#[derive(Parser, Debug, Clone)]
pub struct CustomOpt {
    /// Path to the JSON file containing the network graph
    #[arg(long)]
    pub network_graph: PathBuf,

    /// Path to the JSON file containing the network events
    #[arg(long)]
    pub network_events: Option<PathBuf>,

    /// Path to the JSON file containing the traffic sources and per-node features
    #[arg(long)]
    pub traffic: PathBuf,

    /// The duration of the run, in seconds
    #[arg(long, value_parser = parse_secs)]
    pub duration: Duration,
}

/// Parses a non-negative amount of (possibly fractional) seconds
pub fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a number of seconds"))?;
    wan_network::error::duration_from_secs(secs).map_err(|e| e.to_string())
}
