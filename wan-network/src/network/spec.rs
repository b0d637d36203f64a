use crate::network::ip::Ipv4Cidr;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Links without an explicit queue limit hold up to this many packets per band
pub const DEFAULT_QUEUE_PACKETS: usize = 100;

#[derive(Clone, Debug)]
pub struct NetworkSpec {
    pub nodes: Vec<NetworkNodeSpec>,
    pub links: Vec<NetworkLinkSpec>,
}

#[derive(Clone, Debug)]
pub struct NetworkNodeSpec {
    pub id: String,
    pub interfaces: Vec<NetworkInterface>,
    pub routes: Vec<RouteSpec>,
    pub metadata: NodeMetadata,
}

#[derive(Clone, Debug)]
pub struct NetworkInterface {
    pub address: Ipv4Cidr,
}

/// Inert presentation data, passed through untouched for external visualizers
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeMetadata {
    pub label: Option<String>,
    pub position: Option<(f64, f64)>,
    pub color: Option<(u8, u8, u8)>,
}

#[derive(Clone, Debug)]
pub struct RouteSpec {
    pub destination: Ipv4Cidr,
    /// The egress interface is the one whose subnet contains the next hop
    pub next_hop: Ipv4Addr,
    pub metric: u32,
}

#[derive(Clone, Debug)]
pub struct NetworkLinkSpec {
    pub id: String,
    pub source: Ipv4Addr,
    pub target: Ipv4Addr,
    pub delay: Duration,
    pub bandwidth_bps: u64,
    pub queue: QueueLimit,
    pub qos: Option<QosSpec>,
    /// Cost of the link when routes are computed globally
    pub metric: u32,
    pub packet_loss_ratio: f64,
}

impl NetworkLinkSpec {
    pub fn new(
        id: impl Into<String>,
        source: Ipv4Addr,
        target: Ipv4Addr,
        bandwidth_bps: u64,
        delay: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            target,
            delay,
            bandwidth_bps,
            queue: QueueLimit::default(),
            qos: None,
            metric: 1,
            packet_loss_ratio: 0.0,
        }
    }
}

/// Occupancy limit of a single queue band
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueLimit {
    pub max_packets: Option<usize>,
    pub max_bytes: Option<usize>,
}

impl QueueLimit {
    pub fn packets(max_packets: usize) -> Self {
        Self {
            max_packets: Some(max_packets),
            max_bytes: None,
        }
    }
}

impl Default for QueueLimit {
    fn default() -> Self {
        Self::packets(DEFAULT_QUEUE_PACKETS)
    }
}

/// Strict-priority queueing, mapping traffic classes to bands (band 0 is served first)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QosSpec {
    /// Band for each traffic class; classes beyond the end use the last entry
    pub priomap: Vec<u8>,
}

impl Default for QosSpec {
    fn default() -> Self {
        Self { priomap: vec![0, 1] }
    }
}
