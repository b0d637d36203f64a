use anyhow::{Context, bail};
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use std::net::Ipv4Addr;
use std::time::Duration;
use wan_network::error::duration_from_secs;
use wan_network::network::event::{NetworkEvent, NetworkEventPayload, UpdateLinkStatus};
use wan_network::network::ip::Ipv4Cidr;
use wan_network::network::node::InterfaceStatus;
use wan_network::network::spec::{
    NetworkInterface, NetworkLinkSpec, NetworkNodeSpec, NetworkSpec, NodeMetadata, QosSpec,
    QueueLimit, RouteSpec,
};

#[derive(Deserialize, Clone)]
pub struct NetworkSpecJson {
    nodes: Vec<NetworkNodeJson>,
    links: Vec<NetworkLinkJson>,
}

#[derive(Deserialize, Clone)]
struct NetworkNodeJson {
    id: String,
    interfaces: Vec<NetworkInterfaceJson>,
    #[serde(default)]
    routes: Vec<NetworkRouteJson>,
    /// Passed through for visualizers
    label: Option<String>,
    position: Option<(f64, f64)>,
    color: Option<(u8, u8, u8)>,
}

#[derive(Deserialize, Clone)]
struct NetworkInterfaceJson {
    /// The address with its prefix length, e.g. `10.0.0.1/24`
    address: Ipv4Cidr,
}

#[serde_as]
#[derive(Deserialize, Clone)]
struct NetworkRouteJson {
    destination: Ipv4Cidr,
    #[serde_as(as = "DisplayFromStr")]
    next: Ipv4Addr,
    #[serde(default = "default_metric")]
    metric: u32,
}

fn default_metric() -> u32 {
    1
}

#[serde_as]
#[derive(Deserialize, Clone)]
struct NetworkLinkJson {
    id: String,
    #[serde_as(as = "DisplayFromStr")]
    source: Ipv4Addr,
    #[serde_as(as = "DisplayFromStr")]
    target: Ipv4Addr,
    /// The link's bandwidth, in bits per second
    bandwidth_bps: u64,
    /// The delay of the link, in milliseconds
    delay_ms: f64,
    /// The maximum number of packets in each queue band (defaults to 100, unless `queue_bytes`
    /// is set)
    queue_packets: Option<usize>,
    /// The maximum number of bytes in each queue band
    queue_bytes: Option<usize>,
    /// Band for each traffic class, enabling strict-priority queueing
    priomap: Option<Vec<u8>>,
    /// The cost of the link when routes are computed
    #[serde(default = "default_metric")]
    metric: u32,
    /// The ratio of packets that will be lost (the value must be between 0 and 1)
    #[serde(default)]
    packet_loss_ratio: f64,
}

impl TryFrom<NetworkSpecJson> for NetworkSpec {
    type Error = anyhow::Error;

    fn try_from(json: NetworkSpecJson) -> Result<Self, Self::Error> {
        let nodes = json
            .nodes
            .into_iter()
            .map(|n| NetworkNodeSpec {
                id: n.id,
                interfaces: n
                    .interfaces
                    .into_iter()
                    .map(|i| NetworkInterface { address: i.address })
                    .collect(),
                routes: n
                    .routes
                    .into_iter()
                    .map(|r| RouteSpec {
                        destination: r.destination,
                        next_hop: r.next,
                        metric: r.metric,
                    })
                    .collect(),
                metadata: NodeMetadata {
                    label: n.label,
                    position: n.position,
                    color: n.color,
                },
            })
            .collect();

        let links = json
            .links
            .into_iter()
            .map(NetworkLinkSpec::try_from)
            .collect::<anyhow::Result<_>>()?;

        Ok(Self { nodes, links })
    }
}

impl TryFrom<NetworkLinkJson> for NetworkLinkSpec {
    type Error = anyhow::Error;

    fn try_from(l: NetworkLinkJson) -> Result<Self, Self::Error> {
        let queue = match (l.queue_packets, l.queue_bytes) {
            (None, None) => QueueLimit::default(),
            (max_packets, max_bytes) => QueueLimit {
                max_packets,
                max_bytes,
            },
        };

        let delay = duration_from_secs(l.delay_ms / 1000.0)
            .with_context(|| format!("invalid delay for network link `{}`", l.id))?;

        Ok(NetworkLinkSpec {
            id: l.id,
            source: l.source,
            target: l.target,
            delay,
            bandwidth_bps: l.bandwidth_bps,
            queue,
            qos: l.priomap.map(|priomap| QosSpec { priomap }),
            metric: l.metric,
            packet_loss_ratio: l.packet_loss_ratio,
        })
    }
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
enum StatusJson {
    Up,
    Down,
}

#[derive(Deserialize, Clone)]
pub struct NetworkEventJson {
    relative_time_ms: u64,
    link: Option<LinkEventJson>,
    interface: Option<InterfaceEventJson>,
    #[serde(default)]
    recompute_routes: bool,
}

#[derive(Deserialize, Clone)]
struct LinkEventJson {
    id: String,
    status: StatusJson,
}

#[serde_as]
#[derive(Deserialize, Clone)]
struct InterfaceEventJson {
    node: String,
    #[serde_as(as = "DisplayFromStr")]
    address: Ipv4Addr,
    status: StatusJson,
}

impl TryFrom<NetworkEventJson> for NetworkEvent {
    type Error = anyhow::Error;

    fn try_from(json: NetworkEventJson) -> Result<Self, Self::Error> {
        let payload = match (json.link, json.interface, json.recompute_routes) {
            (Some(link), None, false) => NetworkEventPayload::LinkStatus {
                link_id: link.id,
                status: match link.status {
                    StatusJson::Up => UpdateLinkStatus::Up,
                    StatusJson::Down => UpdateLinkStatus::Down,
                },
            },
            (None, Some(interface), false) => NetworkEventPayload::InterfaceStatus {
                node_id: interface.node,
                address: interface.address,
                status: match interface.status {
                    StatusJson::Up => InterfaceStatus::Up,
                    StatusJson::Down => InterfaceStatus::Down,
                },
            },
            (None, None, true) => NetworkEventPayload::RecomputeRoutes,
            _ => bail!(
                "network event at {}ms must have exactly one of `link`, `interface` or `recompute_routes`",
                json.relative_time_ms
            ),
        };

        Ok(NetworkEvent {
            relative_time: Duration::from_millis(json.relative_time_ms),
            payload,
        })
    }
}
