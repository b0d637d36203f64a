use crate::flow_monitor::DropReason;
use crate::network::ip::Ipv4Cidr;
use crate::network::link::LinkStatus;
use crate::network::node::InterfaceStatus;
use crate::network::route::RouteOrigin;
use crate::packet::FlowKey;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, DurationNanoSeconds, serde_as};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationStep {
    #[serde_as(as = "DurationNanoSeconds")]
    #[serde(rename = "relative_time_ns")]
    pub relative_time: Duration,
    #[serde(flatten)]
    pub kind: SimulationStepKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum SimulationStepKind {
    /// A traffic source or echo responder created the packet
    PacketCreated(PacketCreated),
    /// The packet is in one of the network nodes
    PacketInNode(GenericPacketEvent),
    /// The packet is being transferred over a link
    PacketInTransit(PacketInTransit),
    /// The packet was dropped by one of the network nodes
    PacketDropped(PacketDropped),
    /// The packet reached its destination
    PacketDelivered(GenericPacketEvent),
    InterfaceStatusChanged(InterfaceStatusChanged),
    RouteChanged(RouteChanged),
    /// All route tables were recomputed from the operational link graph
    RoutesRecomputed(RoutesRecomputed),
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketCreated {
    #[serde_as(as = "DisplayFromStr")]
    pub packet_id: Uuid,
    pub packet_number: u64,
    pub packet_size_bytes: usize,
    pub node_id: Arc<str>,
    pub flow: FlowKey,
    pub encrypted: bool,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenericPacketEvent {
    #[serde_as(as = "DisplayFromStr")]
    pub packet_id: Uuid,
    pub packet_number: u64,
    pub packet_size_bytes: usize,
    pub node_id: Arc<str>,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketDropped {
    #[serde_as(as = "DisplayFromStr")]
    pub packet_id: Uuid,
    pub node_id: Arc<str>,
    pub reason: DropReason,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketInTransit {
    #[serde_as(as = "DisplayFromStr")]
    pub packet_id: Uuid,
    pub node_id: Arc<str>,
    pub link_id: Arc<str>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InterfaceStatusChanged {
    pub node_id: Arc<str>,
    pub address: Ipv4Addr,
    pub link_id: Arc<str>,
    pub status: InterfaceStatus,
    /// Present when the change made the link go up or down
    pub link_status: Option<LinkStatus>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteChange {
    Added,
    Removed,
}

impl RouteChange {
    pub fn is_added(self) -> bool {
        self == RouteChange::Added
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteChanged {
    pub node_id: Arc<str>,
    pub change: RouteChange,
    pub destination: Ipv4Cidr,
    pub next_hop: Option<Ipv4Addr>,
    pub metric: u32,
    pub origin: RouteOrigin,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoutesRecomputed {
    pub changed_nodes: usize,
}
