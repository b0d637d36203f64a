use crate::InTransitPacket;
use crate::network::ip::Ipv4Cidr;
use crate::network::queue::EgressQueue;
use crate::network::rate_limiter::RateLimiter;
use crate::network::route::RouteTable;
use crate::network::spec::NodeMetadata;
use crate::network::{InterfaceId, LinkId, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::sync::Arc;

pub struct Node {
    pub(crate) index: NodeId,
    pub(crate) id: Arc<str>,
    pub(crate) interfaces: Vec<InterfaceId>,
    pub(crate) routes: RouteTable,
    pub(crate) metadata: NodeMetadata,
}

impl Node {
    pub fn id(&self) -> &Arc<str> {
        &self.id
    }

    pub fn index(&self) -> NodeId {
        self.index
    }

    pub fn interfaces(&self) -> &[InterfaceId] {
        &self.interfaces
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn metadata(&self) -> &NodeMetadata {
        &self.metadata
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterfaceStatus {
    Up,
    Down,
}

impl Display for InterfaceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceStatus::Up => write!(f, "UP"),
            InterfaceStatus::Down => write!(f, "DOWN"),
        }
    }
}

pub struct Interface {
    pub(crate) index: InterfaceId,
    pub(crate) node: NodeId,
    pub(crate) link: LinkId,
    pub(crate) cidr: Ipv4Cidr,
    pub(crate) status: InterfaceStatus,
    pub(crate) queue: EgressQueue,
    /// The packet currently being put on the wire, if any
    pub(crate) transmitting: Option<Transmission>,
    pub(crate) rate_limiter: Option<RateLimiter>,
}

pub(crate) struct Transmission {
    pub(crate) data: InTransitPacket,
    /// The down epoch of the link when the transmission started
    pub(crate) epoch: u64,
}

/// What happens to a packet offered to an interface for sending
pub(crate) enum Offer {
    /// The interface is idle, so the packet can go on the wire right away
    Transmit(InTransitPacket),
    Queued,
    QueueFull(InTransitPacket),
}

impl Interface {
    pub fn index(&self) -> InterfaceId {
        self.index
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn link(&self) -> LinkId {
        self.link
    }

    pub fn address(&self) -> Ipv4Addr {
        self.cidr.address()
    }

    pub fn cidr(&self) -> Ipv4Cidr {
        self.cidr
    }

    pub fn status(&self) -> InterfaceStatus {
        self.status
    }

    pub fn is_up(&self) -> bool {
        self.status == InterfaceStatus::Up
    }

    pub fn queue(&self) -> &EgressQueue {
        &self.queue
    }

    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.rate_limiter.as_ref()
    }

    /// Returns whether the status actually changed
    pub(crate) fn update_status(&mut self, update: InterfaceStatus) -> bool {
        match (self.status, update) {
            (InterfaceStatus::Up, InterfaceStatus::Up)
            | (InterfaceStatus::Down, InterfaceStatus::Down) => false,
            (_, update) => {
                self.status = update;
                true
            }
        }
    }

    pub(crate) fn offer(&mut self, data: InTransitPacket) -> Offer {
        if self.transmitting.is_none() && self.queue.is_empty() {
            return Offer::Transmit(data);
        }

        match self.queue.enqueue(data) {
            Ok(()) => Offer::Queued,
            Err(data) => Offer::QueueFull(data),
        }
    }
}
