use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::time::Duration;
use uuid::Uuid;

pub const IPV4_OVERHEAD: usize = 20;
pub const UDP_OVERHEAD: usize = 8;
pub const TCP_OVERHEAD: usize = 20;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Protocol {
    Udp,
    Tcp,
}

impl Protocol {
    pub fn header_overhead(self) -> usize {
        match self {
            Protocol::Udp => UDP_OVERHEAD,
            Protocol::Tcp => TCP_OVERHEAD,
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Tcp => write!(f, "TCP"),
        }
    }
}

/// QoS class tag carried by every packet (lower is more urgent)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrafficClass(pub u8);

impl TrafficClass {
    pub const EXPEDITED: TrafficClass = TrafficClass(0);
    pub const BEST_EFFORT: TrafficClass = TrafficClass(1);
}

/// The 5-tuple identifying a flow
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowKey {
    pub source: Ipv4Addr,
    pub source_port: u16,
    pub destination: Ipv4Addr,
    pub destination_port: u16,
    pub protocol: Protocol,
}

impl FlowKey {
    /// The key of the flow going in the opposite direction
    pub fn reversed(&self) -> FlowKey {
        FlowKey {
            source: self.destination,
            source_port: self.destination_port,
            destination: self.source,
            destination_port: self.source_port,
            protocol: self.protocol,
        }
    }
}

impl Display for FlowKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} ({})",
            self.source, self.source_port, self.destination, self.destination_port, self.protocol
        )
    }
}

/// A packet descriptor, immutable once created
#[derive(Clone, Debug)]
pub struct Packet {
    id: Uuid,
    number: u64,
    flow: FlowKey,
    class: TrafficClass,
    payload_bytes: usize,
    ipsec_overhead_bytes: usize,
    created_at: Duration,
}

impl Packet {
    pub(crate) fn new(
        id: Uuid,
        number: u64,
        flow: FlowKey,
        class: TrafficClass,
        payload_bytes: usize,
        ipsec_overhead_bytes: Option<usize>,
        created_at: Duration,
    ) -> Self {
        Self {
            id,
            number,
            flow,
            class,
            payload_bytes,
            ipsec_overhead_bytes: ipsec_overhead_bytes.unwrap_or(0),
            created_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn flow(&self) -> &FlowKey {
        &self.flow
    }

    pub fn class(&self) -> TrafficClass {
        self.class
    }

    pub fn payload_bytes(&self) -> usize {
        self.payload_bytes
    }

    pub fn created_at(&self) -> Duration {
        self.created_at
    }

    /// Whether the packet is IPsec-protected
    pub fn is_encrypted(&self) -> bool {
        self.ipsec_overhead_bytes > 0
    }

    /// The size of the packet as seen on the wire, including IP and transport headers
    pub fn size_bytes(&self) -> usize {
        IPV4_OVERHEAD
            + self.flow.protocol.header_overhead()
            + self.ipsec_overhead_bytes
            + self.payload_bytes
    }

    /// Creates the mirrored packet an echo responder sends back
    pub(crate) fn mirrored(&self, id: Uuid, number: u64, now: Duration) -> Packet {
        Packet {
            id,
            number,
            flow: self.flow.reversed(),
            created_at: now,
            ..self.clone()
        }
    }
}
