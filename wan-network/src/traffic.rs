//! Traffic generators and echo responders

use crate::error::{ConfigError, MAX_SETUP_TIME};
use crate::network::NodeId;
use crate::network::link::transmission_time;
use crate::packet::{FlowKey, IPV4_OVERHEAD, Protocol, TrafficClass};
use crate::scheduler::EventHandle;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

/// First port handed out to sources without an explicit source port
pub const FIRST_EPHEMERAL_PORT: u16 = 49153;
pub const DEFAULT_SEGMENT_SIZE: usize = 1460;

#[derive(Clone, Debug)]
pub struct SourceSpec {
    pub id: String,
    pub node: String,
    /// Defaults to the address of the node's first interface
    pub source_address: Option<Ipv4Addr>,
    /// Defaults to an ephemeral port
    pub source_port: Option<u16>,
    pub destination: Ipv4Addr,
    pub destination_port: u16,
    pub kind: SourceKind,
    pub start: Duration,
    /// Runs until the end of the simulation if not set
    pub stop: Option<Duration>,
    /// Overrides the class implied by the kind of source
    pub traffic_class: Option<TrafficClass>,
    pub ipsec: bool,
}

#[derive(Clone, Debug)]
pub enum SourceKind {
    /// Fixed-size packets at a fixed interval, meant to be answered by an echo responder
    Echo {
        packet_size: usize,
        interval: Duration,
        max_packets: u64,
    },
    /// VoIP-like traffic
    ConstantCadence {
        packet_size: usize,
        data_rate_bps: u64,
        max_packets: Option<u64>,
    },
    /// FTP-like traffic: back-to-back TCP segments until `max_bytes` are sent
    Bulk {
        segment_size: usize,
        max_bytes: u64,
        /// Defaults to the bandwidth of the source's first-hop link
        pace_bps: Option<u64>,
    },
    /// Unbounded traffic at a fixed rate
    Flood {
        packet_size: usize,
        data_rate_bps: u64,
    },
}

impl SourceKind {
    pub fn protocol(&self) -> Protocol {
        match self {
            SourceKind::Bulk { .. } => Protocol::Tcp,
            _ => Protocol::Udp,
        }
    }

    pub fn default_class(&self) -> TrafficClass {
        match self {
            SourceKind::ConstantCadence { .. } => TrafficClass::EXPEDITED,
            _ => TrafficClass::BEST_EFFORT,
        }
    }
}

impl SourceSpec {
    pub fn new(
        id: impl Into<String>,
        node: impl Into<String>,
        destination: Ipv4Addr,
        destination_port: u16,
        kind: SourceKind,
    ) -> Self {
        Self {
            id: id.into(),
            node: node.into(),
            source_address: None,
            source_port: None,
            destination,
            destination_port,
            kind,
            start: Duration::ZERO,
            stop: None,
            traffic_class: None,
            ipsec: false,
        }
    }

    pub fn starting_at(mut self, start: Duration) -> Self {
        self.start = start;
        self
    }

    pub fn stopping_at(mut self, stop: Option<Duration>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_source_address(mut self, address: Ipv4Addr) -> Self {
        self.source_address = Some(address);
        self
    }

    pub fn with_class(mut self, class: TrafficClass) -> Self {
        self.traffic_class = Some(class);
        self
    }

    pub fn with_ipsec(mut self, ipsec: bool) -> Self {
        self.ipsec = ipsec;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::InvalidSource {
                source_id: self.id.as_str().into(),
                reason: reason.to_string(),
            })
        };

        if self.stop.is_some_and(|stop| stop <= self.start) {
            return invalid("stop time must be after the start time");
        }
        if self.start > MAX_SETUP_TIME || self.stop.is_some_and(|stop| stop > MAX_SETUP_TIME) {
            return invalid("start and stop times are too far in the future");
        }

        match self.kind {
            SourceKind::Echo {
                packet_size,
                interval,
                max_packets,
            } => {
                if packet_size == 0 {
                    return invalid("packet size must be positive");
                }
                if interval.is_zero() {
                    return invalid("interval must be positive");
                }
                if interval > MAX_SETUP_TIME {
                    return invalid("interval is too long");
                }
                if max_packets == 0 {
                    return invalid("max packets must be positive");
                }
            }
            SourceKind::ConstantCadence {
                packet_size,
                data_rate_bps,
                max_packets,
            } => {
                if packet_size == 0 {
                    return invalid("packet size must be positive");
                }
                if data_rate_bps == 0 {
                    return invalid("data rate must be positive");
                }
                if max_packets == Some(0) {
                    return invalid("max packets must be positive");
                }
            }
            SourceKind::Bulk {
                segment_size,
                max_bytes,
                pace_bps,
            } => {
                if segment_size == 0 {
                    return invalid("segment size must be positive");
                }
                if max_bytes == 0 {
                    return invalid("max bytes must be positive");
                }
                if pace_bps == Some(0) {
                    return invalid("pace must be positive");
                }
            }
            SourceKind::Flood {
                packet_size,
                data_rate_bps,
            } => {
                if packet_size == 0 {
                    return invalid("packet size must be positive");
                }
                if data_rate_bps == 0 {
                    return invalid("data rate must be positive");
                }
            }
        }

        Ok(())
    }
}

/// Mirrors every UDP packet delivered to `node` on `port` back to its sender
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EchoServerSpec {
    pub node: String,
    pub port: u16,
}

/// The next packet a source wants to send
pub(crate) struct Emission {
    pub(crate) payload_bytes: usize,
    /// Time until the packet after this one, `None` once the budget is exhausted
    pub(crate) next_in: Option<Duration>,
}

/// A running traffic source
pub(crate) struct TrafficSource {
    pub(crate) id: Arc<str>,
    pub(crate) node: NodeId,
    pub(crate) flow: FlowKey,
    pub(crate) class: TrafficClass,
    pub(crate) ipsec: bool,
    kind: SourceKind,
    /// Resolved pace of bulk sources
    pace_bps: u64,
    wire_overhead: usize,
    sent_packets: u64,
    sent_bytes: u64,
    pub(crate) pending_tick: Option<EventHandle>,
    pub(crate) stopped: bool,
}

impl TrafficSource {
    pub(crate) fn new(
        spec: &SourceSpec,
        node: NodeId,
        flow: FlowKey,
        pace_bps: u64,
        ipsec_overhead_bytes: Option<usize>,
    ) -> Self {
        Self {
            id: spec.id.as_str().into(),
            node,
            flow,
            class: spec
                .traffic_class
                .unwrap_or_else(|| spec.kind.default_class()),
            ipsec: spec.ipsec,
            kind: spec.kind.clone(),
            pace_bps,
            wire_overhead: IPV4_OVERHEAD
                + flow.protocol.header_overhead()
                + ipsec_overhead_bytes.unwrap_or(0),
            sent_packets: 0,
            sent_bytes: 0,
            pending_tick: None,
            stopped: false,
        }
    }

    pub(crate) fn sent_packets(&self) -> u64 {
        self.sent_packets
    }

    /// Produces the next packet, or `None` if the budget was already exhausted
    pub(crate) fn tick(&mut self) -> Option<Emission> {
        let (payload_bytes, next_in, exhausted) = match self.kind {
            SourceKind::Echo {
                packet_size,
                interval,
                max_packets,
            } => {
                if self.sent_packets >= max_packets {
                    return None;
                }
                (
                    packet_size,
                    interval,
                    self.sent_packets + 1 >= max_packets,
                )
            }
            SourceKind::ConstantCadence {
                packet_size,
                data_rate_bps,
                max_packets,
            } => {
                if max_packets.is_some_and(|max| self.sent_packets >= max) {
                    return None;
                }
                (
                    packet_size,
                    transmission_time(packet_size, data_rate_bps),
                    max_packets.is_some_and(|max| self.sent_packets + 1 >= max),
                )
            }
            SourceKind::Bulk {
                segment_size,
                max_bytes,
                ..
            } => {
                let remaining = max_bytes.saturating_sub(self.sent_bytes);
                if remaining == 0 {
                    return None;
                }
                let segment = (segment_size as u64).min(remaining) as usize;
                (
                    segment,
                    transmission_time(segment + self.wire_overhead, self.pace_bps),
                    self.sent_bytes + segment as u64 >= max_bytes,
                )
            }
            SourceKind::Flood {
                packet_size,
                data_rate_bps,
            } => (
                packet_size,
                transmission_time(packet_size, data_rate_bps),
                false,
            ),
        };

        self.sent_packets += 1;
        self.sent_bytes += payload_bytes as u64;
        Some(Emission {
            payload_bytes,
            next_in: (!exhausted).then_some(next_in),
        })
    }
}
