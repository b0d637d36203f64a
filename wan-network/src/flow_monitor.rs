//! Per-flow statistics, drop accounting and eavesdropping counters

use crate::packet::{FlowKey, Packet};
use serde::{Deserialize, Serialize};
use serde_with::{DurationSecondsWithFrac, serde_as};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::time::Duration;
use uuid::Uuid;

/// Why a packet never reached its destination
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropReason {
    NoRoute,
    LinkDown,
    QueueFull,
    RateLimited,
    TtlExpired,
    InjectedLoss,
}

impl Display for DropReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            DropReason::NoRoute => "no route",
            DropReason::LinkDown => "link down",
            DropReason::QueueFull => "queue full",
            DropReason::RateLimited => "rate limited",
            DropReason::TtlExpired => "hop limit exceeded",
            DropReason::InjectedLoss => "injected loss",
        };
        f.write_str(reason)
    }
}

#[serde_as]
#[derive(Clone, Debug, Default, Serialize)]
pub struct FlowStats {
    pub tx_packets: u64,
    pub rx_packets: u64,
    /// Only meaningful after the monitor has been finalized
    pub lost_packets: u64,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub delay_sum: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub jitter_sum: Duration,
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub first_tx: Option<Duration>,
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub last_tx: Option<Duration>,
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub first_rx: Option<Duration>,
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub last_rx: Option<Duration>,
    pub drops: BTreeMap<DropReason, u64>,
    #[serde(skip)]
    last_delay: Option<Duration>,
}

impl FlowStats {
    pub fn loss_ratio(&self) -> f64 {
        if self.tx_packets == 0 {
            0.0
        } else {
            self.lost_packets as f64 / self.tx_packets as f64
        }
    }

    pub fn average_delay(&self) -> Option<Duration> {
        let rx = u32::try_from(self.rx_packets).ok().filter(|&rx| rx > 0)?;
        Some(self.delay_sum / rx)
    }

    pub fn average_jitter(&self) -> Option<Duration> {
        let samples = u32::try_from(self.rx_packets.checked_sub(1)?)
            .ok()
            .filter(|&n| n > 0)?;
        Some(self.jitter_sum / samples)
    }

    /// Received bits per second, measured from the first transmission to the last reception
    pub fn throughput_bps(&self) -> f64 {
        let (Some(first_tx), Some(last_rx)) = (self.first_tx, self.last_rx) else {
            return 0.0;
        };

        let elapsed = last_rx.saturating_sub(first_tx).as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.rx_bytes as f64 * 8.0 / elapsed
        }
    }

    pub fn dropped_packets(&self) -> u64 {
        self.drops.values().sum()
    }
}

/// Packets seen by eavesdropping nodes
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EavesdropStats {
    pub intercepted: u64,
    /// Intercepted packets that were not IPsec-protected
    pub exposed: u64,
}

/// The reporting record of a single flow
#[serde_as]
#[derive(Clone, Debug, Serialize)]
pub struct FlowRecord {
    pub id: u32,
    pub flow: FlowKey,
    pub stats: FlowStats,
    pub loss_ratio: f64,
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub average_delay: Option<Duration>,
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub average_jitter: Option<Duration>,
    pub throughput_bps: f64,
}

#[derive(Default)]
pub struct FlowMonitor {
    flow_ids: HashMap<FlowKey, usize>,
    /// In order of first observation, so the flow id is the index plus one
    flows: Vec<(FlowKey, FlowStats)>,
    send_times: HashMap<Uuid, Duration>,
    eavesdropping: EavesdropStats,
}

impl FlowMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn stats_mut(&mut self, flow: &FlowKey) -> &mut FlowStats {
        let next_index = self.flows.len();
        let index = *self.flow_ids.entry(*flow).or_insert(next_index);
        if index == next_index {
            self.flows.push((*flow, FlowStats::default()));
        }

        &mut self.flows[index].1
    }

    pub fn record_tx(&mut self, packet: &Packet, now: Duration) {
        self.send_times.insert(packet.id(), now);

        let stats = self.stats_mut(packet.flow());
        stats.tx_packets += 1;
        stats.tx_bytes += packet.size_bytes() as u64;
        stats.first_tx.get_or_insert(now);
        stats.last_tx = Some(now);
    }

    pub fn record_rx(&mut self, packet: &Packet, now: Duration) {
        let sent_at = self.send_times.get(&packet.id()).copied();

        let stats = self.stats_mut(packet.flow());
        stats.rx_packets += 1;
        stats.rx_bytes += packet.size_bytes() as u64;
        stats.first_rx.get_or_insert(now);
        stats.last_rx = Some(now);

        let Some(sent_at) = sent_at else {
            tracing::debug!("received packet #{} without a recorded send time", packet.number());
            return;
        };

        let delay = now.saturating_sub(sent_at);
        stats.delay_sum += delay;
        if let Some(last_delay) = stats.last_delay {
            stats.jitter_sum += delay.abs_diff(last_delay);
        }
        stats.last_delay = Some(delay);
    }

    pub fn record_drop(&mut self, packet: &Packet, reason: DropReason) {
        *self
            .stats_mut(packet.flow())
            .drops
            .entry(reason)
            .or_default() += 1;
    }

    pub fn record_intercepted(&mut self, packet: &Packet) {
        self.eavesdropping.intercepted += 1;
        if !packet.is_encrypted() {
            self.eavesdropping.exposed += 1;
        }
    }

    /// Computes the loss of every flow. Packets that were never received count as lost, including
    /// those still in flight.
    pub fn finalize(&mut self) {
        for (_, stats) in &mut self.flows {
            stats.lost_packets = stats.tx_packets.saturating_sub(stats.rx_packets);
        }
    }

    /// Packets transmitted but neither received nor dropped so far
    pub fn in_flight_packets(&self) -> u64 {
        self.flows
            .iter()
            .map(|(_, s)| {
                s.tx_packets
                    .saturating_sub(s.rx_packets)
                    .saturating_sub(s.dropped_packets())
            })
            .sum()
    }

    pub fn flow(&self, flow: &FlowKey) -> Option<&FlowStats> {
        self.flow_ids.get(flow).map(|&i| &self.flows[i].1)
    }

    pub fn flows(&self) -> Vec<FlowRecord> {
        self.flows
            .iter()
            .enumerate()
            .map(|(index, (flow, stats))| FlowRecord {
                id: index as u32 + 1,
                flow: *flow,
                stats: stats.clone(),
                loss_ratio: stats.loss_ratio(),
                average_delay: stats.average_delay(),
                average_jitter: stats.average_jitter(),
                throughput_bps: stats.throughput_bps(),
            })
            .collect()
    }

    pub fn eavesdropping(&self) -> EavesdropStats {
        self.eavesdropping
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
