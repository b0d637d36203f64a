use crate::InTransitPacket;
use crate::network::spec::{QosSpec, QueueLimit};
use crate::packet::TrafficClass;
use std::collections::VecDeque;

/// The egress queue of an interface
///
/// Without QoS there is a single drop-tail band. With QoS, packets are classified into bands by
/// traffic class and dequeued with strict priority. Every band enforces the limit on its own.
pub struct EgressQueue {
    bands: Vec<Band>,
    priomap: Vec<u8>,
    max_usage: QueueUsage,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueUsage {
    pub packets: usize,
    pub bytes: usize,
}

struct Band {
    packets: VecDeque<InTransitPacket>,
    bytes: usize,
    limit: QueueLimit,
}

impl Band {
    fn new(limit: QueueLimit) -> Self {
        Self {
            packets: VecDeque::new(),
            bytes: 0,
            limit,
        }
    }

    fn has_room_for(&self, size_bytes: usize) -> bool {
        let packets_ok = self
            .limit
            .max_packets
            .is_none_or(|max| self.packets.len() < max);
        let bytes_ok = self
            .limit
            .max_bytes
            .is_none_or(|max| self.bytes + size_bytes <= max);
        packets_ok && bytes_ok
    }
}

impl EgressQueue {
    pub fn fifo(limit: QueueLimit) -> Self {
        Self {
            bands: vec![Band::new(limit)],
            priomap: vec![0],
            max_usage: QueueUsage::default(),
        }
    }

    pub fn priority(limit: QueueLimit, qos: &QosSpec) -> Self {
        let priomap = if qos.priomap.is_empty() {
            vec![0]
        } else {
            qos.priomap.clone()
        };
        let band_count = priomap.iter().copied().max().unwrap_or(0) as usize + 1;
        Self {
            bands: (0..band_count).map(|_| Band::new(limit)).collect(),
            priomap,
            max_usage: QueueUsage::default(),
        }
    }

    pub(crate) fn new(limit: QueueLimit, qos: Option<&QosSpec>) -> Self {
        match qos {
            Some(qos) => Self::priority(limit, qos),
            None => Self::fifo(limit),
        }
    }

    /// The band packets of `class` are queued in
    pub fn classify(&self, class: TrafficClass) -> usize {
        let index = (class.0 as usize).min(self.priomap.len() - 1);
        self.priomap[index] as usize
    }

    /// Enqueues the packet, handing it back if its band is full
    pub(crate) fn enqueue(&mut self, data: InTransitPacket) -> Result<(), InTransitPacket> {
        let size = data.packet.size_bytes();
        let band_index = self.classify(data.packet.class());
        let band = &mut self.bands[band_index];
        if !band.has_room_for(size) {
            return Err(data);
        }

        band.bytes += size;
        band.packets.push_back(data);

        let usage = self.usage();
        self.max_usage.packets = self.max_usage.packets.max(usage.packets);
        self.max_usage.bytes = self.max_usage.bytes.max(usage.bytes);
        Ok(())
    }

    /// Dequeues from the most urgent non-empty band
    pub(crate) fn dequeue(&mut self) -> Option<InTransitPacket> {
        let band = self.bands.iter_mut().find(|b| !b.packets.is_empty())?;
        let data = band.packets.pop_front()?;
        band.bytes -= data.packet.size_bytes();
        Some(data)
    }

    /// Removes every queued packet, most urgent band first
    pub(crate) fn drain(&mut self) -> Vec<InTransitPacket> {
        let mut drained = Vec::with_capacity(self.len());
        for band in &mut self.bands {
            band.bytes = 0;
            drained.extend(band.packets.drain(..));
        }

        drained
    }

    pub fn len(&self) -> usize {
        self.bands.iter().map(|b| b.packets.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.iter().all(|b| b.packets.is_empty())
    }

    pub fn usage(&self) -> QueueUsage {
        QueueUsage {
            packets: self.len(),
            bytes: self.bands.iter().map(|b| b.bytes).sum(),
        }
    }

    /// The highest occupancy observed since the queue was created
    pub fn max_usage(&self) -> QueueUsage {
        self.max_usage
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::packet::{FlowKey, Packet, Protocol};
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use uuid::Uuid;

    fn in_transit(number: u64, class: TrafficClass, payload_bytes: usize) -> InTransitPacket {
        let flow = FlowKey {
            source: Ipv4Addr::new(10, 0, 0, 1),
            source_port: 49153,
            destination: Ipv4Addr::new(10, 0, 1, 1),
            destination_port: 9,
            protocol: Protocol::Udp,
        };
        InTransitPacket::new(Packet::new(
            Uuid::from_u128(number as u128),
            number,
            flow,
            class,
            payload_bytes,
            None,
            Duration::ZERO,
        ))
    }

    #[test]
    fn test_fifo_preserves_order_and_drops_tail() {
        let mut queue = EgressQueue::fifo(QueueLimit::packets(3));
        for number in 0..3 {
            queue.enqueue(in_transit(number, TrafficClass(number as u8), 100)).unwrap();
        }

        let rejected = queue.enqueue(in_transit(3, TrafficClass::EXPEDITED, 100));
        assert_eq!(rejected.map_err(|d| d.packet.number()), Err(3));

        let order: Vec<_> = std::iter::from_fn(|| queue.dequeue())
            .map(|d| d.packet.number())
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_byte_limit() {
        let limit = QueueLimit {
            max_packets: None,
            max_bytes: Some(1000),
        };
        let mut queue = EgressQueue::fifo(limit);

        // 472 bytes on the wire each
        queue.enqueue(in_transit(0, TrafficClass::BEST_EFFORT, 444)).unwrap();
        queue.enqueue(in_transit(1, TrafficClass::BEST_EFFORT, 444)).unwrap();
        assert!(queue.enqueue(in_transit(2, TrafficClass::BEST_EFFORT, 444)).is_err());

        // A smaller packet still fits
        queue.enqueue(in_transit(3, TrafficClass::BEST_EFFORT, 28)).unwrap();
        assert_eq!(queue.usage().bytes, 1000);
    }

    #[test]
    fn test_higher_class_is_dequeued_first() {
        let mut queue = EgressQueue::priority(QueueLimit::packets(50), &QosSpec::default());

        // Interleave best-effort and expedited packets
        for number in 0..20 {
            let class = if number % 3 == 0 {
                TrafficClass::EXPEDITED
            } else {
                TrafficClass::BEST_EFFORT
            };
            queue.enqueue(in_transit(number, class, 1000)).unwrap();
        }

        let dequeued: Vec<_> = std::iter::from_fn(|| queue.dequeue()).collect();
        let first_best_effort = dequeued
            .iter()
            .position(|d| d.packet.class() == TrafficClass::BEST_EFFORT)
            .unwrap();
        let last_expedited = dequeued
            .iter()
            .rposition(|d| d.packet.class() == TrafficClass::EXPEDITED)
            .unwrap();
        assert!(last_expedited < first_best_effort);

        // Within a band, order is preserved
        let expedited: Vec<_> = dequeued[..first_best_effort]
            .iter()
            .map(|d| d.packet.number())
            .collect();
        assert_eq!(expedited, vec![0, 3, 6, 9, 12, 15, 18]);
    }

    #[test]
    fn test_bands_enforce_limits_independently() {
        let mut queue = EgressQueue::priority(QueueLimit::packets(2), &QosSpec::default());
        queue.enqueue(in_transit(0, TrafficClass::BEST_EFFORT, 1000)).unwrap();
        queue.enqueue(in_transit(1, TrafficClass(5), 1000)).unwrap();
        assert!(queue.enqueue(in_transit(2, TrafficClass::BEST_EFFORT, 1000)).is_err());

        // The expedited band is still empty
        queue.enqueue(in_transit(3, TrafficClass::EXPEDITED, 1000)).unwrap();
        queue.enqueue(in_transit(4, TrafficClass::EXPEDITED, 1000)).unwrap();
        assert!(queue.enqueue(in_transit(5, TrafficClass::EXPEDITED, 1000)).is_err());

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.max_usage().packets, 4);
        assert_eq!(queue.dequeue().map(|d| d.packet.number()), Some(3));
    }

    #[test]
    fn test_classification_uses_last_priomap_entry_for_unknown_classes() {
        let queue = EgressQueue::priority(
            QueueLimit::default(),
            &QosSpec {
                priomap: vec![0, 1, 2],
            },
        );
        assert_eq!(queue.classify(TrafficClass(0)), 0);
        assert_eq!(queue.classify(TrafficClass(2)), 2);
        assert_eq!(queue.classify(TrafficClass(7)), 2);
    }

    #[test]
    fn test_drain_empties_every_band() {
        let mut queue = EgressQueue::priority(QueueLimit::default(), &QosSpec::default());
        queue.enqueue(in_transit(0, TrafficClass::BEST_EFFORT, 10)).unwrap();
        queue.enqueue(in_transit(1, TrafficClass::EXPEDITED, 10)).unwrap();

        let drained: Vec<_> = queue.drain().into_iter().map(|d| d.packet.number()).collect();
        assert_eq!(drained, vec![1, 0]);
        assert!(queue.is_empty());
        assert_eq!(queue.usage(), QueueUsage::default());
    }
}
