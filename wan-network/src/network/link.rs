use crate::network::{InterfaceId, LinkId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

pub struct NetworkLink {
    pub(crate) index: LinkId,
    pub(crate) id: Arc<str>,
    pub(crate) endpoints: [InterfaceId; 2],
    pub(crate) bandwidth_bps: u64,
    pub(crate) delay: Duration,
    pub(crate) metric: u32,
    pub(crate) packet_loss_ratio: f64,
    /// Incremented every time the link stops being operational, so packets that were on the wire
    /// at that moment can be recognized
    pub(crate) down_epoch: u64,
    pub(crate) last_down: Option<Duration>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkStatus {
    Up,
    Down,
}

impl Display for LinkStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Up => write!(f, "UP"),
            LinkStatus::Down => write!(f, "DOWN"),
        }
    }
}

impl NetworkLink {
    pub fn id(&self) -> &Arc<str> {
        &self.id
    }

    pub fn index(&self) -> LinkId {
        self.index
    }

    pub fn endpoints(&self) -> [InterfaceId; 2] {
        self.endpoints
    }

    pub fn bandwidth_bps(&self) -> u64 {
        self.bandwidth_bps
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn metric(&self) -> u32 {
        self.metric
    }

    /// The last time the link stopped being operational
    pub fn last_down(&self) -> Option<Duration> {
        self.last_down
    }

    /// The interface at the other end of the link
    pub fn peer(&self, interface: InterfaceId) -> InterfaceId {
        if self.endpoints[0] == interface {
            self.endpoints[1]
        } else {
            assert_eq!(
                self.endpoints[1], interface,
                "interface is not attached to link {}",
                self.id
            );
            self.endpoints[0]
        }
    }

    pub fn transmission_time(&self, size_bytes: usize) -> Duration {
        transmission_time(size_bytes, self.bandwidth_bps)
    }

    pub(crate) fn track_down(&mut self, now: Duration) {
        self.down_epoch += 1;
        self.last_down = Some(now);
    }
}

/// Time needed to put `size_bytes` on a wire of `bandwidth_bps`, rounded up to the nanosecond
pub fn transmission_time(size_bytes: usize, bandwidth_bps: u64) -> Duration {
    let bits = size_bytes as u128 * 8;
    let bandwidth_bps = bandwidth_bps.max(1) as u128;
    let nanos = (bits * 1_000_000_000).div_ceil(bandwidth_bps);
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}

#[test]
fn test_transmission_time() {
    let cases = [
        (1500, 5_000_000, Duration::from_micros(2400)),
        (188, 100_000_000, Duration::from_nanos(15_040)),
        (1052, 5_000_000, Duration::from_nanos(1_683_200)),
        (1, 3, Duration::from_nanos(2_666_666_667)),
        (0, 1_000, Duration::ZERO),
    ];

    for (size, bandwidth, expected) in cases {
        assert_eq!(transmission_time(size, bandwidth), expected, "{size} @ {bandwidth}");
    }
}
