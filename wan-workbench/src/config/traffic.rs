use anyhow::Context;
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use std::net::Ipv4Addr;
use std::time::Duration;
use wan_network::error::duration_from_secs;
use wan_network::network::ip::Ipv4Cidr;
use wan_network::packet::TrafficClass;
use wan_network::simulation::{IpsecSpec, PolicyRouteSpec, RateLimiterSpec, RoutingMode};
use wan_network::traffic::{EchoServerSpec, SourceKind, SourceSpec};

#[derive(Deserialize, Clone, Default)]
pub struct TrafficJson {
    #[serde(default)]
    pub routing: RoutingJson,
    #[serde(default)]
    pub sources: Vec<SourceJson>,
    #[serde(default)]
    pub echo_servers: Vec<EchoServerSpec>,
    #[serde(default)]
    pub rate_limiters: Vec<RateLimiterJson>,
    #[serde(default)]
    pub policies: Vec<PolicyJson>,
    /// Ids of the nodes counting the packets that go through them
    #[serde(default)]
    pub eavesdroppers: Vec<String>,
    pub ipsec: Option<IpsecJson>,
}

#[derive(Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum RoutingJson {
    #[default]
    Static,
    Dynamic {
        /// Recompute routes whenever an interface changes state
        #[serde(default = "default_true")]
        recompute_on_change: bool,
    },
}

fn default_true() -> bool {
    true
}

impl From<RoutingJson> for RoutingMode {
    fn from(json: RoutingJson) -> Self {
        match json {
            RoutingJson::Static => RoutingMode::Static,
            RoutingJson::Dynamic {
                recompute_on_change,
            } => RoutingMode::Dynamic {
                recompute_on_change,
            },
        }
    }
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct SourceJson {
    id: String,
    node: String,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    source_address: Option<Ipv4Addr>,
    source_port: Option<u16>,
    #[serde_as(as = "DisplayFromStr")]
    destination: Ipv4Addr,
    destination_port: u16,
    /// When the source starts sending, in seconds
    #[serde(default)]
    start_s: f64,
    /// When the source stops sending, in seconds (defaults to the end of the run)
    stop_s: Option<f64>,
    traffic_class: Option<u8>,
    #[serde(default)]
    ipsec: bool,
    kind: SourceKindJson,
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase", tag = "type")]
enum SourceKindJson {
    Echo {
        packet_size: usize,
        interval_s: f64,
        max_packets: u64,
    },
    ConstantCadence {
        packet_size: usize,
        data_rate_bps: u64,
        max_packets: Option<u64>,
    },
    Bulk {
        #[serde(default = "default_segment_size")]
        segment_size: usize,
        max_bytes: u64,
        pace_bps: Option<u64>,
    },
    Flood {
        packet_size: usize,
        data_rate_bps: u64,
    },
}

fn default_segment_size() -> usize {
    wan_network::traffic::DEFAULT_SEGMENT_SIZE
}

impl TryFrom<SourceJson> for SourceSpec {
    type Error = anyhow::Error;

    fn try_from(json: SourceJson) -> Result<Self, Self::Error> {
        let secs = |value: f64, what: &str| {
            duration_from_secs(value)
                .with_context(|| format!("invalid {what} for traffic source `{}`", json.id))
        };

        let kind = match json.kind {
            SourceKindJson::Echo {
                packet_size,
                interval_s,
                max_packets,
            } => SourceKind::Echo {
                packet_size,
                interval: secs(interval_s, "interval")?,
                max_packets,
            },
            SourceKindJson::ConstantCadence {
                packet_size,
                data_rate_bps,
                max_packets,
            } => SourceKind::ConstantCadence {
                packet_size,
                data_rate_bps,
                max_packets,
            },
            SourceKindJson::Bulk {
                segment_size,
                max_bytes,
                pace_bps,
            } => SourceKind::Bulk {
                segment_size,
                max_bytes,
                pace_bps,
            },
            SourceKindJson::Flood {
                packet_size,
                data_rate_bps,
            } => SourceKind::Flood {
                packet_size,
                data_rate_bps,
            },
        };

        let start = secs(json.start_s, "start time")?;
        let stop = json.stop_s.map(|s| secs(s, "stop time")).transpose()?;

        let mut spec = SourceSpec::new(
            json.id.clone(),
            json.node.clone(),
            json.destination,
            json.destination_port,
            kind,
        )
        .starting_at(start)
        .stopping_at(stop)
        .with_ipsec(json.ipsec);
        spec.source_address = json.source_address;
        spec.source_port = json.source_port;
        spec.traffic_class = json.traffic_class.map(TrafficClass);

        Ok(spec)
    }
}

#[derive(Deserialize, Clone)]
pub struct RateLimiterJson {
    node: String,
    /// The link whose egress on `node` is rate limited
    link: String,
    rate_bps: u64,
    /// Defaults to one second
    window_s: Option<f64>,
}

impl TryFrom<RateLimiterJson> for RateLimiterSpec {
    type Error = anyhow::Error;

    fn try_from(json: RateLimiterJson) -> Result<Self, Self::Error> {
        let mut spec = RateLimiterSpec::new(json.node, json.link, json.rate_bps);
        if let Some(window) = json.window_s {
            spec.window = duration_from_secs(window).context("invalid rate limiter window")?;
        }

        Ok(spec)
    }
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct PolicyJson {
    node: String,
    destination: Ipv4Cidr,
    #[serde_as(as = "DisplayFromStr")]
    primary_next_hop: Ipv4Addr,
    #[serde_as(as = "DisplayFromStr")]
    secondary_next_hop: Ipv4Addr,
    period_s: f64,
}

impl TryFrom<PolicyJson> for PolicyRouteSpec {
    type Error = anyhow::Error;

    fn try_from(json: PolicyJson) -> Result<Self, Self::Error> {
        let period = duration_from_secs(json.period_s)
            .with_context(|| format!("invalid period for the policy on `{}`", json.node))?;

        Ok(PolicyRouteSpec {
            node: json.node,
            destination: json.destination,
            primary_next_hop: json.primary_next_hop,
            secondary_next_hop: json.secondary_next_hop,
            period,
        })
    }
}

#[derive(Deserialize, Clone)]
pub struct IpsecJson {
    overhead_bytes: usize,
    processing_delay_us: u64,
}

impl From<IpsecJson> for IpsecSpec {
    fn from(json: IpsecJson) -> Self {
        IpsecSpec {
            overhead_bytes: json.overhead_bytes,
            processing_delay: Duration::from_micros(json.processing_delay_us),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn traffic_file_is_parsed() {
        let json = r#"{
            "routing": { "mode": "dynamic" },
            "sources": [
                {
                    "id": "voip",
                    "node": "client",
                    "destination": "10.0.1.2",
                    "destination_port": 5060,
                    "start_s": 1.5,
                    "kind": { "type": "constantCadence", "packet_size": 160, "data_rate_bps": 64000 }
                },
                {
                    "id": "ftp",
                    "node": "client",
                    "destination": "10.0.1.2",
                    "destination_port": 21,
                    "stop_s": 10,
                    "traffic_class": 3,
                    "kind": { "type": "bulk", "max_bytes": 1000000 }
                }
            ],
            "echo_servers": [{ "node": "server", "port": 9 }],
            "rate_limiters": [{ "node": "router", "link": "router-server", "rate_bps": 1000000 }]
        }"#;

        let traffic: TrafficJson = serde_json::from_str(json).unwrap();
        assert_eq!(
            RoutingMode::from(traffic.routing),
            RoutingMode::Dynamic {
                recompute_on_change: true
            }
        );

        let sources: Vec<SourceSpec> = traffic
            .sources
            .into_iter()
            .map(|s| s.try_into().unwrap())
            .collect();
        assert_eq!(sources[0].start, Duration::from_millis(1500));
        assert_eq!(sources[0].stop, None);
        assert_eq!(sources[1].stop, Some(Duration::from_secs(10)));
        assert_eq!(sources[1].traffic_class, Some(TrafficClass(3)));
        assert!(matches!(
            sources[1].kind,
            SourceKind::Bulk {
                segment_size: 1460,
                ..
            }
        ));

        let limiter = RateLimiterSpec::try_from(traffic.rate_limiters[0].clone()).unwrap();
        assert_eq!(limiter.window, Duration::from_secs(1));
    }

    #[test]
    fn negative_start_is_rejected() {
        let json = r#"{
            "id": "late",
            "node": "client",
            "destination": "10.0.1.2",
            "destination_port": 9,
            "start_s": -1,
            "kind": { "type": "flood", "packet_size": 100, "data_rate_bps": 1000 }
        }"#;

        let source: SourceJson = serde_json::from_str(json).unwrap();
        assert!(SourceSpec::try_from(source).is_err());
    }

    #[test]
    fn absurd_echo_interval_is_rejected() {
        let json = r#"{
            "id": "echo",
            "node": "client",
            "destination": "10.0.1.2",
            "destination_port": 9,
            "kind": { "type": "echo", "packet_size": 1024, "interval_s": 1e19, "max_packets": 3 }
        }"#;

        let source: SourceJson = serde_json::from_str(json).unwrap();
        assert!(SourceSpec::try_from(source).is_err());
    }
}
