//! Canned topologies and traffic mixes, ready to run

use crate::network::event::{NetworkEvent, NetworkEventPayload};
use crate::network::ip::Ipv4Cidr;
use crate::network::node::InterfaceStatus;
use crate::network::spec::{
    NetworkInterface, NetworkLinkSpec, NetworkNodeSpec, NetworkSpec, NodeMetadata, QosSpec,
    QueueLimit, RouteSpec,
};
use crate::packet::TrafficClass;
use crate::simulation::{PolicyRouteSpec, RateLimiterSpec, RoutingMode, SimulationSpec};
use crate::traffic::{DEFAULT_SEGMENT_SIZE, SourceKind, SourceSpec};
use std::net::Ipv4Addr;
use std::time::Duration;

const BANDWIDTH_3_MBPS: u64 = 3_000_000;
const BANDWIDTH_5_MBPS: u64 = 5_000_000;
const BANDWIDTH_10_MBPS: u64 = 10_000_000;
const BANDWIDTH_50_MBPS: u64 = 50_000_000;
const BANDWIDTH_100_MBPS: u64 = 100_000_000;
const BANDWIDTH_1_GBPS: u64 = 1_000_000_000;

const ECHO_PORT: u16 = 9;

/// Address of the legitimate client in [`wan_security`]
pub const SECURITY_CLIENT_ADDRESS: Ipv4Addr = Ipv4Addr::new(10, 1, 1, 1);

/// The next hop [`policy_routing`] starts steering traffic through
pub const POLICY_PRIMARY_NEXT_HOP: Ipv4Addr = Ipv4Addr::new(10, 100, 1, 2);

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value)
}

fn node(id: &str, addresses: &[Ipv4Addr], routes: Vec<RouteSpec>) -> NetworkNodeSpec {
    NetworkNodeSpec {
        id: id.to_string(),
        interfaces: addresses
            .iter()
            .map(|&address| NetworkInterface {
                address: Ipv4Cidr::new(address, 24),
            })
            .collect(),
        routes,
        metadata: NodeMetadata {
            label: Some(id.to_string()),
            ..NodeMetadata::default()
        },
    }
}

fn route(destination: Ipv4Addr, prefix: u8, next_hop: Ipv4Addr, metric: u32) -> RouteSpec {
    RouteSpec {
        destination: Ipv4Cidr::new(destination, prefix),
        next_hop,
        metric,
    }
}

fn default_route(next_hop: Ipv4Addr) -> RouteSpec {
    RouteSpec {
        destination: Ipv4Cidr::any(),
        next_hop,
        metric: 1,
    }
}

fn interface_status(
    node_id: &str,
    address: Ipv4Addr,
    status: InterfaceStatus,
    at: Duration,
) -> NetworkEvent {
    NetworkEvent {
        relative_time: at,
        payload: NetworkEventPayload::InterfaceStatus {
            node_id: node_id.to_string(),
            address,
            status,
        },
    }
}

/// A client, a router and a server in a line
///
/// The client is attached to `access.source` and the server to `bottleneck.target`, both with a
/// default route through the router.
pub fn line_topology(access: NetworkLinkSpec, bottleneck: NetworkLinkSpec) -> NetworkSpec {
    let nodes = vec![
        node("client", &[access.source], vec![default_route(access.target)]),
        node("router", &[access.target, bottleneck.source], Vec::new()),
        node(
            "server",
            &[bottleneck.target],
            vec![default_route(bottleneck.source)],
        ),
    ];

    NetworkSpec {
        nodes,
        links: vec![access, bottleneck],
    }
}

#[derive(Clone, Debug)]
pub struct FailoverOptions {
    pub duration: Duration,
    /// When the HQ-DC link goes down
    pub failure_at: Option<Duration>,
    /// When the HQ-DC link comes back
    pub restore_at: Option<Duration>,
}

impl Default for FailoverOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(20),
            failure_at: Some(Duration::from_secs(10)),
            restore_at: None,
        }
    }
}

/// Three sites in a triangle, each preferring the direct link and falling back to the third site
pub fn multi_site_failover(options: FailoverOptions) -> SimulationSpec {
    let hq_branch = NetworkLinkSpec::new(
        "hq-branch",
        Ipv4Addr::new(10, 1, 1, 1),
        Ipv4Addr::new(10, 1, 1, 2),
        BANDWIDTH_5_MBPS,
        Duration::from_millis(2),
    );
    let hq_dc = NetworkLinkSpec::new(
        "hq-dc",
        Ipv4Addr::new(10, 1, 2, 1),
        Ipv4Addr::new(10, 1, 2, 2),
        BANDWIDTH_5_MBPS,
        Duration::from_millis(2),
    );
    let branch_dc = NetworkLinkSpec::new(
        "branch-dc",
        Ipv4Addr::new(10, 1, 3, 1),
        Ipv4Addr::new(10, 1, 3, 2),
        BANDWIDTH_5_MBPS,
        Duration::from_millis(2),
    );

    let hq = node(
        "hq",
        &[hq_branch.source, hq_dc.source],
        vec![
            route(Ipv4Addr::new(10, 1, 2, 0), 24, hq_dc.target, 1),
            route(Ipv4Addr::new(10, 1, 2, 0), 24, hq_branch.target, 10),
            route(Ipv4Addr::new(10, 1, 3, 0), 24, hq_branch.target, 1),
        ],
    );
    let branch = node(
        "branch",
        &[hq_branch.target, branch_dc.source],
        vec![
            route(Ipv4Addr::new(10, 1, 2, 0), 24, branch_dc.target, 1),
            route(Ipv4Addr::new(10, 1, 2, 0), 24, hq_branch.source, 10),
        ],
    );
    let dc = node(
        "dc",
        &[hq_dc.target, branch_dc.target],
        vec![
            route(Ipv4Addr::new(10, 1, 1, 0), 24, hq_dc.source, 1),
            route(Ipv4Addr::new(10, 1, 1, 0), 24, branch_dc.source, 10),
        ],
    );

    let network = NetworkSpec {
        nodes: vec![hq, branch, dc],
        links: vec![hq_branch, hq_dc, branch_dc],
    };

    let mut spec = SimulationSpec::new(network, options.duration)
        .with_echo_server("dc", ECHO_PORT)
        .with_source(
            SourceSpec::new(
                "hq-echo",
                "hq",
                Ipv4Addr::new(10, 1, 2, 2),
                ECHO_PORT,
                SourceKind::Echo {
                    packet_size: 1024,
                    interval: Duration::from_secs(1),
                    max_packets: u64::MAX,
                },
            )
            .with_source_address(Ipv4Addr::new(10, 1, 1, 1))
            .starting_at(Duration::from_secs(2)),
        )
        .with_source(
            SourceSpec::new(
                "branch-echo",
                "branch",
                Ipv4Addr::new(10, 1, 3, 2),
                ECHO_PORT,
                SourceKind::Echo {
                    packet_size: 512,
                    interval: secs(1.5),
                    max_packets: u64::MAX,
                },
            )
            .with_source_address(Ipv4Addr::new(10, 1, 3, 1))
            .starting_at(secs(2.5)),
        );

    if let Some(at) = options.failure_at {
        spec = spec.with_event(NetworkEvent::link_failure("hq-dc", at));
    }
    if let Some(at) = options.restore_at {
        spec = spec.with_event(NetworkEvent::link_restore("hq-dc", at));
    }

    spec
}

#[derive(Clone, Debug)]
pub struct QosOptions {
    /// Strict-priority queueing on both links, instead of a single FIFO
    pub qos: bool,
    pub queue_packets: usize,
    pub duration: Duration,
}

impl Default for QosOptions {
    fn default() -> Self {
        Self {
            qos: true,
            queue_packets: 50,
            duration: Duration::from_secs(30),
        }
    }
}

/// A VoIP call competing with several FTP transfers over a 5Mbps bottleneck
pub fn qos_mixed_traffic(options: QosOptions) -> SimulationSpec {
    let qos = options.qos.then(QosSpec::default);
    let queue = QueueLimit::packets(options.queue_packets);

    let mut access = NetworkLinkSpec::new(
        "client-router",
        Ipv4Addr::new(10, 0, 0, 1),
        Ipv4Addr::new(10, 0, 0, 2),
        BANDWIDTH_100_MBPS,
        Duration::from_millis(1),
    );
    access.queue = queue;
    access.qos = qos.clone();

    let mut bottleneck = NetworkLinkSpec::new(
        "router-server",
        Ipv4Addr::new(10, 0, 1, 1),
        Ipv4Addr::new(10, 0, 1, 2),
        BANDWIDTH_5_MBPS,
        Duration::from_millis(10),
    );
    bottleneck.queue = queue;
    bottleneck.qos = qos;

    let server = bottleneck.target;
    let mut spec = SimulationSpec::new(line_topology(access, bottleneck), options.duration)
        .with_source(
            SourceSpec::new(
                "voip",
                "client",
                server,
                5060,
                SourceKind::ConstantCadence {
                    packet_size: 160,
                    data_rate_bps: 64_000,
                    max_packets: None,
                },
            )
            .starting_at(Duration::from_secs(2)),
        );

    let transfers = [
        (3.0, 10_000_000),
        (4.0, 5_000_000),
        (4.5, 5_000_000),
        (5.0, 5_000_000),
    ];
    for (i, (start, max_bytes)) in transfers.into_iter().enumerate() {
        spec = spec.with_source(
            SourceSpec::new(
                format!("ftp-{i}"),
                "client",
                server,
                21,
                SourceKind::Bulk {
                    segment_size: DEFAULT_SEGMENT_SIZE,
                    max_bytes,
                    pace_bps: None,
                },
            )
            .starting_at(secs(start)),
        );
    }

    spec
}

#[derive(Clone, Debug)]
pub struct SecurityOptions {
    /// Attackers flooding the server, starting at 10s
    pub ddos: bool,
    /// How many attackers there are when `ddos` is set
    pub attackers: u8,
    /// Per-source limit on the router's egress towards the server
    pub rate_limit_bps: Option<u64>,
    pub ipsec: bool,
    /// Whether the router counts what goes through it
    pub eavesdrop: bool,
    pub duration: Duration,
}

impl Default for SecurityOptions {
    fn default() -> Self {
        Self {
            ddos: true,
            attackers: 5,
            rate_limit_bps: Some(1_000_000),
            ipsec: false,
            eavesdrop: false,
            duration: Duration::from_secs(40),
        }
    }
}

/// A client talking to a server through a router, optionally under attack
pub fn wan_security(options: SecurityOptions) -> SimulationSpec {
    let access = NetworkLinkSpec::new(
        "client-router",
        SECURITY_CLIENT_ADDRESS,
        Ipv4Addr::new(10, 1, 1, 2),
        BANDWIDTH_10_MBPS,
        Duration::from_millis(5),
    );
    let uplink = NetworkLinkSpec::new(
        "router-server",
        Ipv4Addr::new(10, 1, 2, 1),
        Ipv4Addr::new(10, 1, 2, 2),
        BANDWIDTH_5_MBPS,
        Duration::from_millis(20),
    );
    let server = uplink.target;

    let attackers = if options.ddos { options.attackers } else { 0 };
    let attacker_links: Vec<_> = (1..=attackers)
        .map(|i| {
            NetworkLinkSpec::new(
                format!("attacker-{i}-router"),
                Ipv4Addr::new(10, 2, i, 1),
                Ipv4Addr::new(10, 2, i, 2),
                BANDWIDTH_10_MBPS,
                Duration::from_millis(10),
            )
        })
        .collect();

    let mut router_addresses = vec![access.target, uplink.source];
    router_addresses.extend(attacker_links.iter().map(|l| l.target));

    let mut nodes = vec![
        node("client", &[access.source], vec![default_route(access.target)]),
        node("router", &router_addresses, Vec::new()),
        node("server", &[uplink.target], vec![default_route(uplink.source)]),
    ];
    for (i, link) in (1..=attackers).zip(&attacker_links) {
        nodes.push(node(
            &format!("attacker-{i}"),
            &[link.source],
            vec![default_route(link.target)],
        ));
    }

    let mut links = vec![access, uplink];
    links.extend(attacker_links);

    let mut spec = SimulationSpec::new(NetworkSpec { nodes, links }, options.duration)
        .with_echo_server("server", ECHO_PORT)
        .with_source(
            SourceSpec::new(
                "client-echo",
                "client",
                server,
                ECHO_PORT,
                SourceKind::Echo {
                    packet_size: 1024,
                    interval: Duration::from_millis(100),
                    max_packets: 1000,
                },
            )
            .starting_at(Duration::from_secs(2))
            .with_ipsec(options.ipsec),
        );

    for i in 1..=attackers {
        spec = spec.with_source(
            SourceSpec::new(
                format!("flood-{i}"),
                format!("attacker-{i}"),
                server,
                ECHO_PORT,
                SourceKind::Flood {
                    packet_size: 1024,
                    data_rate_bps: 2_000_000,
                },
            )
            .starting_at(secs(10.0 + 0.5 * f64::from(i))),
        );
    }

    if let Some(rate_bps) = options.rate_limit_bps {
        spec.rate_limiters
            .push(RateLimiterSpec::new("router", "router-server", rate_bps));
    }

    if options.eavesdrop {
        spec.eavesdroppers.push("router".to_string());
    }

    spec
}

#[derive(Clone, Debug)]
pub struct MultiHopOptions {
    /// Recompute routes globally whenever an interface changes state, instead of static tables
    pub dynamic_routing: bool,
    pub failure_at: Duration,
    /// When the failed interface comes back, if ever
    pub restore_at: Option<Duration>,
    pub duration: Duration,
}

impl Default for MultiHopOptions {
    fn default() -> Self {
        Self {
            dynamic_routing: false,
            failure_at: Duration::from_secs(10),
            restore_at: None,
            duration: Duration::from_secs(30),
        }
    }
}

/// A branch reaching a disaster-recovery site through a DC, with a slower direct backup link
///
/// The failure takes down the DC's interface towards the DR site, which static tables at the
/// branch cannot see.
pub fn multi_hop(options: MultiHopOptions) -> SimulationSpec {
    let branch_dc = NetworkLinkSpec::new(
        "branch-dc",
        Ipv4Addr::new(192, 168, 1, 1),
        Ipv4Addr::new(192, 168, 1, 2),
        BANDWIDTH_10_MBPS,
        Duration::from_millis(5),
    );
    let dc_dr = NetworkLinkSpec::new(
        "dc-dr",
        Ipv4Addr::new(10, 0, 1, 1),
        Ipv4Addr::new(10, 0, 1, 2),
        BANDWIDTH_100_MBPS,
        Duration::from_millis(10),
    );
    let mut branch_dr = NetworkLinkSpec::new(
        "branch-dr",
        Ipv4Addr::new(10, 0, 2, 1),
        Ipv4Addr::new(10, 0, 2, 2),
        BANDWIDTH_50_MBPS,
        Duration::from_millis(25),
    );
    branch_dr.metric = 10;
    let client_branch = NetworkLinkSpec::new(
        "client-branch",
        Ipv4Addr::new(172, 16, 1, 1),
        Ipv4Addr::new(172, 16, 1, 2),
        BANDWIDTH_1_GBPS,
        Duration::from_millis(1),
    );

    let static_routes = |routes: Vec<RouteSpec>| {
        if options.dynamic_routing {
            Vec::new()
        } else {
            routes
        }
    };

    let dr_subnet = Ipv4Addr::new(10, 0, 1, 0);
    let client_subnet = Ipv4Addr::new(172, 16, 1, 0);
    let nodes = vec![
        node(
            "client",
            &[client_branch.source],
            static_routes(vec![default_route(client_branch.target)]),
        ),
        node(
            "branch",
            &[branch_dc.source, branch_dr.source, client_branch.target],
            static_routes(vec![
                route(dr_subnet, 24, branch_dc.target, 1),
                route(dr_subnet, 24, branch_dr.target, 100),
            ]),
        ),
        node(
            "dc",
            &[branch_dc.target, dc_dr.source],
            static_routes(vec![
                route(client_subnet, 24, branch_dc.source, 1),
                route(Ipv4Addr::new(10, 0, 2, 0), 24, branch_dc.source, 1),
            ]),
        ),
        node(
            "dr",
            &[dc_dr.target, branch_dr.target],
            static_routes(vec![
                route(client_subnet, 24, dc_dr.source, 1),
                route(client_subnet, 24, branch_dr.source, 100),
                route(Ipv4Addr::new(192, 168, 1, 0), 24, dc_dr.source, 1),
            ]),
        ),
    ];

    let dc_towards_dr = dc_dr.source;
    let dr = dc_dr.target;
    let network = NetworkSpec {
        nodes,
        links: vec![branch_dc, dc_dr, branch_dr, client_branch],
    };

    let mut spec = SimulationSpec::new(network, options.duration)
        .with_echo_server("dr", 8080)
        .with_source(
            SourceSpec::new(
                "client-echo",
                "client",
                dr,
                8080,
                SourceKind::Echo {
                    packet_size: 512,
                    interval: Duration::from_millis(500),
                    max_packets: u64::MAX,
                },
            )
            .starting_at(Duration::from_secs(2)),
        )
        .with_event(interface_status(
            "dc",
            dc_towards_dr,
            InterfaceStatus::Down,
            options.failure_at,
        ));

    if let Some(restore_at) = options.restore_at {
        spec = spec.with_event(interface_status(
            "dc",
            dc_towards_dr,
            InterfaceStatus::Up,
            restore_at,
        ));
    }

    if options.dynamic_routing {
        spec = spec.with_routing(RoutingMode::Dynamic {
            recompute_on_change: true,
        });
        if let Some(restore_at) = options.restore_at {
            spec = spec.with_event(NetworkEvent::route_recomputation(
                restore_at + Duration::from_millis(100),
            ));
        }
    }

    spec
}

#[derive(Clone, Debug)]
pub struct PolicyRoutingOptions {
    /// How long the router sticks to a next hop before switching
    pub period: Duration,
    pub duration: Duration,
}

impl Default for PolicyRoutingOptions {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(5),
            duration: Duration::from_secs(32),
        }
    }
}

/// Video and data traffic towards a service reachable through two clouds, steered by a policy
pub fn policy_routing(options: PolicyRoutingOptions) -> SimulationSpec {
    let access = NetworkLinkSpec::new(
        "client-router",
        Ipv4Addr::new(10, 0, 1, 1),
        Ipv4Addr::new(10, 0, 1, 2),
        BANDWIDTH_10_MBPS,
        Duration::from_millis(5),
    );
    let cloud_a = NetworkLinkSpec::new(
        "router-cloud-a",
        Ipv4Addr::new(10, 100, 1, 1),
        POLICY_PRIMARY_NEXT_HOP,
        BANDWIDTH_5_MBPS,
        Duration::from_millis(5),
    );
    let cloud_b = NetworkLinkSpec::new(
        "router-cloud-b",
        Ipv4Addr::new(10, 100, 2, 1),
        Ipv4Addr::new(10, 100, 2, 2),
        BANDWIDTH_3_MBPS,
        Duration::from_millis(30),
    );
    let cloud_a_service = NetworkLinkSpec::new(
        "cloud-a-service",
        Ipv4Addr::new(10, 200, 0, 1),
        Ipv4Addr::new(10, 200, 0, 2),
        BANDWIDTH_100_MBPS,
        Duration::from_millis(1),
    );
    let cloud_b_service = NetworkLinkSpec::new(
        "cloud-b-service",
        Ipv4Addr::new(10, 201, 0, 1),
        Ipv4Addr::new(10, 201, 0, 2),
        BANDWIDTH_100_MBPS,
        Duration::from_millis(1),
    );

    let service_subnet = Ipv4Addr::new(10, 200, 0, 0);
    let service = cloud_a_service.target;
    let nodes = vec![
        node("client", &[access.source], vec![default_route(access.target)]),
        node(
            "router",
            &[access.target, cloud_a.source, cloud_b.source],
            vec![route(service_subnet, 24, cloud_a.target, 1)],
        ),
        node("cloud-a", &[cloud_a.target, cloud_a_service.source], Vec::new()),
        node(
            "cloud-b",
            &[cloud_b.target, cloud_b_service.source],
            vec![route(service_subnet, 24, cloud_b_service.target, 1)],
        ),
        node(
            "service",
            &[cloud_a_service.target, cloud_b_service.target],
            vec![default_route(cloud_a_service.source)],
        ),
    ];

    let secondary_next_hop = cloud_b.target;
    let network = NetworkSpec {
        nodes,
        links: vec![access, cloud_a, cloud_b, cloud_a_service, cloud_b_service],
    };

    let stop = Duration::from_secs(30).min(options.duration);
    let mut spec = SimulationSpec::new(network, options.duration)
        .with_source(
            SourceSpec::new(
                "video",
                "client",
                service,
                5004,
                SourceKind::ConstantCadence {
                    packet_size: 200,
                    data_rate_bps: 256_000,
                    max_packets: None,
                },
            )
            .with_class(TrafficClass::BEST_EFFORT)
            .starting_at(Duration::from_secs(2))
            .stopping_at(Some(stop)),
        )
        .with_source(
            SourceSpec::new(
                "data",
                "client",
                service,
                8443,
                SourceKind::ConstantCadence {
                    packet_size: 1400,
                    data_rate_bps: 1_000_000,
                    max_packets: None,
                },
            )
            .starting_at(Duration::from_secs(3))
            .stopping_at(Some(stop)),
        );

    spec.policies.push(PolicyRouteSpec {
        node: "router".to_string(),
        destination: Ipv4Cidr::new(service_subnet, 24),
        primary_next_hop: POLICY_PRIMARY_NEXT_HOP,
        secondary_next_hop,
        period: options.period,
    });

    spec
}
