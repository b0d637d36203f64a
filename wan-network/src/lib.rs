#![allow(clippy::type_complexity)]

pub mod error;
pub mod flow_monitor;
pub mod network;
pub mod packet;
pub mod scenarios;
pub mod scheduler;
pub mod simulation;
pub mod trace;
pub mod traffic;

use crate::packet::Packet;

/// Packets are dropped once they went through this many links
pub const MAX_HOPS: u8 = 64;

/// A packet moving through the network, with the state that changes along the way
#[derive(Clone, Debug)]
pub(crate) struct InTransitPacket {
    pub(crate) packet: Packet,
    pub(crate) hops: u8,
}

impl InTransitPacket {
    pub(crate) fn new(packet: Packet) -> Self {
        Self { packet, hops: 0 }
    }
}

#[cfg(test)]
mod test {
    use crate::error::ConfigError;
    use crate::flow_monitor::DropReason;
    use crate::network::event::NetworkEvent;
    use crate::network::ip::Ipv4Cidr;
    use crate::network::link::LinkStatus;
    use crate::network::node::InterfaceStatus;
    use crate::network::route::RouteOrigin;
    use crate::network::spec::{NetworkLinkSpec, NetworkSpec, QosSpec, QueueLimit, RouteSpec};
    use crate::scenarios::{
        self, FailoverOptions, MultiHopOptions, PolicyRoutingOptions, QosOptions, SecurityOptions,
    };
    use crate::simulation::{Simulation, SimulationSpec};
    use crate::trace::simulation_step::{RouteChange, SimulationStepKind};
    use crate::traffic::{SourceKind, SourceSpec};
    use bon::builder;
    use fastrand::Rng;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    const BANDWIDTH_5_MBPS: u64 = 5_000_000;
    const BANDWIDTH_100_MBPS: u64 = 100_000_000;

    fn run(spec: SimulationSpec) -> Simulation {
        let mut simulation = Simulation::new(spec, Rng::with_seed(42)).unwrap();
        simulation.run();
        simulation
    }

    /// Client, router and server in a line, with the router-server link as bottleneck
    #[builder]
    fn line_network(
        bottleneck_bps: Option<u64>,
        bottleneck_delay: Option<Duration>,
        queue: Option<QueueLimit>,
        qos: Option<QosSpec>,
    ) -> NetworkSpec {
        let mut access = NetworkLinkSpec::new(
            "client-router",
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            BANDWIDTH_100_MBPS,
            Duration::from_millis(1),
        );
        access.qos = qos.clone();

        let mut bottleneck = NetworkLinkSpec::new(
            "router-server",
            Ipv4Addr::new(10, 0, 1, 1),
            Ipv4Addr::new(10, 0, 1, 2),
            bottleneck_bps.unwrap_or(BANDWIDTH_5_MBPS),
            bottleneck_delay.unwrap_or(Duration::from_millis(10)),
        );
        bottleneck.queue = queue.unwrap_or_default();
        bottleneck.qos = qos;

        scenarios::line_topology(access, bottleneck)
    }

    #[builder]
    fn voip_source(start: Option<Duration>, stop: Option<Duration>) -> SourceSpec {
        SourceSpec::new(
            "voip",
            "client",
            Ipv4Addr::new(10, 0, 1, 2),
            5060,
            SourceKind::ConstantCadence {
                packet_size: 160,
                data_rate_bps: 64_000,
                max_packets: None,
            },
        )
        .starting_at(start.unwrap_or(Duration::from_secs(1)))
        .stopping_at(stop)
    }

    #[builder]
    fn bulk_source(
        id: &str,
        start: Duration,
        max_bytes: u64,
        pace_bps: Option<u64>,
        port: Option<u16>,
    ) -> SourceSpec {
        SourceSpec::new(
            id,
            "client",
            Ipv4Addr::new(10, 0, 1, 2),
            port.unwrap_or(21),
            SourceKind::Bulk {
                segment_size: 1460,
                max_bytes,
                pace_bps,
            },
        )
        .starting_at(start)
    }

    #[test]
    fn unloaded_line_delivers_everything_with_exact_delay() {
        let network = line_network().call();
        let spec = SimulationSpec::new(network, Duration::from_secs(5))
            .with_source(voip_source().stop(Duration::from_secs(3)).call());

        let mut simulation = run(spec);
        let report = simulation.finish();
        let flow = &report.flows[0];

        assert_eq!(flow.id, 1);
        // 1s..3s every 20ms, the packet at exactly 3s is not sent
        assert_eq!(flow.stats.tx_packets, 100);
        assert_eq!(flow.stats.rx_packets, 100);
        assert_eq!(flow.stats.lost_packets, 0);

        // 188 bytes: 15.04us on the access link, 300.8us on the bottleneck, plus 11ms delay
        let expected = Duration::from_nanos(15_040 + 300_800) + Duration::from_millis(11);
        assert_eq!(flow.average_delay, Some(expected));
        assert_eq!(flow.average_jitter, Some(Duration::ZERO));
        assert_eq!(report.discarded_events, 0);
    }

    #[test]
    fn replay_trace_records_packet_path() {
        let network = line_network().call();
        let spec = SimulationSpec::new(network, Duration::from_secs(2))
            .with_source(voip_source().stop(Duration::from_millis(1010)).call());

        let simulation = run(spec);
        let stepper = simulation.tracer().stepper();

        let created = stepper.packets_created_at("client");
        assert_eq!(created.len(), 1);
        let (created_at, packet_id) = created[0];
        assert_eq!(created_at, Duration::from_secs(1));

        let path = stepper.get_packet_path(packet_id);
        let path: Vec<_> = path.iter().map(|n| n.as_ref()).collect();
        assert_eq!(path, ["client", "router", "server"]);

        let arrived = stepper.get_packet_arrived_at(packet_id, "router").unwrap();
        assert_eq!(arrived, Duration::from_secs(1) + Duration::from_nanos(1_015_040));
    }

    #[test]
    fn flow_loss_accounts_for_packets_still_in_flight() {
        let network = line_network().bottleneck_delay(Duration::from_secs(2)).call();

        // The last packets are still on the wire when the run stops
        let spec = SimulationSpec::new(network, Duration::from_secs(3))
            .with_source(voip_source().call());

        let mut simulation = run(spec);
        let report = simulation.finish();
        let flow = &report.flows[0];

        assert!(flow.stats.tx_packets > flow.stats.rx_packets);
        assert_eq!(flow.stats.lost_packets, flow.stats.tx_packets - flow.stats.rx_packets);
        assert!(flow.stats.drops.is_empty());
        assert!(report.discarded_events > 0);
        assert_eq!(report.in_flight_packets, flow.stats.lost_packets);
    }

    #[test]
    fn saturated_fifo_drops_with_queue_full() {
        let network = line_network().queue(QueueLimit::packets(10)).call();
        let spec = SimulationSpec::new(network, Duration::from_secs(4)).with_source(
            bulk_source()
                .id("ftp")
                .start(Duration::from_secs(1))
                .max_bytes(2_000_000)
                .call(),
        );

        let mut simulation = run(spec);
        let report = simulation.finish();
        let flow = &report.flows[0];

        let queue_full = flow.stats.drops.get(&DropReason::QueueFull).copied().unwrap_or(0);
        assert!(queue_full > 0);
        assert!(flow.stats.rx_packets > 0);

        let peak = report
            .interfaces
            .iter()
            .find(|i| i.address == Ipv4Addr::new(10, 0, 1, 1))
            .unwrap()
            .peak_queue_packets;
        assert_eq!(peak, 10);
    }

    #[test]
    fn link_failure_drops_in_flight_packets() {
        // Long enough for several packets to be on the wire at any time
        let network = line_network().bottleneck_delay(Duration::from_millis(100)).call();
        let spec = SimulationSpec::new(network, Duration::from_secs(4))
            .with_source(voip_source().call())
            .with_event(NetworkEvent::link_failure("router-server", Duration::from_secs(2)));

        let mut simulation = run(spec);
        let report = simulation.finish();
        let flow = &report.flows[0];

        assert!(flow.stats.drops.get(&DropReason::LinkDown).copied().unwrap_or(0) > 0);
        // Once the link is down, the router has nowhere to send them
        assert!(flow.stats.drops.get(&DropReason::NoRoute).copied().unwrap_or(0) > 0);
        assert_eq!(flow.stats.last_rx.map(|t| t < Duration::from_secs(2)), Some(true));
        assert_eq!(flow.stats.lost_packets, flow.stats.tx_packets - flow.stats.rx_packets);
    }

    #[test]
    fn interface_state_changes_are_notified_once() {
        let network = line_network().call();
        let mut simulation =
            Simulation::new(SimulationSpec::new(network, Duration::from_secs(1)), Rng::with_seed(1))
                .unwrap();

        let router_address = Ipv4Addr::new(10, 0, 1, 1);
        for expected in [true, false, false] {
            let changed = simulation
                .set_interface_state("router", router_address, InterfaceStatus::Down)
                .unwrap();
            assert_eq!(changed, expected);
        }

        let changes = simulation.tracer().stepper().interface_status_changes();
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn scheduled_link_failure_and_restore_interrupt_traffic() {
        let network = line_network().call();
        let spec = SimulationSpec::new(network, Duration::from_secs(5))
            .with_source(voip_source().call());
        let mut simulation = Simulation::new(spec, Rng::with_seed(42)).unwrap();

        simulation
            .schedule_link_failure("router-server", Duration::from_secs(2))
            .unwrap();
        simulation
            .schedule_link_restore("router-server", Duration::from_secs(3))
            .unwrap();
        assert!(matches!(
            simulation.schedule_link_restore("router-dc", Duration::from_secs(3)),
            Err(ConfigError::UnknownLink { .. })
        ));
        simulation.run();

        let changes = simulation.tracer().stepper().interface_status_changes();
        assert_eq!(changes.len(), 4);
        let link_changes: Vec<_> = changes
            .iter()
            .filter_map(|(time, change)| Some((*time, change.link_status?)))
            .collect();
        assert_eq!(
            link_changes,
            [
                (Duration::from_secs(2), LinkStatus::Down),
                (Duration::from_secs(3), LinkStatus::Up),
            ]
        );

        let report = simulation.finish();
        let flow = &report.flows[0];
        assert!(flow.stats.drops.get(&DropReason::NoRoute).copied().unwrap_or(0) > 0);
        assert!(flow.stats.last_rx.unwrap() > Duration::from_secs(3));
    }

    #[test]
    fn scheduled_interface_states_are_traced() {
        let network = line_network().call();
        let spec = SimulationSpec::new(network, Duration::from_secs(3))
            .with_source(voip_source().call());
        let mut simulation = Simulation::new(spec, Rng::with_seed(42)).unwrap();

        let router_address = Ipv4Addr::new(10, 0, 1, 1);
        simulation
            .schedule_interface_state(
                "router",
                router_address,
                InterfaceStatus::Down,
                Duration::from_secs(2),
            )
            .unwrap();
        simulation
            .schedule_interface_state(
                "router",
                router_address,
                InterfaceStatus::Up,
                Duration::from_millis(2500),
            )
            .unwrap();
        assert!(matches!(
            simulation.schedule_interface_state(
                "router",
                Ipv4Addr::new(10, 9, 9, 9),
                InterfaceStatus::Down,
                Duration::from_secs(1),
            ),
            Err(ConfigError::UnknownInterface { .. })
        ));
        simulation.run();

        let changes: Vec<_> = simulation
            .tracer()
            .stepper()
            .interface_status_changes()
            .into_iter()
            .map(|(time, change)| (time, change.address, change.status, change.link_status))
            .collect();
        assert_eq!(
            changes,
            [
                (
                    Duration::from_secs(2),
                    router_address,
                    InterfaceStatus::Down,
                    Some(LinkStatus::Down)
                ),
                (
                    Duration::from_millis(2500),
                    router_address,
                    InterfaceStatus::Up,
                    Some(LinkStatus::Up)
                ),
            ]
        );
    }

    #[test]
    fn scheduled_route_recomputation_routes_around_failure() {
        let spec = scenarios::multi_hop(MultiHopOptions::default());
        let mut simulation = Simulation::new(spec, Rng::with_seed(42)).unwrap();
        simulation
            .schedule_route_recomputation(Duration::from_millis(10_500))
            .unwrap();
        simulation.run();

        let recomputed: Vec<_> = simulation
            .tracer()
            .steps()
            .into_iter()
            .filter(|s| matches!(s.kind, SimulationStepKind::RoutesRecomputed(_)))
            .map(|s| s.relative_time)
            .collect();
        assert_eq!(recomputed, [Duration::from_millis(10_500)]);

        let stepper = simulation.tracer().stepper();
        assert!(
            stepper
                .route_changes()
                .iter()
                .any(|c| c.origin == RouteOrigin::Dynamic && c.change.is_added())
        );

        let report = simulation.finish();
        let requests = report
            .flows
            .iter()
            .find(|f| f.flow.destination_port == 8080)
            .unwrap();
        assert!(requests.stats.drops.get(&DropReason::NoRoute).copied().unwrap_or(0) > 0);
        assert!(requests.stats.last_rx.unwrap() > Duration::from_secs(11));
    }

    #[test]
    fn routes_can_be_edited_while_running() {
        let network = line_network().call();
        let spec = SimulationSpec::new(network, Duration::from_secs(4))
            .with_source(voip_source().call());
        let mut simulation = Simulation::new(spec, Rng::with_seed(42)).unwrap();
        simulation.run_until(Duration::from_secs(2));

        assert_eq!(simulation.remove_route("client", Ipv4Cidr::any(), None).unwrap(), 1);
        assert_eq!(simulation.remove_route("client", Ipv4Cidr::any(), None).unwrap(), 0);
        let connected = Ipv4Cidr::new(Ipv4Addr::new(10, 0, 0, 0), 24);
        assert_eq!(simulation.remove_route("client", connected, None).unwrap(), 0);
        assert!(simulation.remove_route("branch", Ipv4Cidr::any(), None).is_err());

        simulation.run_until(Duration::from_secs(3));

        let unreachable = RouteSpec {
            destination: Ipv4Cidr::any(),
            next_hop: Ipv4Addr::new(172, 16, 0, 1),
            metric: 1,
        };
        assert!(matches!(
            simulation.add_route("client", &unreachable),
            Err(ConfigError::UnreachableNextHop { .. })
        ));

        let default_route = RouteSpec {
            destination: Ipv4Cidr::any(),
            next_hop: Ipv4Addr::new(10, 0, 0, 2),
            metric: 1,
        };
        simulation.add_route("client", &default_route).unwrap();

        let client_changes: Vec<_> = simulation
            .tracer()
            .stepper()
            .route_changes()
            .into_iter()
            .filter(|c| c.node_id.as_ref() == "client")
            .map(|c| c.change)
            .collect();
        assert_eq!(client_changes, [RouteChange::Removed, RouteChange::Added]);

        let report = simulation.finish();
        let flow = &report.flows[0];
        // Everything sent while the client had no default route, 2.02s through 3s
        assert_eq!(flow.stats.drops.get(&DropReason::NoRoute).copied(), Some(50));
        assert!(flow.stats.last_rx.unwrap() > Duration::from_secs(3));
    }

    #[test]
    fn statistics_reset_between_runs() {
        let network = line_network().call();
        let spec = SimulationSpec::new(network, Duration::from_secs(4))
            .with_source(voip_source().stop(Duration::from_secs(3)).call());
        let mut simulation = Simulation::new(spec, Rng::with_seed(42)).unwrap();

        simulation.run_until(Duration::from_secs(2));
        assert!(!simulation.monitor().flows().is_empty());
        assert!(!simulation.tracer().steps().is_empty());

        simulation.reset_statistics();
        assert!(simulation.monitor().flows().is_empty());
        assert!(simulation.tracer().steps().is_empty());
        assert!(simulation.pending_events() > 0);

        let report = simulation.finish();
        // 2.02s through 2.98s, the packet at exactly 2s was counted before the reset
        assert_eq!(report.flows[0].stats.tx_packets, 49);
        let created = simulation.tracer().stepper().packets_created_at("client");
        assert_eq!(created.len(), 49);
        assert!(created.iter().all(|(time, _)| *time > Duration::from_secs(2)));
    }

    #[test]
    fn stepped_run_matches_continuous_run() {
        let network = line_network().bottleneck_delay(Duration::from_millis(100)).call();
        let spec = SimulationSpec::new(network, Duration::from_secs(4))
            .with_source(voip_source().stop(Duration::from_secs(3)).call());

        let continuous = run(spec.clone()).finish();

        let mut stepped = Simulation::new(spec, Rng::with_seed(42)).unwrap();
        for step in 1..=8 {
            let stop = Duration::from_millis(500 * step);
            stepped.run_until(stop);
            assert_eq!(stepped.now(), stop);
        }
        let stepped = stepped.finish();

        let (a, b) = (&continuous.flows[0], &stepped.flows[0]);
        assert_eq!(a.stats.tx_packets, b.stats.tx_packets);
        assert_eq!(a.stats.rx_packets, b.stats.rx_packets);
        assert_eq!(a.average_delay, b.average_delay);
        assert_eq!(continuous.discarded_events, stepped.discarded_events);
    }

    #[test]
    fn failover_uses_backup_path_after_failure() {
        let spec = scenarios::multi_site_failover(FailoverOptions {
            duration: Duration::from_secs(15),
            failure_at: Some(Duration::from_secs(4)),
            ..FailoverOptions::default()
        });

        let mut simulation = run(spec);
        let stepper = simulation.tracer().stepper();
        let after_failure: Vec<_> = stepper
            .packets_created_at("hq")
            .into_iter()
            .filter(|(created, _)| *created > Duration::from_secs(4))
            .collect();
        assert!(!after_failure.is_empty());

        for (_, packet_id) in after_failure {
            let path = stepper.get_packet_path(packet_id);
            let path: Vec<_> = path.iter().map(|n| n.as_ref()).collect();
            assert_eq!(path, ["hq", "branch", "dc"]);
        }

        let report = simulation.finish();
        let hq_flow = report
            .flows
            .iter()
            .find(|f| f.flow.source == Ipv4Addr::new(10, 1, 1, 1))
            .unwrap();
        assert!(hq_flow.stats.tx_packets >= 13);
        assert_eq!(hq_flow.stats.lost_packets, 0);
    }

    #[test]
    fn qos_keeps_voip_delay_close_to_unloaded() {
        let loaded = scenarios::qos_mixed_traffic(QosOptions {
            qos: true,
            ..QosOptions::default()
        });
        let mut unloaded = loaded.clone();
        unloaded
            .sources
            .retain(|s| !matches!(s.kind, SourceKind::Bulk { .. }));

        let unloaded_delay = voip_delay(unloaded);
        let loaded_delay = voip_delay(loaded);

        // One propagation delay plus the service time of a full-size segment
        let tolerance = Duration::from_millis(10) + Duration::from_micros(2400);
        assert!(loaded_delay > unloaded_delay);
        assert!(
            loaded_delay <= unloaded_delay + tolerance,
            "{loaded_delay:?} vs {unloaded_delay:?}"
        );
    }

    #[test]
    fn fifo_increases_voip_delay_under_load() {
        let network = line_network().queue(QueueLimit::packets(1000)).call();
        let unloaded = SimulationSpec::new(network, Duration::from_secs(10))
            .with_source(voip_source().call());

        let mut loaded = unloaded.clone();
        for (i, port) in [2021, 2022].into_iter().enumerate() {
            loaded = loaded.with_source(
                bulk_source()
                    .id(&format!("ftp-{i}"))
                    .start(Duration::from_secs(2))
                    .max_bytes(1_000_000)
                    .pace_bps(4_000_000)
                    .port(port)
                    .call(),
            );
        }

        let unloaded_delay = voip_delay(unloaded);
        let loaded_delay = voip_delay(loaded);
        assert!(
            loaded_delay > unloaded_delay + Duration::from_millis(10),
            "{loaded_delay:?} vs {unloaded_delay:?}"
        );
    }

    #[test]
    fn disabling_qos_hurts_voip_under_the_same_load() {
        let with_qos = scenarios::qos_mixed_traffic(QosOptions {
            qos: true,
            ..QosOptions::default()
        });
        let without_qos = scenarios::qos_mixed_traffic(QosOptions {
            qos: false,
            ..QosOptions::default()
        });
        // Same sources, only the queueing discipline differs
        assert_eq!(with_qos.sources.len(), without_qos.sources.len());

        let (qos_delay, qos_lost) = voip_stats(with_qos);
        let (fifo_delay, fifo_lost) = voip_stats(without_qos);
        assert!(fifo_delay > qos_delay, "{fifo_delay:?} vs {qos_delay:?}");
        assert_eq!(qos_lost, 0);
        assert!(fifo_lost > qos_lost);
    }

    fn voip_delay(spec: SimulationSpec) -> Duration {
        voip_stats(spec).0
    }

    /// Average delay and lost packets of the VoIP flow
    fn voip_stats(spec: SimulationSpec) -> (Duration, u64) {
        let mut simulation = run(spec);
        let report = simulation.finish();
        let voip = report
            .flows
            .iter()
            .find(|f| f.flow.destination_port == 5060)
            .unwrap();
        assert!(voip.stats.rx_packets > 0);
        (voip.average_delay.unwrap(), voip.stats.lost_packets)
    }

    #[test]
    fn rate_limiting_protects_legitimate_traffic() {
        let legit_loss = |rate_limit: bool| {
            let spec = scenarios::wan_security(SecurityOptions {
                ddos: true,
                rate_limit_bps: rate_limit.then_some(500_000),
                ..SecurityOptions::default()
            });

            let mut simulation = run(spec);
            let report = simulation.finish();
            let legit = report
                .flows
                .iter()
                .find(|f| f.flow.source == scenarios::SECURITY_CLIENT_ADDRESS)
                .unwrap();
            (legit.loss_ratio, report)
        };

        let (unprotected, _) = legit_loss(false);
        let (protected, report) = legit_loss(true);
        assert!(protected < unprotected, "{protected} vs {unprotected}");
        assert!(report.rate_limiters[0].dropped_packets > 0);
    }

    #[test]
    fn ipsec_traffic_is_intercepted_but_not_exposed() {
        let run_with = |ipsec: bool| {
            let spec = scenarios::wan_security(SecurityOptions {
                ipsec,
                eavesdrop: true,
                duration: Duration::from_secs(5),
                ..SecurityOptions::default()
            });
            run(spec).finish()
        };

        let protected = run_with(true);
        assert!(protected.eavesdropping.intercepted > 0);
        assert_eq!(protected.eavesdropping.exposed, 0);

        let exposed = run_with(false);
        assert_eq!(exposed.eavesdropping.intercepted, exposed.eavesdropping.exposed);

        // The overhead shows up in the delay
        let delay = |report: &crate::simulation::SimulationReport| {
            report.flows[0].average_delay.unwrap()
        };
        assert!(delay(&protected) > delay(&exposed) + Duration::from_micros(200));
    }

    #[test]
    fn multi_hop_static_routing_cannot_route_around_failure() {
        let mut simulation = run(scenarios::multi_hop(MultiHopOptions {
            dynamic_routing: false,
            ..MultiHopOptions::default()
        }));
        let report = simulation.finish();
        let no_route: u64 = report
            .flows
            .iter()
            .map(|f| f.stats.drops.get(&DropReason::NoRoute).copied().unwrap_or(0))
            .sum();
        assert!(no_route > 0);
    }

    #[test]
    fn multi_hop_dynamic_routing_loses_nothing() {
        let mut simulation = run(scenarios::multi_hop(MultiHopOptions {
            dynamic_routing: true,
            ..MultiHopOptions::default()
        }));
        assert!(!simulation.tracer().stepper().route_changes().is_empty());

        let report = simulation.finish();
        let client_flow = report
            .flows
            .iter()
            .find(|f| f.flow.destination_port == 8080)
            .unwrap();
        assert!(client_flow.stats.rx_packets > 30);
        assert_eq!(client_flow.stats.lost_packets, 0);
    }

    #[test]
    fn policy_controller_alternates_next_hop() {
        let simulation = run(scenarios::policy_routing(PolicyRoutingOptions::default()));
        let stepper = simulation.tracer().stepper();

        let added: Vec<_> = stepper
            .route_changes()
            .into_iter()
            .filter(|c| c.node_id.as_ref() == "router" && c.change.is_added())
            .filter_map(|c| c.next_hop)
            .collect();

        assert!(added.len() >= 6);
        assert_eq!(added[0], scenarios::POLICY_PRIMARY_NEXT_HOP);
        for pair in added.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }
}
