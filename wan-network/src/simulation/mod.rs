//! The discrete-event simulation driving the network, its traffic and its failures

mod forwarding;

use crate::InTransitPacket;
use crate::error::{ConfigError, MAX_SETUP_TIME};
use crate::flow_monitor::{DropReason, EavesdropStats, FlowMonitor, FlowRecord};
use crate::network::event::{NetworkEvent, NetworkEventPayload, NetworkEvents};
use crate::network::ip::Ipv4Cidr;
use crate::network::node::InterfaceStatus;
use crate::network::rate_limiter::{DEFAULT_WINDOW, RateLimiter};
use crate::network::route::{Route, RouteOrigin};
use crate::network::spec::{NetworkSpec, RouteSpec};
use crate::network::{InterfaceId, LinkId, NodeId, WanNetwork};
use crate::packet::{FlowKey, Packet};
use crate::scheduler::{EventHandle, EventScheduler};
use crate::trace::simulation_step::RouteChange;
use crate::trace::tracer::SimulationStepTracer;
use crate::traffic::{EchoServerSpec, FIRST_EPHEMERAL_PORT, SourceKind, SourceSpec, TrafficSource};
use fastrand::Rng;
use serde::Serialize;
use serde_with::{DurationSecondsWithFrac, serde_as};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_IPSEC_OVERHEAD_BYTES: usize = 56;
pub const DEFAULT_IPSEC_PROCESSING_DELAY: Duration = Duration::from_micros(100);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RoutingMode {
    /// Routes only change through explicit edits and policy controllers
    #[default]
    Static,
    /// Routes are computed globally at startup, on request and optionally on every link state
    /// change
    Dynamic { recompute_on_change: bool },
}

/// Fixed-window admission control on a node's egress towards a link
#[derive(Clone, Debug)]
pub struct RateLimiterSpec {
    pub node: String,
    pub link: String,
    pub rate_bps: u64,
    pub window: Duration,
}

impl RateLimiterSpec {
    pub fn new(node: impl Into<String>, link: impl Into<String>, rate_bps: u64) -> Self {
        Self {
            node: node.into(),
            link: link.into(),
            rate_bps,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Alternates the route a node uses towards `destination` every `period`
#[derive(Clone, Debug)]
pub struct PolicyRouteSpec {
    pub node: String,
    pub destination: Ipv4Cidr,
    pub primary_next_hop: Ipv4Addr,
    pub secondary_next_hop: Ipv4Addr,
    pub period: Duration,
}

#[derive(Copy, Clone, Debug)]
pub struct IpsecSpec {
    pub overhead_bytes: usize,
    /// Applied both when a protected packet leaves its origin and when it is delivered
    pub processing_delay: Duration,
}

impl Default for IpsecSpec {
    fn default() -> Self {
        Self {
            overhead_bytes: DEFAULT_IPSEC_OVERHEAD_BYTES,
            processing_delay: DEFAULT_IPSEC_PROCESSING_DELAY,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SimulationSpec {
    pub network: NetworkSpec,
    pub events: Vec<NetworkEvent>,
    pub routing: RoutingMode,
    pub sources: Vec<SourceSpec>,
    pub echo_servers: Vec<EchoServerSpec>,
    pub rate_limiters: Vec<RateLimiterSpec>,
    pub policies: Vec<PolicyRouteSpec>,
    /// Nodes counting every packet that arrives at one of their interfaces
    pub eavesdroppers: Vec<String>,
    pub ipsec: IpsecSpec,
    pub duration: Duration,
}

impl SimulationSpec {
    pub fn new(network: NetworkSpec, duration: Duration) -> Self {
        Self {
            network,
            events: Vec::new(),
            routing: RoutingMode::Static,
            sources: Vec::new(),
            echo_servers: Vec::new(),
            rate_limiters: Vec::new(),
            policies: Vec::new(),
            eavesdroppers: Vec::new(),
            ipsec: IpsecSpec::default(),
            duration,
        }
    }

    pub fn with_source(mut self, source: SourceSpec) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_event(mut self, event: NetworkEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_echo_server(mut self, node: impl Into<String>, port: u16) -> Self {
        self.echo_servers.push(EchoServerSpec {
            node: node.into(),
            port,
        });
        self
    }

    pub fn with_routing(mut self, routing: RoutingMode) -> Self {
        self.routing = routing;
        self
    }
}

/// Everything that can happen at a point in virtual time
#[derive(Debug)]
pub(crate) enum SimEvent {
    StartSource(usize),
    SourceTick(usize),
    StopSource(usize),
    /// The interface finished putting its current packet on the wire
    TransmissionComplete(InterfaceId),
    /// A packet reached the end of a link
    PacketArrival {
        interface: InterfaceId,
        data: InTransitPacket,
        epoch: u64,
    },
    /// A packet enters the network at its origin, after IPsec processing
    Inject { node: NodeId, data: InTransitPacket },
    /// A packet is handed to its destination, after IPsec processing
    Deliver { node: NodeId, data: InTransitPacket },
    SetLinkState { link: LinkId, status: InterfaceStatus },
    SetInterfaceState {
        interface: InterfaceId,
        status: InterfaceStatus,
    },
    RecomputeRoutes,
    PolicyToggle(usize),
}

struct PolicyRoute {
    node: NodeId,
    destination: Ipv4Cidr,
    /// Primary first
    routes: [Route; 2],
    period: Duration,
    next: usize,
}

#[serde_as]
#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,
    pub flows: Vec<FlowRecord>,
    pub eavesdropping: EavesdropStats,
    pub rate_limiters: Vec<RateLimiterReport>,
    pub interfaces: Vec<InterfaceReport>,
    /// Events that were still pending when the run stopped
    pub discarded_events: usize,
    /// Packets that were neither received nor dropped when the run stopped
    pub in_flight_packets: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RateLimiterReport {
    pub node_id: Arc<str>,
    pub address: Ipv4Addr,
    pub rate_bps: u64,
    pub dropped_packets: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct InterfaceReport {
    pub node_id: Arc<str>,
    pub address: Ipv4Addr,
    pub link_id: Arc<str>,
    pub status: InterfaceStatus,
    pub peak_queue_packets: usize,
    pub peak_queue_bytes: usize,
}

pub struct Simulation {
    scheduler: EventScheduler<SimEvent>,
    network: WanNetwork,
    sources: Vec<TrafficSource>,
    echo_servers: HashSet<(NodeId, u16)>,
    eavesdroppers: HashSet<NodeId>,
    policies: Vec<PolicyRoute>,
    routing: RoutingMode,
    ipsec: IpsecSpec,
    duration: Duration,
    monitor: FlowMonitor,
    tracer: Arc<SimulationStepTracer>,
    rng: Rng,
    next_packet_number: u64,
}

impl Simulation {
    /// Validates the spec and schedules its events, without running anything yet
    pub fn new(spec: SimulationSpec, rng: Rng) -> Result<Self, ConfigError> {
        for time in [spec.duration, spec.ipsec.processing_delay] {
            if time > MAX_SETUP_TIME {
                return Err(ConfigError::InvalidDuration {
                    value: time.as_secs_f64(),
                });
            }
        }

        let network = WanNetwork::build(&spec.network)?;
        let mut simulation = Self {
            scheduler: EventScheduler::new(),
            network,
            sources: Vec::new(),
            echo_servers: HashSet::new(),
            eavesdroppers: HashSet::new(),
            policies: Vec::new(),
            routing: spec.routing,
            ipsec: spec.ipsec,
            duration: spec.duration,
            monitor: FlowMonitor::new(),
            tracer: Arc::new(SimulationStepTracer::new()),
            rng,
            next_packet_number: 0,
        };

        let events = NetworkEvents::new(spec.events);
        simulation.apply_initial_link_statuses(&events)?;
        if let RoutingMode::Dynamic { .. } = simulation.routing {
            simulation.recompute_routes()
        }

        for limiter in &spec.rate_limiters {
            simulation.install_rate_limiter(limiter)?;
        }

        for server in &spec.echo_servers {
            let node = simulation.network.node_id(&server.node)?;
            simulation.echo_servers.insert((node, server.port));
        }

        for eavesdropper in &spec.eavesdroppers {
            let node = simulation.network.node_id(eavesdropper)?;
            simulation.eavesdroppers.insert(node);
        }

        // Network events go first, so they win ties against traffic at the same time
        for event in events.events() {
            simulation.schedule_network_event(event)?;
        }

        for (index, source) in spec.sources.iter().enumerate() {
            simulation.add_source(index, source)?;
        }

        for policy in &spec.policies {
            simulation.add_policy(policy)?;
        }

        Ok(simulation)
    }

    fn apply_initial_link_statuses(&mut self, events: &NetworkEvents) -> Result<(), ConfigError> {
        for event in events.events() {
            let NetworkEventPayload::LinkStatus { link_id, .. } = &event.payload else {
                continue;
            };

            let link = self.network.link_id(link_id)?;
            if let Some(status) = events.initial_link_status(link_id) {
                self.apply_link_state(link, status.interface_status());
            }
        }

        Ok(())
    }

    fn install_rate_limiter(&mut self, spec: &RateLimiterSpec) -> Result<(), ConfigError> {
        let node = self.network.node_id(&spec.node)?;
        let link = self.network.link_id(&spec.link)?;
        let invalid = |reason| ConfigError::InvalidRateLimiter {
            node_id: spec.node.as_str().into(),
            reason,
        };

        if spec.rate_bps == 0 {
            return Err(invalid("rate must be positive"));
        }
        if spec.window.is_zero() {
            return Err(invalid("window must be positive"));
        }

        let interface = self
            .network
            .node(node)
            .interfaces()
            .iter()
            .copied()
            .find(|&i| self.network.interface(i).link() == link)
            .ok_or_else(|| invalid("the node is not attached to the link"))?;

        self.network.interface_mut(interface).rate_limiter =
            Some(RateLimiter::new(spec.rate_bps, spec.window));
        Ok(())
    }

    fn schedule_network_event(&mut self, event: &NetworkEvent) -> Result<EventHandle, ConfigError> {
        let event_kind = match &event.payload {
            NetworkEventPayload::LinkStatus { link_id, status } => SimEvent::SetLinkState {
                link: self.network.link_id(link_id)?,
                status: status.interface_status(),
            },
            NetworkEventPayload::InterfaceStatus {
                node_id,
                address,
                status,
            } => {
                let node = self.network.node_id(node_id)?;
                SimEvent::SetInterfaceState {
                    interface: self.network.interface_by_address(node, *address)?,
                    status: *status,
                }
            }
            NetworkEventPayload::RecomputeRoutes => SimEvent::RecomputeRoutes,
        };

        Ok(self.scheduler.schedule_at(event.relative_time, event_kind)?)
    }

    fn add_source(&mut self, index: usize, spec: &SourceSpec) -> Result<(), ConfigError> {
        spec.validate()?;
        let invalid = |reason: &str| ConfigError::InvalidSource {
            source_id: spec.id.as_str().into(),
            reason: reason.to_string(),
        };

        let node = self.network.node_id(&spec.node)?;
        let first_interface = self
            .network
            .node(node)
            .interfaces()
            .first()
            .copied()
            .ok_or_else(|| invalid("the node has no interfaces"))?;

        let source_address = match spec.source_address {
            Some(address) if self.network.owns_address(node, address) => address,
            Some(address) => {
                return Err(invalid(&format!(
                    "source address {address} does not belong to node `{}`",
                    spec.node
                )));
            }
            None => self.network.interface(first_interface).address(),
        };

        let flow = FlowKey {
            source: source_address,
            source_port: spec
                .source_port
                .unwrap_or(FIRST_EPHEMERAL_PORT.saturating_add(index as u16)),
            destination: spec.destination,
            destination_port: spec.destination_port,
            protocol: spec.kind.protocol(),
        };

        let first_hop = self
            .network
            .select_route(node, spec.destination)
            .map(|route| route.interface)
            .unwrap_or(first_interface);
        let line_rate = self
            .network
            .link(self.network.interface(first_hop).link())
            .bandwidth_bps();
        let pace_bps = match spec.kind {
            SourceKind::Bulk {
                pace_bps: Some(pace),
                ..
            } => pace,
            _ => line_rate,
        };

        let ipsec_overhead = spec.ipsec.then_some(self.ipsec.overhead_bytes);
        let source_index = self.sources.len();
        self.sources.push(TrafficSource::new(
            spec,
            node,
            flow,
            pace_bps,
            ipsec_overhead,
        ));

        self.scheduler
            .schedule_at(spec.start, SimEvent::StartSource(source_index))?;
        self.scheduler.schedule_at(
            spec.stop.unwrap_or(self.duration),
            SimEvent::StopSource(source_index),
        )?;

        Ok(())
    }

    fn add_policy(&mut self, spec: &PolicyRouteSpec) -> Result<(), ConfigError> {
        let node = self.network.node_id(&spec.node)?;
        let invalid = |reason| ConfigError::InvalidPolicy {
            node_id: spec.node.as_str().into(),
            reason,
        };
        if spec.period.is_zero() {
            return Err(invalid("period must be positive"));
        }
        if spec.period > MAX_SETUP_TIME {
            return Err(invalid("period is too long"));
        }

        let route_via = |next_hop| -> Result<Route, ConfigError> {
            Ok(Route {
                destination: spec.destination.network(),
                next_hop: Some(next_hop),
                interface: self.network.interface_for_next_hop(node, next_hop)?,
                metric: 1,
                origin: RouteOrigin::Static,
            })
        };
        let routes = [
            route_via(spec.primary_next_hop)?,
            route_via(spec.secondary_next_hop)?,
        ];

        let index = self.policies.len();
        self.policies.push(PolicyRoute {
            node,
            destination: spec.destination.network(),
            routes,
            period: spec.period,
            next: 0,
        });

        self.scheduler
            .schedule_at(self.scheduler.now() + spec.period, SimEvent::PolicyToggle(index))?;
        Ok(())
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn network(&self) -> &WanNetwork {
        &self.network
    }

    pub fn monitor(&self) -> &FlowMonitor {
        &self.monitor
    }

    pub fn tracer(&self) -> &Arc<SimulationStepTracer> {
        &self.tracer
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.pending_events()
    }

    pub fn schedule_link_failure(
        &mut self,
        link_id: &str,
        at: Duration,
    ) -> Result<EventHandle, ConfigError> {
        self.schedule_network_event(&NetworkEvent::link_failure(link_id, at))
    }

    pub fn schedule_link_restore(
        &mut self,
        link_id: &str,
        at: Duration,
    ) -> Result<EventHandle, ConfigError> {
        self.schedule_network_event(&NetworkEvent::link_restore(link_id, at))
    }

    pub fn schedule_interface_state(
        &mut self,
        node_id: &str,
        address: Ipv4Addr,
        status: InterfaceStatus,
        at: Duration,
    ) -> Result<EventHandle, ConfigError> {
        self.schedule_network_event(&NetworkEvent {
            relative_time: at,
            payload: NetworkEventPayload::InterfaceStatus {
                node_id: node_id.to_string(),
                address,
                status,
            },
        })
    }

    pub fn schedule_route_recomputation(&mut self, at: Duration) -> Result<EventHandle, ConfigError> {
        self.schedule_network_event(&NetworkEvent::route_recomputation(at))
    }

    /// Immediately transitions an interface, returning whether its status actually changed
    pub fn set_interface_state(
        &mut self,
        node_id: &str,
        address: Ipv4Addr,
        status: InterfaceStatus,
    ) -> Result<bool, ConfigError> {
        let node = self.network.node_id(node_id)?;
        let interface = self.network.interface_by_address(node, address)?;
        Ok(self.apply_interface_state(interface, status))
    }

    pub fn add_route(&mut self, node_id: &str, route: &RouteSpec) -> Result<(), ConfigError> {
        let node = self.network.node_id(node_id)?;
        let route = self.network.add_static_route(node, route)?;
        self.tracer.track_route_change(
            self.scheduler.now(),
            self.network.node(node),
            RouteChange::Added,
            &route,
        );
        Ok(())
    }

    /// Removes the matching non-connected routes, returning how many there were
    pub fn remove_route(
        &mut self,
        node_id: &str,
        destination: Ipv4Cidr,
        next_hop: Option<Ipv4Addr>,
    ) -> Result<usize, ConfigError> {
        let node = self.network.node_id(node_id)?;
        let removed = self.network.remove_route(node, destination, next_hop);
        for route in &removed {
            self.tracer.track_route_change(
                self.scheduler.now(),
                self.network.node(node),
                RouteChange::Removed,
                route,
            );
        }
        Ok(removed.len())
    }

    pub fn recompute_routes(&mut self) {
        let now = self.scheduler.now();
        let updates = self.network.recompute_routes();
        for update in &updates {
            let node = self.network.node(update.node);
            for route in &update.removed {
                self.tracer
                    .track_route_change(now, node, RouteChange::Removed, route);
            }
            for route in &update.added {
                self.tracer
                    .track_route_change(now, node, RouteChange::Added, route);
            }
        }

        self.tracer.track_routes_recomputed(now, updates.len());
    }

    /// Processes every event up to `stop`, after which the clock reads at least `stop`
    ///
    /// Can be called repeatedly to run the simulation in steps.
    pub fn run_until(&mut self, stop: Duration) {
        while let Some(event) = self.scheduler.pop_due(stop) {
            self.handle(event);
        }

        self.scheduler.advance_to(stop);
    }

    pub fn run(&mut self) {
        self.run_until(self.duration);
    }

    /// Runs the remainder of the simulation, discards the events left after its end and reports
    pub fn finish(&mut self) -> SimulationReport {
        self.run();
        let discarded_events = self.scheduler.clear();
        for source in &mut self.sources {
            source.pending_tick = None;
        }
        let in_flight = self.monitor.in_flight_packets();
        self.monitor.finalize();

        tracing::info!(
            "simulation finished at {:.2}s ({discarded_events} pending events discarded, {in_flight} packets still in flight)",
            self.scheduler.now().as_secs_f64()
        );

        SimulationReport {
            duration: self.duration,
            flows: self.monitor.flows(),
            eavesdropping: self.monitor.eavesdropping(),
            rate_limiters: self.rate_limiter_reports(),
            interfaces: self.interface_reports(),
            discarded_events,
            in_flight_packets: in_flight,
        }
    }

    /// Forgets all statistics and recorded steps, keeping the network and pending events
    pub fn reset_statistics(&mut self) {
        self.monitor.reset();
        self.tracer.clear();
    }

    fn rate_limiter_reports(&self) -> Vec<RateLimiterReport> {
        self.network
            .interfaces()
            .iter()
            .filter_map(|interface| {
                let limiter = interface.rate_limiter()?;
                Some(RateLimiterReport {
                    node_id: self.network.node(interface.node()).id().clone(),
                    address: interface.address(),
                    rate_bps: limiter.rate_bps(),
                    dropped_packets: limiter.dropped_packets(),
                })
            })
            .collect()
    }

    fn interface_reports(&self) -> Vec<InterfaceReport> {
        self.network
            .interfaces()
            .iter()
            .map(|interface| {
                let peak = interface.queue().max_usage();
                InterfaceReport {
                    node_id: self.network.node(interface.node()).id().clone(),
                    address: interface.address(),
                    link_id: self.network.link(interface.link()).id().clone(),
                    status: interface.status(),
                    peak_queue_packets: peak.packets,
                    peak_queue_bytes: peak.bytes,
                }
            })
            .collect()
    }

    fn handle(&mut self, event: SimEvent) {
        match event {
            SimEvent::StartSource(index) => self.start_source(index),
            SimEvent::SourceTick(index) => self.source_tick(index),
            SimEvent::StopSource(index) => self.stop_source(index),
            SimEvent::TransmissionComplete(interface) => {
                self.handle_transmission_complete(interface)
            }
            SimEvent::PacketArrival {
                interface,
                data,
                epoch,
            } => self.handle_arrival(interface, data, epoch),
            SimEvent::Inject { node, data } => self.forward(node, data),
            SimEvent::Deliver { node, data } => self.complete_delivery(node, data),
            SimEvent::SetLinkState { link, status } => {
                self.apply_link_state(link, status);
            }
            SimEvent::SetInterfaceState { interface, status } => {
                self.apply_interface_state(interface, status);
            }
            SimEvent::RecomputeRoutes => self.recompute_routes(),
            SimEvent::PolicyToggle(index) => self.toggle_policy(index),
        }
    }

    /// Sets both ends of a link, returning whether anything changed
    fn apply_link_state(&mut self, link: LinkId, status: InterfaceStatus) -> bool {
        let mut changed = false;
        for interface in self.network.link(link).endpoints() {
            changed |= self.apply_interface_state(interface, status);
        }
        changed
    }

    fn apply_interface_state(&mut self, interface: InterfaceId, status: InterfaceStatus) -> bool {
        let now = self.scheduler.now();
        let node = self.network.interface(interface).node();
        let Ok(Some(change)) = self
            .network
            .set_interface_state(node, interface, status, now)
        else {
            return false;
        };

        let iface = self.network.interface(interface);
        self.tracer.track_interface_status(
            now,
            self.network.node(node),
            iface,
            self.network.link(iface.link()),
            change.link_status,
        );

        for (holder, data) in change.flushed {
            self.drop_packet(holder, &data, DropReason::LinkDown);
        }

        if change.link_status.is_some()
            && self.routing == (RoutingMode::Dynamic { recompute_on_change: true })
        {
            self.recompute_routes();
        }

        true
    }

    fn toggle_policy(&mut self, index: usize) {
        let now = self.scheduler.now();
        let policy = &mut self.policies[index];
        let node = policy.node;
        let destination = policy.destination;
        let route = policy.routes[policy.next].clone();
        let label = if policy.next == 0 { "primary" } else { "secondary" };
        policy.next = 1 - policy.next;
        let period = policy.period;

        let removed = self.network.remove_route(node, destination, None);
        for route in &removed {
            self.tracer
                .track_route_change(now, self.network.node(node), RouteChange::Removed, route);
        }

        if self.network.add_route(node, route.clone()).is_ok() {
            self.tracer
                .track_route_change(now, self.network.node(node), RouteChange::Added, &route);
        }

        tracing::info!(
            "{:.2}s node `{}` steers {destination} via the {label} next hop",
            now.as_secs_f64(),
            self.network.node(node).id(),
        );

        self.scheduler.schedule(period, SimEvent::PolicyToggle(index));
    }

    fn start_source(&mut self, index: usize) {
        let source = &self.sources[index];
        if source.stopped {
            return;
        }

        tracing::debug!(
            "{:.2}s source `{}` started",
            self.scheduler.now().as_secs_f64(),
            source.id
        );
        self.source_tick(index);
    }

    fn stop_source(&mut self, index: usize) {
        let source = &mut self.sources[index];
        source.stopped = true;
        if let Some(handle) = source.pending_tick.take() {
            let cancelled = self.scheduler.cancel(handle);
            debug_assert!(cancelled.is_ok());
        }

        tracing::debug!(
            "{:.2}s source `{}` stopped after {} packets",
            self.scheduler.now().as_secs_f64(),
            self.sources[index].id,
            self.sources[index].sent_packets(),
        );
    }

    fn source_tick(&mut self, index: usize) {
        self.sources[index].pending_tick = None;
        if self.sources[index].stopped {
            return;
        }

        let Some(emission) = self.sources[index].tick() else {
            return;
        };

        let id = self.next_packet_id();
        let number = self.next_packet_number();
        let now = self.scheduler.now();
        let source = &self.sources[index];
        let packet = Packet::new(
            id,
            number,
            source.flow,
            source.class,
            emission.payload_bytes,
            source.ipsec.then_some(self.ipsec.overhead_bytes),
            now,
        );
        let node = source.node;

        match emission.next_in {
            Some(next_in) => {
                let handle = self.scheduler.schedule(next_in, SimEvent::SourceTick(index));
                self.sources[index].pending_tick = Some(handle);
            }
            None => tracing::debug!(
                "{:.2}s source `{}` exhausted its budget",
                now.as_secs_f64(),
                self.sources[index].id
            ),
        }

        self.originate(node, packet);
    }

    fn next_packet_id(&mut self) -> uuid::Uuid {
        uuid::Builder::from_random_bytes(self.rng.u128(..).to_le_bytes()).into_uuid()
    }

    fn next_packet_number(&mut self) -> u64 {
        let number = self.next_packet_number;
        self.next_packet_number += 1;
        number
    }
}
