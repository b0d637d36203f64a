use crate::InTransitPacket;
use crate::flow_monitor::DropReason;
use crate::network::link::{LinkStatus, NetworkLink};
use crate::network::node::{Interface, Node};
use crate::network::route::Route;
use crate::trace::simulation_step::{
    GenericPacketEvent, InterfaceStatusChanged, PacketCreated, PacketDropped, PacketInTransit,
    RouteChange, RouteChanged, RoutesRecomputed, SimulationStep, SimulationStepKind,
};
use crate::trace::simulation_stepper::SimulationStepper;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Records everything that happens during a simulation, in virtual time
#[derive(Default)]
pub struct SimulationStepTracer {
    recorded_steps: Mutex<Vec<SimulationStep>>,
    already_warned_dropped: Mutex<HashSet<(Arc<str>, DropReason)>>,
}

impl SimulationStepTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> Vec<SimulationStep> {
        self.recorded_steps.lock().clone()
    }

    pub fn stepper(&self) -> SimulationStepper {
        SimulationStepper::new(self.steps())
    }

    pub fn clear(&self) {
        self.recorded_steps.lock().clear();
        self.already_warned_dropped.lock().clear();
    }

    fn record(&self, now: Duration, kind: SimulationStepKind) {
        self.recorded_steps.lock().push(SimulationStep {
            relative_time: now,
            kind,
        });
    }

    pub(crate) fn track_packet_created(&self, now: Duration, node: &Node, data: &InTransitPacket) {
        let packet = &data.packet;
        self.record(
            now,
            SimulationStepKind::PacketCreated(PacketCreated {
                packet_id: packet.id(),
                packet_number: packet.number(),
                packet_size_bytes: packet.size_bytes(),
                node_id: node.id().clone(),
                flow: *packet.flow(),
                encrypted: packet.is_encrypted(),
            }),
        );

        tracing::debug!(
            "{:.6}s {} created packet #{} ({})",
            now.as_secs_f64(),
            node.id(),
            packet.number(),
            packet.flow()
        );
    }

    pub(crate) fn track_packet_in_node(&self, now: Duration, node: &Node, data: &InTransitPacket) {
        self.record(
            now,
            SimulationStepKind::PacketInNode(generic_packet_event(node, data)),
        );
    }

    pub(crate) fn track_packet_in_transit(
        &self,
        now: Duration,
        node: &Node,
        link: &NetworkLink,
        data: &InTransitPacket,
    ) {
        self.record(
            now,
            SimulationStepKind::PacketInTransit(PacketInTransit {
                packet_id: data.packet.id(),
                node_id: node.id().clone(),
                link_id: link.id().clone(),
            }),
        );
    }

    pub(crate) fn track_packet_delivered(
        &self,
        now: Duration,
        node: &Node,
        data: &InTransitPacket,
    ) {
        self.record(
            now,
            SimulationStepKind::PacketDelivered(generic_packet_event(node, data)),
        );
    }

    pub(crate) fn track_packet_dropped(
        &self,
        now: Duration,
        node: &Node,
        data: &InTransitPacket,
        reason: DropReason,
    ) {
        self.record(
            now,
            SimulationStepKind::PacketDropped(PacketDropped {
                packet_id: data.packet.id(),
                node_id: node.id().clone(),
                reason,
            }),
        );

        let first_dropped = self
            .already_warned_dropped
            .lock()
            .insert((node.id().clone(), reason));
        if first_dropped {
            tracing::warn!(
                "{:.2}s packet #{} dropped by node `{}` ({reason})! (Note: further warnings for this node and reason will be omitted to avoid cluttering the output)",
                now.as_secs_f64(),
                data.packet.number(),
                node.id(),
            );
        } else {
            tracing::debug!(
                "{:.6}s packet #{} dropped by node `{}` ({reason})",
                now.as_secs_f64(),
                data.packet.number(),
                node.id(),
            );
        }
    }

    pub(crate) fn track_interface_status(
        &self,
        now: Duration,
        node: &Node,
        interface: &Interface,
        link: &NetworkLink,
        link_status: Option<LinkStatus>,
    ) {
        self.record(
            now,
            SimulationStepKind::InterfaceStatusChanged(InterfaceStatusChanged {
                node_id: node.id().clone(),
                address: interface.address(),
                link_id: link.id().clone(),
                status: interface.status(),
                link_status,
            }),
        );

        tracing::info!(
            "{:.2}s interface {} of node `{}` is now {}",
            now.as_secs_f64(),
            interface.address(),
            node.id(),
            interface.status(),
        );
        if let Some(link_status) = link_status {
            tracing::info!(
                "{:.2}s link `{}` is now {link_status}",
                now.as_secs_f64(),
                link.id(),
            );
        }
    }

    pub(crate) fn track_route_change(
        &self,
        now: Duration,
        node: &Node,
        change: RouteChange,
        route: &Route,
    ) {
        self.record(
            now,
            SimulationStepKind::RouteChanged(RouteChanged {
                node_id: node.id().clone(),
                change,
                destination: route.destination,
                next_hop: route.next_hop,
                metric: route.metric,
                origin: route.origin,
            }),
        );

        let next_hop = route
            .next_hop
            .map(|hop| hop.to_string())
            .unwrap_or_else(|| "direct".to_string());
        match change {
            RouteChange::Added => tracing::debug!(
                "{:.2}s node `{}` added route {} via {next_hop} (metric {})",
                now.as_secs_f64(),
                node.id(),
                route.destination,
                route.metric
            ),
            RouteChange::Removed => tracing::debug!(
                "{:.2}s node `{}` removed route {} via {next_hop}",
                now.as_secs_f64(),
                node.id(),
                route.destination,
            ),
        }
    }

    pub(crate) fn track_routes_recomputed(&self, now: Duration, changed_nodes: usize) {
        self.record(
            now,
            SimulationStepKind::RoutesRecomputed(RoutesRecomputed { changed_nodes }),
        );

        tracing::info!(
            "{:.2}s routes recomputed ({changed_nodes} nodes changed)",
            now.as_secs_f64()
        );
    }
}

fn generic_packet_event(node: &Node, data: &InTransitPacket) -> GenericPacketEvent {
    GenericPacketEvent {
        packet_id: data.packet.id(),
        packet_number: data.packet.number(),
        packet_size_bytes: data.packet.size_bytes(),
        node_id: node.id().clone(),
    }
}
