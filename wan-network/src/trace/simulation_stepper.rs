use crate::trace::simulation_step::{
    InterfaceStatusChanged, RouteChanged, SimulationStep, SimulationStepKind,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Read-only queries over recorded simulation steps
#[derive(Clone, Default)]
pub struct SimulationStepper {
    steps: Vec<SimulationStep>,
}

impl SimulationStepper {
    pub fn new(steps: Vec<SimulationStep>) -> Self {
        Self { steps }
    }

    pub fn get_packet_hops(&self, id: Uuid) -> Vec<(Duration, Arc<str>)> {
        let mut hops = Vec::new();
        for step in &self.steps {
            match &step.kind {
                SimulationStepKind::PacketInNode(s) if s.packet_id == id => {
                    hops.push((step.relative_time, s.node_id.clone()));
                }
                _ => {}
            }
        }

        hops
    }

    pub fn get_packet_path(&self, id: Uuid) -> Vec<Arc<str>> {
        self.get_packet_hops(id)
            .into_iter()
            .map(|(_, node_id)| node_id)
            .collect()
    }

    pub fn get_packet_arrived_at(&self, packet_id: Uuid, node_id: &str) -> Option<Duration> {
        self.steps
            .iter()
            .filter_map(|s| match &s.kind {
                SimulationStepKind::PacketInNode(kind)
                    if kind.packet_id == packet_id && kind.node_id.as_ref() == node_id =>
                {
                    Some(s.relative_time)
                }
                _ => None,
            })
            .next()
    }

    /// Packets created by the given node, with their creation time
    pub fn packets_created_at(&self, node_id: &str) -> Vec<(Duration, Uuid)> {
        self.steps
            .iter()
            .filter_map(|s| match &s.kind {
                SimulationStepKind::PacketCreated(kind) if kind.node_id.as_ref() == node_id => {
                    Some((s.relative_time, kind.packet_id))
                }
                _ => None,
            })
            .collect()
    }

    pub fn interface_status_changes(&self) -> Vec<(Duration, InterfaceStatusChanged)> {
        self.steps
            .iter()
            .filter_map(|s| match &s.kind {
                SimulationStepKind::InterfaceStatusChanged(kind) => {
                    Some((s.relative_time, kind.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn route_changes(&self) -> Vec<RouteChanged> {
        self.steps
            .iter()
            .filter_map(|s| match &s.kind {
                SimulationStepKind::RouteChanged(kind) => Some(kind.clone()),
                _ => None,
            })
            .collect()
    }
}
