use crate::config::cli::CustomOpt;
use crate::config::network::{NetworkEventJson, NetworkSpecJson};
use crate::config::traffic::TrafficJson;
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use wan_network::network::event::NetworkEvent;
use wan_network::network::spec::NetworkSpec;
use wan_network::simulation::SimulationSpec;

pub mod cli;
pub mod network;
pub mod traffic;

pub struct SimulationConfig {
    pub network_graph: NetworkSpecJson,
    pub network_events: Vec<NetworkEventJson>,
    pub traffic: TrafficJson,
}

impl SimulationConfig {
    pub fn load(options: &CustomOpt) -> anyhow::Result<Self> {
        let network_graph =
            read_json(&options.network_graph).context("failed to load network graph")?;
        let network_events = match &options.network_events {
            Some(path) => read_json(path).context("failed to load network events")?,
            None => Vec::new(),
        };
        let traffic = read_json(&options.traffic).context("failed to load traffic")?;

        Ok(Self {
            network_graph,
            network_events,
            traffic,
        })
    }

    pub fn into_simulation_spec(self, options: &CustomOpt) -> anyhow::Result<SimulationSpec> {
        let network = NetworkSpec::try_from(self.network_graph)?;
        let mut spec = SimulationSpec::new(network, options.duration);

        spec.events = self
            .network_events
            .into_iter()
            .map(NetworkEvent::try_from)
            .collect::<anyhow::Result<_>>()?;

        let traffic = self.traffic;
        spec.routing = traffic.routing.into();
        spec.sources = traffic
            .sources
            .into_iter()
            .map(|s| s.try_into())
            .collect::<anyhow::Result<_>>()?;
        spec.echo_servers = traffic.echo_servers;
        spec.rate_limiters = traffic
            .rate_limiters
            .into_iter()
            .map(|r| r.try_into())
            .collect::<anyhow::Result<_>>()?;
        spec.policies = traffic
            .policies
            .into_iter()
            .map(|p| p.try_into())
            .collect::<anyhow::Result<_>>()?;
        spec.eavesdroppers = traffic.eavesdroppers;
        if let Some(ipsec) = traffic.ipsec {
            spec.ipsec = ipsec.into();
        }

        Ok(spec)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid JSON in {}", path.display()))
}
