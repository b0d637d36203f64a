//! Topology, link state and routing of the simulated WAN

pub mod event;
mod global_routing;
pub mod ip;
pub mod link;
pub mod node;
pub mod queue;
pub mod rate_limiter;
pub mod route;
pub mod spec;

use crate::InTransitPacket;
use crate::error::{ConfigError, MAX_SETUP_TIME};
use crate::network::ip::Ipv4Cidr;
use crate::network::link::{LinkStatus, NetworkLink};
use crate::network::node::{Interface, InterfaceStatus, Node};
use crate::network::queue::EgressQueue;
use crate::network::route::{Route, RouteOrigin, RouteTable};
use crate::network::spec::{NetworkSpec, RouteSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceId(pub(crate) usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(pub(crate) usize);

pub struct WanNetwork {
    pub(crate) nodes: Vec<Node>,
    pub(crate) interfaces: Vec<Interface>,
    pub(crate) links: Vec<NetworkLink>,
    node_ids: HashMap<Arc<str>, NodeId>,
    link_ids: HashMap<Arc<str>, LinkId>,
}

/// The outcome of an actual interface state transition
pub struct StatusChange {
    pub interface: InterfaceId,
    pub status: InterfaceStatus,
    /// Set when the transition changed whether the link is operational
    pub link_status: Option<LinkStatus>,
    /// Packets that were waiting in the link's queues when it stopped being operational, together
    /// with the node holding them
    pub(crate) flushed: Vec<(NodeId, InTransitPacket)>,
}

impl WanNetwork {
    pub fn build(spec: &NetworkSpec) -> Result<Self, ConfigError> {
        let mut node_ids = HashMap::new();
        let mut addresses = HashMap::new();
        let mut pending_interfaces = Vec::new();
        for (node_index, node) in spec.nodes.iter().enumerate() {
            let node_id: Arc<str> = node.id.as_str().into();
            if node_ids.insert(node_id.clone(), NodeId(node_index)).is_some() {
                return Err(ConfigError::DuplicateNode { node_id });
            }

            for interface in &node.interfaces {
                let address = interface.address.address();
                let index = InterfaceId(pending_interfaces.len());
                if addresses.insert(address, index).is_some() {
                    return Err(ConfigError::DuplicateAddress { address });
                }

                pending_interfaces.push((NodeId(node_index), interface.address));
            }
        }

        let mut link_ids = HashMap::new();
        let mut links = Vec::new();
        let mut link_of_interface: Vec<Vec<LinkId>> = vec![Vec::new(); pending_interfaces.len()];
        for (link_index, l) in spec.links.iter().enumerate() {
            let link_id: Arc<str> = l.id.as_str().into();
            let index = LinkId(link_index);
            if link_ids.insert(link_id.clone(), index).is_some() {
                return Err(ConfigError::InvalidLink {
                    link_id,
                    reason: "the link id is used more than once",
                });
            }

            if l.bandwidth_bps == 0 {
                return Err(ConfigError::InvalidLink {
                    link_id,
                    reason: "bandwidth must be positive",
                });
            }

            if !(0.0..=1.0).contains(&l.packet_loss_ratio) {
                return Err(ConfigError::InvalidLink {
                    link_id,
                    reason: "packet loss ratio must be between 0 and 1",
                });
            }

            if l.delay > MAX_SETUP_TIME {
                return Err(ConfigError::InvalidLink {
                    link_id,
                    reason: "delay is too long",
                });
            }

            let endpoint = |address: Ipv4Addr| {
                addresses
                    .get(&address)
                    .copied()
                    .ok_or(ConfigError::UnknownLinkEndpoint {
                        link_id: link_id.clone(),
                        address,
                    })
            };
            let endpoints = [endpoint(l.source)?, endpoint(l.target)?];

            let source_node = pending_interfaces[endpoints[0].0].0;
            if source_node == pending_interfaces[endpoints[1].0].0 {
                return Err(ConfigError::SelfLoop {
                    link_id,
                    node_id: spec.nodes[source_node.0].id.as_str().into(),
                });
            }

            for endpoint in endpoints {
                link_of_interface[endpoint.0].push(index);
            }

            links.push(NetworkLink {
                index,
                id: link_id,
                endpoints,
                bandwidth_bps: l.bandwidth_bps,
                delay: l.delay,
                metric: l.metric,
                packet_loss_ratio: l.packet_loss_ratio,
                down_epoch: 0,
                last_down: None,
            });
        }

        let mut interfaces = Vec::with_capacity(pending_interfaces.len());
        for (index, (node, cidr)) in pending_interfaces.into_iter().enumerate() {
            let [link] = link_of_interface[index][..] else {
                return Err(ConfigError::InterfaceLinkCount {
                    node_id: spec.nodes[node.0].id.as_str().into(),
                    address: cidr.address(),
                    links: link_of_interface[index].len(),
                });
            };

            let link_spec = &spec.links[link.0];
            interfaces.push(Interface {
                index: InterfaceId(index),
                node,
                link,
                cidr,
                status: InterfaceStatus::Up,
                queue: EgressQueue::new(link_spec.queue, link_spec.qos.as_ref()),
                transmitting: None,
                rate_limiter: None,
            });
        }

        let nodes = spec
            .nodes
            .iter()
            .enumerate()
            .map(|(index, n)| {
                let index = NodeId(index);
                let node_interfaces: Vec<_> = interfaces
                    .iter()
                    .filter(|i| i.node == index)
                    .map(|i| i.index)
                    .collect();

                let mut routes = RouteTable::default();
                for &interface in &node_interfaces {
                    routes.insert(Route {
                        destination: interfaces[interface.0].cidr.network(),
                        next_hop: None,
                        interface,
                        metric: 0,
                        origin: RouteOrigin::Connected,
                    });
                }

                Node {
                    index,
                    id: n.id.as_str().into(),
                    interfaces: node_interfaces,
                    routes,
                    metadata: n.metadata.clone(),
                }
            })
            .collect();

        let mut network = Self {
            nodes,
            interfaces,
            links,
            node_ids,
            link_ids,
        };

        for (index, node) in spec.nodes.iter().enumerate() {
            for route in &node.routes {
                network.add_static_route(NodeId(index), route)?;
            }
        }

        Ok(network)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[NetworkLink] {
        &self.links
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn link(&self, id: LinkId) -> &NetworkLink {
        &self.links[id.0]
    }

    pub fn interface(&self, id: InterfaceId) -> &Interface {
        &self.interfaces[id.0]
    }

    pub(crate) fn interface_mut(&mut self, id: InterfaceId) -> &mut Interface {
        &mut self.interfaces[id.0]
    }

    pub fn node_id(&self, id: &str) -> Result<NodeId, ConfigError> {
        self.node_ids
            .get(id)
            .copied()
            .ok_or_else(|| ConfigError::UnknownNode {
                node_id: id.into(),
            })
    }

    pub fn link_id(&self, id: &str) -> Result<LinkId, ConfigError> {
        self.link_ids
            .get(id)
            .copied()
            .ok_or_else(|| ConfigError::UnknownLink {
                link_id: id.into(),
            })
    }

    /// The interface of `node` with the given address
    pub fn interface_by_address(
        &self,
        node: NodeId,
        address: Ipv4Addr,
    ) -> Result<InterfaceId, ConfigError> {
        self.node(node)
            .interfaces
            .iter()
            .copied()
            .find(|&i| self.interface(i).address() == address)
            .ok_or_else(|| ConfigError::UnknownInterface {
                node_id: self.node(node).id.clone(),
                address,
            })
    }

    /// The interface on `node` that connects it to `neighbor`
    pub fn interface_towards(&self, node: NodeId, neighbor: NodeId) -> Option<InterfaceId> {
        self.node(node).interfaces.iter().copied().find(|&i| {
            let peer = self.link(self.interface(i).link).peer(i);
            self.interface(peer).node == neighbor
        })
    }

    /// Whether `address` belongs to one of the interfaces of `node`, regardless of their status
    pub fn owns_address(&self, node: NodeId, address: Ipv4Addr) -> bool {
        self.node(node)
            .interfaces
            .iter()
            .any(|&i| self.interface(i).address() == address)
    }

    /// A link is operational when both of its interfaces are up
    pub fn is_link_operational(&self, link: LinkId) -> bool {
        self.link(link)
            .endpoints
            .iter()
            .all(|&i| self.interface(i).is_up())
    }

    pub fn link_status(&self, link: LinkId) -> LinkStatus {
        if self.is_link_operational(link) {
            LinkStatus::Up
        } else {
            LinkStatus::Down
        }
    }

    /// Transitions an interface, returning `None` if it already had the requested status
    pub fn set_interface_state(
        &mut self,
        node: NodeId,
        interface: InterfaceId,
        status: InterfaceStatus,
        now: Duration,
    ) -> Result<Option<StatusChange>, ConfigError> {
        if self.interface(interface).node != node {
            return Err(ConfigError::UnknownInterface {
                node_id: self.node(node).id.clone(),
                address: self.interface(interface).address(),
            });
        }

        let link = self.interface(interface).link;
        let was_operational = self.is_link_operational(link);
        if !self.interface_mut(interface).update_status(status) {
            return Ok(None);
        }

        let is_operational = self.is_link_operational(link);
        let mut change = StatusChange {
            interface,
            status,
            link_status: None,
            flushed: Vec::new(),
        };

        if was_operational && !is_operational {
            self.links[link.0].track_down(now);
            for endpoint in self.link(link).endpoints {
                let endpoint = &mut self.interfaces[endpoint.0];
                let node = endpoint.node;
                change
                    .flushed
                    .extend(endpoint.queue.drain().into_iter().map(|data| (node, data)));
            }
            change.link_status = Some(LinkStatus::Down);
        } else if !was_operational && is_operational {
            change.link_status = Some(LinkStatus::Up);
        }

        Ok(Some(change))
    }

    /// Selects the route `node` uses towards `destination`, ignoring routes through interfaces
    /// that are down
    pub fn select_route(&self, node: NodeId, destination: Ipv4Addr) -> Option<&Route> {
        self.node(node)
            .routes
            .select(destination, |i| self.interface(i).is_up())
    }

    /// Adds a route, rejecting interfaces that do not belong to `node`
    pub fn add_route(&mut self, node: NodeId, route: Route) -> Result<(), ConfigError> {
        if !self.node(node).interfaces.contains(&route.interface) {
            let address = self
                .interfaces
                .get(route.interface.0)
                .map(|i| i.address())
                .unwrap_or(Ipv4Addr::UNSPECIFIED);
            return Err(ConfigError::UnknownInterface {
                node_id: self.node(node).id.clone(),
                address,
            });
        }

        self.nodes[node.0].routes.insert(route);
        Ok(())
    }

    /// Resolves the egress interface of a route from its next hop, then adds it
    pub fn add_static_route(&mut self, node: NodeId, spec: &RouteSpec) -> Result<Route, ConfigError> {
        let interface = self.interface_for_next_hop(node, spec.next_hop)?;
        let route = Route {
            destination: spec.destination.network(),
            next_hop: Some(spec.next_hop),
            interface,
            metric: spec.metric,
            origin: RouteOrigin::Static,
        };
        self.add_route(node, route.clone())?;
        Ok(route)
    }

    pub(crate) fn interface_for_next_hop(
        &self,
        node: NodeId,
        next_hop: Ipv4Addr,
    ) -> Result<InterfaceId, ConfigError> {
        self.node(node)
            .interfaces
            .iter()
            .copied()
            .find(|&i| self.interface(i).cidr.contains(next_hop))
            .ok_or_else(|| ConfigError::UnreachableNextHop {
                node_id: self.node(node).id.clone(),
                next_hop,
            })
    }

    /// Removes the non-connected routes towards `destination`; removing nothing is fine
    pub fn remove_route(
        &mut self,
        node: NodeId,
        destination: Ipv4Cidr,
        next_hop: Option<Ipv4Addr>,
    ) -> Vec<Route> {
        self.nodes[node.0].routes.remove(destination, next_hop)
    }

    /// Replaces the static and dynamic routes of every node by shortest-path routes over the
    /// currently operational links
    ///
    /// Returns, for every node whose table changed, the routes that disappeared and the ones that
    /// are new.
    pub fn recompute_routes(&mut self) -> Vec<RouteUpdate> {
        let computed = global_routing::compute_routes(self);
        let mut updates = Vec::new();
        for (node, routes) in self.nodes.iter_mut().zip(computed) {
            let previous = node.routes.remove_where(|r| r.origin != RouteOrigin::Connected);
            let removed: Vec<_> = previous
                .iter()
                .filter(|r| !routes.contains(r))
                .cloned()
                .collect();
            let added: Vec<_> = routes
                .iter()
                .filter(|r| !previous.contains(r))
                .cloned()
                .collect();

            for route in routes {
                node.routes.insert(route);
            }

            if !removed.is_empty() || !added.is_empty() {
                updates.push(RouteUpdate {
                    node: node.index,
                    removed,
                    added,
                });
            }
        }

        updates
    }
}

/// The effect of a route recomputation on a single node
pub struct RouteUpdate {
    pub node: NodeId,
    pub removed: Vec<Route>,
    pub added: Vec<Route>,
}
