//! Global route recomputation over the operational link graph
//!
//! Every node gets a `/32` route towards each address of every other reachable node, plus a route
//! towards the subnet of every operational link it is not attached to. Routes point at the first
//! hop of the cheapest path (link metrics are the costs). Ties keep the path found first, which is
//! deterministic because the frontier is ordered by `(cost, node index)`.

use crate::network::ip::Ipv4Cidr;
use crate::network::route::{Route, RouteOrigin};
use crate::network::{InterfaceId, NodeId, WanNetwork};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::net::Ipv4Addr;

struct Adjacency {
    interface: InterfaceId,
    next_hop: Ipv4Addr,
    neighbor: NodeId,
    cost: u64,
}

#[derive(Copy, Clone)]
struct PathInfo {
    cost: u64,
    first_hop: Option<(InterfaceId, Ipv4Addr)>,
}

/// Computes the dynamic routes of every node, indexed by node
pub(crate) fn compute_routes(network: &WanNetwork) -> Vec<Vec<Route>> {
    let adjacency = adjacency(network);
    network
        .nodes
        .iter()
        .map(|node| routes_from(network, &adjacency, node.index))
        .collect()
}

fn adjacency(network: &WanNetwork) -> Vec<Vec<Adjacency>> {
    network
        .nodes
        .iter()
        .map(|node| {
            node.interfaces
                .iter()
                .filter_map(|&interface| {
                    let link = network.link(network.interface(interface).link);
                    if !network.is_link_operational(link.index) {
                        return None;
                    }

                    let peer = network.interface(link.peer(interface));
                    Some(Adjacency {
                        interface,
                        next_hop: peer.address(),
                        neighbor: peer.node,
                        cost: link.metric as u64,
                    })
                })
                .collect()
        })
        .collect()
}

fn shortest_paths(adjacency: &[Vec<Adjacency>], source: NodeId) -> Vec<Option<PathInfo>> {
    let mut best: Vec<Option<PathInfo>> = vec![None; adjacency.len()];
    best[source.0] = Some(PathInfo {
        cost: 0,
        first_hop: None,
    });

    let mut frontier = BinaryHeap::new();
    frontier.push(Reverse((0u64, source.0)));

    while let Some(Reverse((cost, node))) = frontier.pop() {
        let Some(current) = best[node] else {
            continue;
        };
        if cost > current.cost {
            // Stale entry, a cheaper path was found in the meantime
            continue;
        }

        for adj in &adjacency[node] {
            let candidate = PathInfo {
                cost: cost + adj.cost,
                first_hop: if node == source.0 {
                    Some((adj.interface, adj.next_hop))
                } else {
                    current.first_hop
                },
            };

            if best[adj.neighbor.0].is_none_or(|b| candidate.cost < b.cost) {
                best[adj.neighbor.0] = Some(candidate);
                frontier.push(Reverse((candidate.cost, adj.neighbor.0)));
            }
        }
    }

    best
}

fn routes_from(network: &WanNetwork, adjacency: &[Vec<Adjacency>], source: NodeId) -> Vec<Route> {
    let paths = shortest_paths(adjacency, source);
    let route_via = |destination: Ipv4Cidr, path: PathInfo| {
        let (interface, next_hop) = path.first_hop?;
        Some(Route {
            destination,
            next_hop: Some(next_hop),
            interface,
            metric: u32::try_from(path.cost).unwrap_or(u32::MAX),
            origin: RouteOrigin::Dynamic,
        })
    };

    let mut routes = Vec::new();

    // Host routes towards every address of every other node
    for node in &network.nodes {
        if node.index == source {
            continue;
        }

        let Some(path) = paths[node.index.0] else {
            continue;
        };

        for &interface in &node.interfaces {
            let address = network.interface(interface).address();
            routes.extend(route_via(Ipv4Cidr::host(address), path));
        }
    }

    // Subnet routes towards operational links this node is not attached to
    for link in &network.links {
        if !network.is_link_operational(link.index) {
            continue;
        }

        let endpoints = link.endpoints.map(|i| network.interface(i));
        if endpoints.iter().any(|i| i.node == source) {
            continue;
        }

        let closest = endpoints
            .iter()
            .filter_map(|i| paths[i.node.0])
            .min_by_key(|path| path.cost);
        if let Some(path) = closest {
            routes.extend(route_via(endpoints[0].cidr.network(), path));
        }
    }

    routes
}
