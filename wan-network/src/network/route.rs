use crate::network::InterfaceId;
use crate::network::ip::Ipv4Cidr;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteOrigin {
    /// The subnet of one of the node's own interfaces
    Connected,
    Static,
    /// Installed by global route recomputation
    Dynamic,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub destination: Ipv4Cidr,
    /// `None` for directly connected destinations
    pub next_hop: Option<Ipv4Addr>,
    pub interface: InterfaceId,
    pub metric: u32,
    pub origin: RouteOrigin,
}

impl Route {
    fn is_better_than(&self, other: &Route) -> bool {
        let prefix = self.destination.network_prefix();
        let other_prefix = other.destination.network_prefix();
        prefix > other_prefix || (prefix == other_prefix && self.metric < other.metric)
    }
}

/// The routes of a single node, in insertion order
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn insert(&mut self, mut route: Route) {
        route.destination = route.destination.network();
        self.routes.push(route);
    }

    /// Removes the routes towards `destination` (optionally only those through `next_hop`),
    /// returning them
    pub fn remove(&mut self, destination: Ipv4Cidr, next_hop: Option<Ipv4Addr>) -> Vec<Route> {
        let destination = destination.network();
        self.remove_where(|r| {
            r.destination == destination
                && r.origin != RouteOrigin::Connected
                && next_hop.is_none_or(|hop| r.next_hop == Some(hop))
        })
    }

    pub fn remove_where(&mut self, mut predicate: impl FnMut(&Route) -> bool) -> Vec<Route> {
        let (removed, kept): (Vec<_>, Vec<_>) = self.routes.drain(..).partition(|r| predicate(r));
        self.routes = kept;
        removed
    }

    /// Selects the route towards `destination`
    ///
    /// Routes through interfaces that are not up are skipped. Among the rest, the longest prefix
    /// wins, then the lowest metric, then the earliest inserted.
    pub fn select(
        &self,
        destination: Ipv4Addr,
        is_up: impl Fn(InterfaceId) -> bool,
    ) -> Option<&Route> {
        let mut selected: Option<&Route> = None;
        for route in &self.routes {
            if !route.destination.contains(destination) || !is_up(route.interface) {
                continue;
            }

            if selected.is_none_or(|s| route.is_better_than(s)) {
                selected = Some(route);
            }
        }

        selected
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
