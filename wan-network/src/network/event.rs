use crate::network::node::InterfaceStatus;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Scheduled changes to the network, sorted by time
pub struct NetworkEvents {
    pub(crate) sorted_events: Vec<NetworkEvent>,
    pub(crate) initial_link_statuses: HashMap<String, UpdateLinkStatus>,
}

impl NetworkEvents {
    pub fn new(mut events: Vec<NetworkEvent>) -> Self {
        // Stable sort, so events at the same time keep their relative order
        events.sort_by_key(|e| e.relative_time);
        let initial_link_statuses = get_initial_status_for_links_with_events(&events);
        Self {
            sorted_events: events,
            initial_link_statuses,
        }
    }

    pub fn events(&self) -> &[NetworkEvent] {
        &self.sorted_events
    }

    /// The status a link has at the start of the run, if it has status events
    pub fn initial_link_status(&self, link_id: &str) -> Option<UpdateLinkStatus> {
        self.initial_link_statuses.get(link_id).copied()
    }
}

#[derive(Clone, Debug)]
pub struct NetworkEvent {
    pub relative_time: Duration,
    pub payload: NetworkEventPayload,
}

impl NetworkEvent {
    pub fn link_failure(link_id: impl Into<String>, relative_time: Duration) -> Self {
        Self {
            relative_time,
            payload: NetworkEventPayload::LinkStatus {
                link_id: link_id.into(),
                status: UpdateLinkStatus::Down,
            },
        }
    }

    pub fn link_restore(link_id: impl Into<String>, relative_time: Duration) -> Self {
        Self {
            relative_time,
            payload: NetworkEventPayload::LinkStatus {
                link_id: link_id.into(),
                status: UpdateLinkStatus::Up,
            },
        }
    }

    pub fn route_recomputation(relative_time: Duration) -> Self {
        Self {
            relative_time,
            payload: NetworkEventPayload::RecomputeRoutes,
        }
    }
}

#[derive(Clone, Debug)]
pub enum NetworkEventPayload {
    /// Sets both interfaces of the link to the given status
    LinkStatus {
        link_id: String,
        status: UpdateLinkStatus,
    },
    /// Sets a single interface to the given status
    InterfaceStatus {
        node_id: String,
        address: Ipv4Addr,
        status: InterfaceStatus,
    },
    RecomputeRoutes,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UpdateLinkStatus {
    Up,
    Down,
}

impl UpdateLinkStatus {
    pub fn interface_status(self) -> InterfaceStatus {
        match self {
            UpdateLinkStatus::Up => InterfaceStatus::Up,
            UpdateLinkStatus::Down => InterfaceStatus::Down,
        }
    }
}

fn get_initial_status_for_links_with_events(
    sorted_events: &[NetworkEvent],
) -> HashMap<String, UpdateLinkStatus> {
    let mut initial_link_statuses = HashMap::new();
    for event in sorted_events {
        if let NetworkEventPayload::LinkStatus { link_id, status } = &event.payload {
            if initial_link_statuses.contains_key(link_id) {
                // We are only interested in events for links we haven't seen yet
                continue;
            };

            let initial_status = match status {
                UpdateLinkStatus::Up => UpdateLinkStatus::Down,
                UpdateLinkStatus::Down => UpdateLinkStatus::Up,
            };

            initial_link_statuses.insert(link_id.clone(), initial_status);
        }
    }

    initial_link_statuses
}
