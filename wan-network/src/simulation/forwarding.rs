//! Moving packets from node to node

use super::{SimEvent, Simulation};
use crate::flow_monitor::DropReason;
use crate::network::node::{Offer, Transmission};
use crate::network::{InterfaceId, NodeId};
use crate::packet::{Packet, Protocol};
use crate::{InTransitPacket, MAX_HOPS};

impl Simulation {
    /// Sends a freshly created packet from `node` into the network
    pub(super) fn originate(&mut self, node: NodeId, packet: Packet) {
        let now = self.scheduler.now();
        let data = InTransitPacket::new(packet);
        self.tracer
            .track_packet_created(now, self.network.node(node), &data);
        self.monitor.record_tx(&data.packet, now);

        if data.packet.is_encrypted() && !self.ipsec.processing_delay.is_zero() {
            self.scheduler
                .schedule(self.ipsec.processing_delay, SimEvent::Inject { node, data });
        } else {
            self.forward(node, data);
        }
    }

    /// Handles a packet that is at `node`, either delivering it or sending it further
    pub(super) fn forward(&mut self, node: NodeId, data: InTransitPacket) {
        let now = self.scheduler.now();
        self.tracer
            .track_packet_in_node(now, self.network.node(node), &data);

        let destination = data.packet.flow().destination;
        if self.network.owns_address(node, destination) {
            self.deliver(node, data);
            return;
        }

        if data.hops >= MAX_HOPS {
            self.drop_packet(node, &data, DropReason::TtlExpired);
            return;
        }

        let Some(route) = self.network.select_route(node, destination) else {
            self.drop_packet(node, &data, DropReason::NoRoute);
            return;
        };

        let interface = route.interface;
        let link = self.network.interface(interface).link();
        if !self.network.is_link_operational(link) {
            self.drop_packet(node, &data, DropReason::LinkDown);
            return;
        }

        let source = data.packet.flow().source;
        let size_bytes = data.packet.size_bytes();
        let admitted = match &mut self.network.interface_mut(interface).rate_limiter {
            Some(limiter) => limiter.allow(now, source, size_bytes),
            None => true,
        };
        if !admitted {
            self.drop_packet(node, &data, DropReason::RateLimited);
            return;
        }

        match self.network.interface_mut(interface).offer(data) {
            Offer::Transmit(data) => self.start_transmission(interface, data),
            Offer::Queued => {}
            Offer::QueueFull(data) => self.drop_packet(node, &data, DropReason::QueueFull),
        }
    }

    fn start_transmission(&mut self, interface: InterfaceId, data: InTransitPacket) {
        let now = self.scheduler.now();
        let iface = self.network.interface(interface);
        let link = self.network.link(iface.link());
        let transmission_time = link.transmission_time(data.packet.size_bytes());
        let epoch = link.down_epoch;

        self.tracer
            .track_packet_in_transit(now, self.network.node(iface.node()), link, &data);

        self.network.interface_mut(interface).transmitting = Some(Transmission { data, epoch });
        self.scheduler
            .schedule(transmission_time, SimEvent::TransmissionComplete(interface));
    }

    pub(super) fn handle_transmission_complete(&mut self, interface: InterfaceId) {
        let Some(Transmission { data, epoch }) =
            self.network.interface_mut(interface).transmitting.take()
        else {
            return;
        };

        let iface = self.network.interface(interface);
        let node = iface.node();
        let link = self.network.link(iface.link());
        let loss_ratio = link.packet_loss_ratio;
        let peer = link.peer(interface);
        let delay = link.delay();

        if epoch != link.down_epoch {
            // The link went down while the packet was being put on the wire
            self.drop_packet(node, &data, DropReason::LinkDown);
        } else if loss_ratio > 0.0 && self.rng.f64() < loss_ratio {
            self.drop_packet(node, &data, DropReason::InjectedLoss);
        } else {
            self.scheduler.schedule(
                delay,
                SimEvent::PacketArrival {
                    interface: peer,
                    data,
                    epoch,
                },
            );
        }

        if let Some(next) = self.network.interface_mut(interface).queue.dequeue() {
            self.start_transmission(interface, next);
        }
    }

    pub(super) fn handle_arrival(
        &mut self,
        interface: InterfaceId,
        mut data: InTransitPacket,
        epoch: u64,
    ) {
        let iface = self.network.interface(interface);
        let node = iface.node();
        if epoch != self.network.link(iface.link()).down_epoch {
            self.drop_packet(node, &data, DropReason::LinkDown);
            return;
        }

        if self.eavesdroppers.contains(&node) {
            self.monitor.record_intercepted(&data.packet);
        }

        data.hops = data.hops.saturating_add(1);
        self.forward(node, data);
    }

    fn deliver(&mut self, node: NodeId, data: InTransitPacket) {
        if data.packet.is_encrypted() && !self.ipsec.processing_delay.is_zero() {
            self.scheduler
                .schedule(self.ipsec.processing_delay, SimEvent::Deliver { node, data });
        } else {
            self.complete_delivery(node, data);
        }
    }

    pub(super) fn complete_delivery(&mut self, node: NodeId, data: InTransitPacket) {
        let now = self.scheduler.now();
        self.monitor.record_rx(&data.packet, now);
        self.tracer
            .track_packet_delivered(now, self.network.node(node), &data);

        let flow = data.packet.flow();
        if flow.protocol == Protocol::Udp
            && self.echo_servers.contains(&(node, flow.destination_port))
        {
            let id = self.next_packet_id();
            let number = self.next_packet_number();
            let reply = data.packet.mirrored(id, number, now);
            self.originate(node, reply);
        }
    }

    pub(super) fn drop_packet(&mut self, node: NodeId, data: &InTransitPacket, reason: DropReason) {
        self.monitor.record_drop(&data.packet, reason);
        self.tracer.track_packet_dropped(
            self.scheduler.now(),
            self.network.node(node),
            data,
            reason,
        );
    }
}
