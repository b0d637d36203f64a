use std::time::Duration;
use wan_network::network::WanNetwork;
use wan_network::simulation::SimulationReport;

pub fn print_network(network: &WanNetwork) {
    println!("--- Network ---");
    println!("* Initial link statuses (derived from events):");
    for link in network.links() {
        println!(
            "  * {}: {} ({} bps, {:.2} ms)",
            link.id(),
            network.link_status(link.index()),
            link.bandwidth_bps(),
            millis(link.delay()),
        );
    }
}

pub fn print_flows(report: &SimulationReport) {
    println!("--- Flows ---");
    for flow in &report.flows {
        let stats = &flow.stats;
        println!("* Flow {} ({})", flow.id, flow.flow);
        println!(
            "  * Sent packets: {} ({} bytes)",
            stats.tx_packets, stats.tx_bytes
        );
        println!(
            "  * Received packets: {} ({} bytes)",
            stats.rx_packets, stats.rx_bytes
        );
        println!(
            "  * Lost packets: {} ({:.2}%)",
            stats.lost_packets,
            flow.loss_ratio * 100.0
        );
        for (reason, packets) in &stats.drops {
            println!("    | {packets} packets dropped ({reason})");
        }
        match (flow.average_delay, flow.average_jitter) {
            (Some(delay), Some(jitter)) => println!(
                "  * Average delay: {:.3} ms (jitter {:.3} ms)",
                millis(delay),
                millis(jitter)
            ),
            (Some(delay), None) => println!("  * Average delay: {:.3} ms", millis(delay)),
            _ => println!("  * Average delay: n/a"),
        }
        println!("  * Throughput: {:.2} kbps", flow.throughput_bps / 1000.0);
    }
}

pub fn print_queues(report: &SimulationReport) {
    println!("--- Max queue usage per interface ---");
    let mut interfaces: Vec<_> = report
        .interfaces
        .iter()
        .filter(|i| i.peak_queue_packets > 0)
        .collect();
    interfaces.sort_unstable_by(|i1, i2| {
        i2.peak_queue_bytes
            .cmp(&i1.peak_queue_bytes)
            .then(i1.address.cmp(&i2.address))
    });

    if interfaces.is_empty() {
        println!("* No packets were ever queued");
    }
    for interface in interfaces {
        println!(
            "* {} ({}, towards {}): {} packets ({} bytes), {}",
            interface.node_id,
            interface.address,
            interface.link_id,
            interface.peak_queue_packets,
            interface.peak_queue_bytes,
            interface.status,
        );
    }
}

pub fn print_security(report: &SimulationReport) {
    if !report.rate_limiters.is_empty() {
        println!("--- Rate limiters ---");
    }
    for limiter in &report.rate_limiters {
        println!(
            "* {} ({}): {} bps per source, {} packets rejected",
            limiter.node_id, limiter.address, limiter.rate_bps, limiter.dropped_packets
        );
    }

    let eavesdropping = report.eavesdropping;
    if eavesdropping.intercepted > 0 {
        println!("--- Eavesdropping ---");
        println!("* Intercepted packets: {}", eavesdropping.intercepted);
        println!(
            "* Exposed packets (not IPsec-protected): {}",
            eavesdropping.exposed
        );
    }
}

pub fn print_summary(report: &SimulationReport) {
    println!("--- Summary ---");
    let tx: u64 = report.flows.iter().map(|f| f.stats.tx_packets).sum();
    let rx: u64 = report.flows.iter().map(|f| f.stats.rx_packets).sum();
    let lost: u64 = report.flows.iter().map(|f| f.stats.lost_packets).sum();
    println!("* Simulated time: {:.2}s", report.duration.as_secs_f64());
    println!("* Flows: {}", report.flows.len());
    println!("* Packets: {tx} sent, {rx} received, {lost} lost");
    println!(
        "* Packets still in flight at the end: {}",
        report.in_flight_packets
    );
    println!(
        "* Events still pending at the end: {}",
        report.discarded_events
    );
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
