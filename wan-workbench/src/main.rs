use crate::config::SimulationConfig;
use crate::config::cli::{CliOpt, Command};
use anyhow::Context;
use clap::Parser;
use fastrand::Rng;
use std::fs;
use tracing_subscriber::EnvFilter;
use wan_network::scenarios::{
    self, FailoverOptions, MultiHopOptions, PolicyRoutingOptions, QosOptions, SecurityOptions,
};
use wan_network::simulation::{Simulation, SimulationSpec};

mod config;
mod report;

fn main() -> anyhow::Result<()> {
    let options = CliOpt::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    let spec = simulation_spec(&options)?;
    run_and_report_stats(&options, spec)
}

fn simulation_spec(options: &CliOpt) -> anyhow::Result<SimulationSpec> {
    let spec = match &options.command {
        Command::Failover(opt) => scenarios::multi_site_failover(FailoverOptions {
            duration: opt.duration,
            failure_at: (!opt.no_failure).then_some(opt.failure_at),
            restore_at: opt.restore_at,
        }),
        Command::Qos(opt) => scenarios::qos_mixed_traffic(QosOptions {
            qos: !opt.no_qos,
            queue_packets: opt.queue_packets,
            duration: opt.duration,
        }),
        Command::Security(opt) => scenarios::wan_security(SecurityOptions {
            ddos: opt.ddos,
            attackers: opt.attackers,
            rate_limit_bps: opt.rate_limit_bps,
            ipsec: opt.ipsec,
            eavesdrop: opt.eavesdrop,
            duration: opt.duration,
        }),
        Command::MultiHop(opt) => scenarios::multi_hop(MultiHopOptions {
            dynamic_routing: opt.dynamic_routing,
            failure_at: opt.failure_at,
            restore_at: opt.restore_at,
            duration: opt.duration,
        }),
        Command::Policy(opt) => scenarios::policy_routing(PolicyRoutingOptions {
            period: opt.period,
            duration: opt.duration,
        }),
        Command::Custom(opt) => SimulationConfig::load(opt)?
            .into_simulation_spec(opt)
            .context("invalid simulation config")?,
    };

    Ok(spec)
}

fn run_and_report_stats(options: &CliOpt, spec: SimulationSpec) -> anyhow::Result<()> {
    println!("--- Params ---");
    let network_rng_seed = if options.non_deterministic {
        Rng::new().u64(..)
    } else {
        options.network_rng_seed
    };
    println!("* Network seed: {network_rng_seed}");
    println!("* Duration: {:.2}s", spec.duration.as_secs_f64());
    println!("* Traffic sources: {}", spec.sources.len());

    let mut simulation = Simulation::new(spec, Rng::with_seed(network_rng_seed))
        .context("invalid simulation setup")?;
    report::print_network(simulation.network());

    let report = simulation.finish();

    println!("--- Replay log ---");
    let json_steps = serde_json::to_vec_pretty(&simulation.tracer().steps())
        .context("failed to serialize replay log")?;
    fs::write(&options.replay_log, json_steps).context("failed to store replay log")?;
    println!(
        "* Replay log available at {}",
        options.replay_log.display()
    );

    let json_flows =
        serde_json::to_vec_pretty(&report.flows).context("failed to serialize flow stats")?;
    fs::write(&options.flow_stats, json_flows).context("failed to store flow stats")?;
    println!(
        "* Flow stats available at {}",
        options.flow_stats.display()
    );

    report::print_flows(&report);
    report::print_queues(&report);
    report::print_security(&report);
    report::print_summary(&report);

    Ok(())
}
