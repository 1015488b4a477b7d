//! Traffic command
//!
//! Describes one connection between two peers of the scenario.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Args;
use netprobe_connectivity::{
    PeerResolver, PortSpec, Protocol, Resources, ResourcesPeerResolver, Traffic, TrafficPeer,
    WorkloadLocator,
};

use super::load_scenario;
use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct TrafficArgs {
    /// Scenario file (falls back to NETPROBE_SCENARIO, then ./netprobe.yaml)
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Source peer: <namespace>/<workloadType>/<workloadName> or an external IP
    #[arg(long)]
    pub source: String,

    /// Destination peer: <namespace>/<workloadType>/<workloadName> or an external IP
    #[arg(long)]
    pub destination: String,

    /// Destination port: a number, or a port name the destination pod declares
    #[arg(long)]
    pub port: PortSpec,

    /// Transport protocol
    #[arg(long, default_value = "tcp")]
    pub protocol: Protocol,
}

pub async fn run(args: TrafficArgs) -> Result<()> {
    let (_, resources) = load_scenario(args.scenario.as_deref())?;
    let traffic = describe(&resources, &args.source, &args.destination, &args.port, args.protocol)?;

    println!("{}", traffic.pretty_string());
    print!("{}", traffic.table());
    Ok(())
}

/// Resolve both peers and build the traffic description
pub fn describe(
    resources: &Resources,
    source: &str,
    destination: &str,
    port: &PortSpec,
    protocol: Protocol,
) -> Result<Traffic> {
    let resolver = ResourcesPeerResolver::new(resources);
    let source = resolve_peer(&resolver, source)?;
    let destination = resolve_peer(&resolver, destination)?;

    let (port, port_name) = match resources.pods().find(|pod| pod.ip == destination.ip) {
        Some(pod) => pod.resolve_port(port).ok_or_else(|| {
            Error::validation(format!("pod {} declares no port named {}", pod.key(), port))
        })?,
        None => match port {
            PortSpec::Number(number) => (*number, String::new()),
            PortSpec::Name(name) => {
                return Err(Error::validation(format!(
                    "named port {} needs a pod destination, {} is external",
                    name, destination.ip
                )))
            }
        },
    };

    let mut traffic = Traffic::new(source, destination, port, protocol);
    traffic.resolved_port_name = port_name;
    Ok(traffic)
}

fn resolve_peer(resolver: &impl PeerResolver, peer: &str) -> Result<TrafficPeer> {
    if peer.parse::<IpAddr>().is_ok() {
        return Ok(TrafficPeer::external(peer));
    }
    let locator = WorkloadLocator::parse(peer)?;
    resolver
        .resolve(&locator)?
        .ok_or_else(|| Error::validation(format!("workload {} not found", locator)))
}
