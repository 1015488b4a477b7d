//! CLI commands

use std::path::Path;

use netprobe_connectivity::Resources;
use tracing::info;

use crate::config::{self, Scenario};
use crate::Result;

pub mod expect;
pub mod probe;
pub mod traffic;

/// Resolve, load and validate the scenario, returning it with its resources.
pub fn load_scenario(explicit: Option<&Path>) -> Result<(Scenario, Resources)> {
    let path = config::resolve_scenario_path(explicit)?;
    let scenario = config::load_scenario(&path)?;
    let resources = scenario.resources()?;
    info!(
        scenario = %path.display(),
        pods = scenario.pods.len(),
        ports = scenario.ports.len(),
        protocols = scenario.protocols.len(),
        "loaded scenario"
    );
    Ok((scenario, resources))
}
