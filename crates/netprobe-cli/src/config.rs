//! Scenario files: the pods, ports and expectations a run probes.
//!
//! The scenario path resolution chain (highest priority first):
//! 1. Explicit `--scenario` flag
//! 2. `NETPROBE_SCENARIO` environment variable
//! 3. `./netprobe.yaml` in the working directory

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use netprobe_connectivity::{
    apply_rules, Connectivity, ExpectationRule, Pod, PortSpec, Protocol, Resources, Table,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

const NETPROBE_SCENARIO_ENV: &str = "NETPROBE_SCENARIO";
const DEFAULT_SCENARIO_FILE: &str = "netprobe.yaml";

/// Default legs applied to every non-loopback job before rules run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// Ingress leg
    #[serde(default = "allowed")]
    pub ingress: Connectivity,
    /// Egress leg
    #[serde(default = "allowed")]
    pub egress: Connectivity,
}

fn allowed() -> Connectivity {
    Connectivity::Allowed
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            ingress: Connectivity::Allowed,
            egress: Connectivity::Allowed,
        }
    }
}

/// A scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Pods under test
    pub pods: Vec<Pod>,
    /// Namespace name -> namespace labels
    #[serde(default)]
    pub namespaces: BTreeMap<String, BTreeMap<String, String>>,
    /// Ports probed: numbers on every pod, names on the pods declaring them
    pub ports: Vec<PortSpec>,
    /// Protocols probed on every port
    pub protocols: Vec<Protocol>,
    /// Default expectation before rules
    #[serde(default)]
    pub defaults: Defaults,
    /// Expectation rules, applied in order
    #[serde(default)]
    pub rules: Vec<ExpectationRule>,
}

impl Scenario {
    /// Parse and validate a scenario from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check the scenario describes something probe-able.
    pub fn validate(&self) -> Result<()> {
        if self.pods.is_empty() {
            return Err(Error::validation("scenario lists no pods"));
        }
        if self.ports.is_empty() {
            return Err(Error::validation("scenario lists no ports"));
        }
        if self.protocols.is_empty() {
            return Err(Error::validation("scenario lists no protocols"));
        }

        for pod in &self.pods {
            if pod.ip.parse::<IpAddr>().is_err() {
                return Err(Error::validation(format!(
                    "pod {} has invalid ip '{}'",
                    pod.key(),
                    pod.ip
                )));
            }
        }

        // Duplicates and undeclared port names
        self.resources()?;
        Ok(())
    }

    /// Resources under test
    pub fn resources(&self) -> Result<Resources> {
        Ok(Resources::new(
            self.pods.clone(),
            self.namespaces.clone(),
            self.ports.clone(),
            self.protocols.clone(),
        )?)
    }

    /// Expected table: defaults for every job, then the rules in order.
    ///
    /// Jobs carry `timeout_seconds`, matching the jobs probed against it.
    pub fn expected_table(&self, resources: &Resources, timeout_seconds: u32) -> Result<Table> {
        let mut table = Table::with_job_defaults(
            resources,
            resources.jobs(timeout_seconds),
            self.defaults.ingress,
            self.defaults.egress,
        );
        let updated = apply_rules(&mut table, resources, &self.rules)?;
        debug!(rules = self.rules.len(), legs = updated, "compiled expectations");
        Ok(table)
    }
}

/// Load and validate a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::command_failed(format!("failed to read {}: {}", path.display(), e)))?;
    Scenario::from_yaml(&data)
}

/// Resolve the scenario path using the priority chain.
pub fn resolve_scenario_path(explicit: Option<&Path>) -> Result<PathBuf> {
    resolve_from(
        explicit,
        std::env::var(NETPROBE_SCENARIO_ENV).ok(),
        Path::new(DEFAULT_SCENARIO_FILE),
    )
}

fn resolve_from(explicit: Option<&Path>, env: Option<String>, fallback: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = env {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    if fallback.exists() {
        return Ok(fallback.to_path_buf());
    }

    Err(Error::validation(format!(
        "no scenario given: pass --scenario, set {} or create ./{}",
        NETPROBE_SCENARIO_ENV, DEFAULT_SCENARIO_FILE
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
pods:
  - namespace: x
    name: a
    ip: 10.0.0.1
    labels: {pod: a}
  - namespace: x
    name: b
    ip: 10.0.0.2
    labels: {pod: b}
    namedPorts: {http: 80}
  - namespace: y
    name: a
    ip: 10.0.1.1
namespaces:
  x: {ns: x}
ports: [80, 81]
protocols: [TCP]
defaults:
  egress: allowed
rules:
  - from: "*"
    to: "y/*"
    ingress: denied
"#;

    #[test]
    fn scenario_compiles_to_expected_table() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        assert_eq!(scenario.defaults, Defaults::default());

        let resources = scenario.resources().unwrap();
        assert_eq!(resources.sorted_pod_names(), vec!["x/a", "x/b", "y/a"]);
        assert_eq!(resources.namespace_labels("x").get("ns").map(String::as_str), Some("x"));

        let table = scenario.expected_table(&resources, 3).unwrap();
        let combined = |from: &str, to: &str| table.get(from, to).get("tcp/80").unwrap().combined;
        assert_eq!(combined("x/a", "y/a"), Connectivity::Denied);
        assert_eq!(combined("x/a", "x/b"), Connectivity::Allowed);
        assert_eq!(combined("y/a", "y/a"), Connectivity::Undefined);
        assert_eq!(
            table.get("x/a", "x/b").get("tcp/80").unwrap().job.resolved_port_name,
            "http"
        );
    }

    #[test]
    fn scenario_validation() {
        let cases = [
            ("pods: []\nports: [80]\nprotocols: [tcp]", "no pods"),
            (
                "pods: [{namespace: x, name: a, ip: 10.0.0.1}]\nports: []\nprotocols: [tcp]",
                "no ports",
            ),
            (
                "pods: [{namespace: x, name: a, ip: 10.0.0.1}]\nports: [80]\nprotocols: []",
                "no protocols",
            ),
            (
                "pods: [{namespace: x, name: a, ip: nope}]\nports: [80]\nprotocols: [tcp]",
                "invalid ip",
            ),
            (
                "pods: [{namespace: x, name: a, ip: 10.0.0.1}, {namespace: x, name: a, ip: 10.0.0.2}]\nports: [80]\nprotocols: [tcp]",
                "duplicate pod x/a",
            ),
            (
                "pods: [{namespace: x, name: a, ip: 10.0.0.1}]\nports: [80, 80]\nprotocols: [tcp]",
                "duplicate port 80",
            ),
            (
                "pods: [{namespace: x, name: a, ip: 10.0.0.1}]\nports: [80]\nprotocols: [tcp, TCP]",
                "duplicate protocol tcp",
            ),
            (
                "pods: [{namespace: x, name: a, ip: 10.0.0.1, namedPorts: {http: 80}}]\nports: [80, web]\nprotocols: [tcp]",
                "named port web is not declared by any pod",
            ),
        ];
        for (yaml, message) in cases {
            let err = Scenario::from_yaml(yaml).unwrap_err();
            assert!(
                err.to_string().contains(message),
                "expected '{}' in '{}'",
                message,
                err
            );
        }
    }

    #[test]
    fn named_ports_probe_only_declaring_pods() {
        let yaml = r#"
pods:
  - {namespace: x, name: a, ip: 10.0.0.1}
  - {namespace: x, name: b, ip: 10.0.0.2, namedPorts: {web: 8080}}
ports: [80, web]
protocols: [tcp]
rules:
  - {from: x/a, to: "*", port: web, ingress: denied}
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(
            scenario.ports,
            vec![PortSpec::Number(80), PortSpec::Name("web".to_string())]
        );

        let resources = scenario.resources().unwrap();
        let table = scenario.expected_table(&resources, 3).unwrap();
        let to_b = table.get("x/a", "x/b");
        assert_eq!(to_b.keys().collect::<Vec<_>>(), vec!["tcp/80", "tcp/8080"]);
        assert_eq!(to_b.get("tcp/8080").unwrap().job.resolved_port_name, "web");
        assert_eq!(to_b.get("tcp/8080").unwrap().combined, Connectivity::Denied);
        assert_eq!(to_b.get("tcp/80").unwrap().combined, Connectivity::Allowed);
        assert_eq!(table.get("x/b", "x/a").keys().collect::<Vec<_>>(), vec!["tcp/80"]);
    }

    #[test]
    fn expected_jobs_carry_the_probe_timeout() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        let resources = scenario.resources().unwrap();
        let table = scenario.expected_table(&resources, 9).unwrap();
        let jobs = table.jobs();
        assert_eq!(jobs.len(), resources.jobs(9).len());
        assert!(jobs.iter().all(|j| j.timeout_seconds == 9));
    }

    #[test]
    fn bad_rule_surfaces_as_connectivity_error() {
        let yaml = format!("{}\n  - from: x/a\n    to: x/b\n    port: 9999\n    egress: denied\n", SCENARIO);
        let scenario = Scenario::from_yaml(&yaml).unwrap();
        let resources = scenario.resources().unwrap();
        let err = scenario.expected_table(&resources, 3).unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
    }

    #[test]
    fn load_scenario_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.yaml");
        std::fs::write(&path, SCENARIO).unwrap();

        let scenario = load_scenario(&path).unwrap();
        assert_eq!(scenario.pods.len(), 3);

        let missing = load_scenario(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(missing.to_string().contains("failed to read"));
    }

    #[test]
    fn resolve_explicit_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join(DEFAULT_SCENARIO_FILE);
        std::fs::write(&fallback, SCENARIO).unwrap();

        let resolved = resolve_from(
            Some(Path::new("/explicit.yaml")),
            Some("/env.yaml".to_string()),
            &fallback,
        )
        .unwrap();
        assert_eq!(resolved, PathBuf::from("/explicit.yaml"));
    }

    #[test]
    fn resolve_env_then_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join(DEFAULT_SCENARIO_FILE);

        let resolved = resolve_from(None, Some("/env.yaml".to_string()), &fallback).unwrap();
        assert_eq!(resolved, PathBuf::from("/env.yaml"));

        // Empty env var is ignored
        assert!(resolve_from(None, Some(String::new()), &fallback).is_err());

        std::fs::write(&fallback, SCENARIO).unwrap();
        let resolved = resolve_from(None, None, &fallback).unwrap();
        assert_eq!(resolved, fallback);
    }
}
