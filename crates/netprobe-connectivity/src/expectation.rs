//! Expectation rules: compile declared connectivity into an expected table
//!
//! Rules run in order over a table seeded by
//! [`Table::with_default_connectivity`], so a later rule overrides an earlier
//! one on the same leg. Loopback pairs are never touched. All rules are
//! validated against the resources before any is applied. A bad rule is a
//! [`Error::Validation`] and never reaches the table's fatal setters.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connectivity::Connectivity;
use crate::job::Protocol;
use crate::resources::{Pod, PortSpec, Resources};
use crate::table::Table;
use crate::{Error, Result};

/// Which pods a rule endpoint matches
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PodSelector {
    /// Every pod (`*`)
    All,
    /// Every pod in a namespace (`<namespace>/*`)
    Namespace(String),
    /// One pod by key (`<namespace>/<name>`)
    Pod(String),
}

impl PodSelector {
    /// Parse `*`, `<namespace>/*` or `<namespace>/<name>`
    pub fn parse(s: &str) -> Result<Self> {
        if s == "*" {
            return Ok(PodSelector::All);
        }
        match s.split_once('/') {
            Some((ns, "*")) if !ns.is_empty() => Ok(PodSelector::Namespace(ns.to_string())),
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(PodSelector::Pod(s.to_string()))
            }
            _ => Err(Error::validation(format!(
                "invalid pod selector '{}': expected '*', '<namespace>/*' or '<namespace>/<pod>'",
                s
            ))),
        }
    }

    /// Whether `pod` is selected
    pub fn matches(&self, pod: &Pod) -> bool {
        match self {
            PodSelector::All => true,
            PodSelector::Namespace(ns) => pod.namespace == *ns,
            PodSelector::Pod(key) => pod.key() == *key,
        }
    }
}

impl fmt::Display for PodSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodSelector::All => f.write_str("*"),
            PodSelector::Namespace(ns) => write!(f, "{}/*", ns),
            PodSelector::Pod(key) => f.write_str(key),
        }
    }
}

impl TryFrom<String> for PodSelector {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        PodSelector::parse(&s)
    }
}

impl From<PodSelector> for String {
    fn from(selector: PodSelector) -> Self {
        selector.to_string()
    }
}

/// Declared connectivity for traffic between selected pods
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationRule {
    /// Source pods
    pub from: PodSelector,
    /// Destination pods
    pub to: PodSelector,
    /// Port the rule applies to, by number or by name (all ports under test if unset)
    #[serde(default)]
    pub port: Option<PortSpec>,
    /// Protocol the rule applies to (all protocols under test if unset)
    #[serde(default)]
    pub protocol: Option<Protocol>,
    /// New ingress leg, if the rule sets one
    #[serde(default)]
    pub ingress: Option<Connectivity>,
    /// New egress leg, if the rule sets one
    #[serde(default)]
    pub egress: Option<Connectivity>,
}

impl ExpectationRule {
    fn validate(&self, resources: &Resources) -> Result<()> {
        if self.ingress.is_none() && self.egress.is_none() {
            return Err(Error::validation(format!(
                "rule {} -> {} sets neither ingress nor egress",
                self.from, self.to
            )));
        }
        match &self.port {
            Some(PortSpec::Name(name)) => {
                if !resources.pods().any(|p| p.named_ports.contains_key(name)) {
                    return Err(Error::validation(format!(
                        "rule {} -> {} names port {} which is not declared by any pod",
                        self.from, self.to, name
                    )));
                }
            }
            Some(PortSpec::Number(port)) => {
                if !resources
                    .pods()
                    .any(|p| resources.destination_ports(p).contains_key(port))
                {
                    return Err(Error::validation(format!(
                        "rule {} -> {} names port {} which is not under test",
                        self.from, self.to, port
                    )));
                }
            }
            None => {}
        }
        if let Some(protocol) = self.protocol {
            if !resources.protocols().contains(&protocol) {
                return Err(Error::validation(format!(
                    "rule {} -> {} names protocol {} which is not under test",
                    self.from, self.to, protocol
                )));
            }
        }
        for selector in [&self.from, &self.to] {
            if *selector != PodSelector::All && !resources.pods().any(|p| selector.matches(p)) {
                return Err(Error::validation(format!(
                    "selector {} matches no pod",
                    selector
                )));
            }
        }
        Ok(())
    }
}

/// Apply `rules` in order to a table seeded from `resources`.
///
/// Returns the number of legs written.
pub fn apply_rules(table: &mut Table, resources: &Resources, rules: &[ExpectationRule]) -> Result<usize> {
    for rule in rules {
        rule.validate(resources)?;
    }

    let mut updated = 0;
    for rule in rules {
        let protocols: Vec<Protocol> = match rule.protocol {
            Some(protocol) => vec![protocol],
            None => resources.protocols().to_vec(),
        };

        for from in resources.pods().filter(|p| rule.from.matches(p)) {
            for to in resources.pods().filter(|p| rule.to.matches(p)) {
                let (from_key, to_key) = (from.key(), to.key());
                if from_key == to_key {
                    continue;
                }
                // Only ports this destination is probed on
                let probed = resources.destination_ports(to);
                let ports: Vec<u16> = match &rule.port {
                    Some(spec) => to
                        .resolve_port(spec)
                        .map(|(port, _)| port)
                        .filter(|port| probed.contains_key(port))
                        .into_iter()
                        .collect(),
                    None => probed.into_keys().collect(),
                };
                for protocol in &protocols {
                    for port in &ports {
                        if let Some(ingress) = rule.ingress {
                            table.set_ingress(ingress, &from_key, &to_key, *port, *protocol);
                            updated += 1;
                        }
                        if let Some(egress) = rule.egress {
                            table.set_egress(egress, &from_key, &to_key, *port, *protocol);
                            updated += 1;
                        }
                    }
                }
            }
        }

        debug!(from = %rule.from, to = %rule.to, "applied expectation rule");
    }

    Ok(updated)
}
