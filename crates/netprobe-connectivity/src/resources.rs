//! Entities, ports and protocols under test
//!
//! This is the cluster collaborator's view of what can be probed. Every
//! table is built over [`Resources::sorted_pod_names`], so all tables of a
//! run share one entity order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::job::{Job, Protocol};
use crate::{Error, Result};

/// Owning workload of a pod, as `kind/name` (e.g. `deployment/web`)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRef {
    /// Workload kind, lowercase (pod, replicaset, deployment, daemonset, statefulset)
    pub kind: String,
    /// Workload name
    pub name: String,
}

/// A probe-able pod
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    /// Namespace the pod runs in
    pub namespace: String,
    /// Pod name
    pub name: String,
    /// Pod IP
    pub ip: String,
    /// Pod labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Container to exec probes from (defaults to the pod's first container)
    #[serde(default)]
    pub container: Option<String>,
    /// Owning workload, if any
    #[serde(default)]
    pub workload: Option<WorkloadRef>,
    /// Named container ports: name -> port
    #[serde(default)]
    pub named_ports: BTreeMap<String, u16>,
}

impl Pod {
    /// Table key for this pod: `namespace/name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Name of the container port serving `port`, if the pod names it
    pub fn port_name(&self, port: u16) -> Option<&str> {
        self.named_ports
            .iter()
            .find(|(_, p)| **p == port)
            .map(|(name, _)| name.as_str())
    }
}

/// A port under test: a number, or a container port name resolved per pod
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPort", into = "RawPort")]
pub enum PortSpec {
    /// Numbered port, probed on every destination pod
    Number(u16),
    /// Named port, probed only on destination pods that declare it
    Name(String),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u16),
    Text(String),
}

impl TryFrom<RawPort> for PortSpec {
    type Error = Error;

    fn try_from(raw: RawPort) -> Result<Self> {
        match raw {
            RawPort::Number(port) => Ok(PortSpec::Number(port)),
            RawPort::Text(text) => text.parse(),
        }
    }
}

impl From<PortSpec> for RawPort {
    fn from(spec: PortSpec) -> Self {
        match spec {
            PortSpec::Number(port) => RawPort::Number(port),
            PortSpec::Name(name) => RawPort::Text(name),
        }
    }
}

impl FromStr for PortSpec {
    type Err = Error;

    /// A number if `s` parses as one, otherwise a port name
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::validation("port must be a number or a port name"));
        }
        Ok(match s.parse::<u16>() {
            Ok(port) => PortSpec::Number(port),
            Err(_) => PortSpec::Name(s.to_string()),
        })
    }
}

impl From<u16> for PortSpec {
    fn from(port: u16) -> Self {
        PortSpec::Number(port)
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Number(port) => write!(f, "{}", port),
            PortSpec::Name(name) => f.write_str(name),
        }
    }
}

impl Pod {
    /// Resolve a port against this pod: `(number, name)`, name empty if unnamed.
    ///
    /// `None` if `spec` names a port this pod does not declare.
    pub fn resolve_port(&self, spec: &PortSpec) -> Option<(u16, String)> {
        match spec {
            PortSpec::Number(port) => {
                Some((*port, self.port_name(*port).unwrap_or("").to_string()))
            }
            PortSpec::Name(name) => self.named_ports.get(name).map(|port| (*port, name.clone())),
        }
    }
}

/// Pods, namespace labels, ports and protocols under test
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resources {
    pods: BTreeMap<String, Pod>,
    namespace_labels: BTreeMap<String, BTreeMap<String, String>>,
    ports: Vec<PortSpec>,
    protocols: Vec<Protocol>,
}

impl Resources {
    /// Build resources.
    ///
    /// Rejects duplicate pods, ports and protocols, and port names that no
    /// pod declares.
    pub fn new(
        pods: Vec<Pod>,
        namespace_labels: BTreeMap<String, BTreeMap<String, String>>,
        ports: Vec<PortSpec>,
        protocols: Vec<Protocol>,
    ) -> Result<Self> {
        let mut by_key = BTreeMap::new();
        for pod in pods {
            let key = pod.key();
            if by_key.insert(key.clone(), pod).is_some() {
                return Err(Error::validation(format!("duplicate pod {}", key)));
            }
        }

        let mut seen_ports = BTreeSet::new();
        for port in &ports {
            if !seen_ports.insert(port) {
                return Err(Error::validation(format!("duplicate port {}", port)));
            }
            if let PortSpec::Name(name) = port {
                if !by_key.values().any(|pod: &Pod| pod.named_ports.contains_key(name)) {
                    return Err(Error::validation(format!(
                        "named port {} is not declared by any pod",
                        name
                    )));
                }
            }
        }

        let mut seen_protocols = BTreeSet::new();
        for protocol in &protocols {
            if !seen_protocols.insert(protocol) {
                return Err(Error::validation(format!("duplicate protocol {}", protocol)));
            }
        }

        Ok(Self {
            pods: by_key,
            namespace_labels,
            ports,
            protocols,
        })
    }

    /// Pod keys in sorted order
    pub fn sorted_pod_names(&self) -> Vec<String> {
        self.pods.keys().cloned().collect()
    }

    /// All pods, sorted by key
    pub fn pods(&self) -> impl Iterator<Item = &Pod> {
        self.pods.values()
    }

    /// Look up a pod by key
    pub fn pod(&self, key: &str) -> Result<&Pod> {
        self.pods.get(key).ok_or_else(|| Error::UnknownPod {
            name: key.to_string(),
        })
    }

    /// Ports under test, as given
    pub fn ports(&self) -> &[PortSpec] {
        &self.ports
    }

    /// Protocols under test
    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }

    /// Labels of a namespace (empty if unknown)
    pub fn namespace_labels(&self, namespace: &str) -> BTreeMap<String, String> {
        self.namespace_labels
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    /// Port numbers probed on `to`, with their names.
    ///
    /// Named ports `to` does not declare are skipped. A number reached by
    /// more than one port under test appears once, named by the first.
    pub fn destination_ports(&self, to: &Pod) -> BTreeMap<u16, String> {
        let mut resolved = BTreeMap::new();
        for spec in &self.ports {
            if let Some((port, name)) = to.resolve_port(spec) {
                resolved.entry(port).or_insert(name);
            }
        }
        resolved
    }

    /// Every probe job: each ordered pod pair, protocol and destination port.
    pub fn jobs(&self, timeout_seconds: u32) -> Vec<Job> {
        let mut jobs = Vec::new();
        for to in self.pods.values() {
            let ports = self.destination_ports(to);
            for from in self.pods.values() {
                for protocol in &self.protocols {
                    for (port, name) in &ports {
                        jobs.push(Job {
                            from_key: from.key(),
                            to_key: to.key(),
                            resolved_port: *port,
                            resolved_port_name: name.clone(),
                            protocol: *protocol,
                            timeout_seconds,
                        });
                    }
                }
            }
        }
        jobs
    }
}

#[cfg(test)]
pub(crate) fn test_pod(namespace: &str, name: &str, ip: &str) -> Pod {
    Pod {
        namespace: namespace.to_string(),
        name: name.to_string(),
        ip: ip.to_string(),
        labels: BTreeMap::from([("pod".to_string(), name.to_string())]),
        container: None,
        workload: None,
        named_ports: BTreeMap::new(),
    }
}

#[cfg(test)]
pub(crate) fn test_resources(names: &[&str], ports: &[u16], protocols: &[Protocol]) -> Resources {
    let pods = names
        .iter()
        .enumerate()
        .map(|(i, name)| test_pod("x", name, &format!("10.0.0.{}", i + 1)))
        .collect();
    let ports = ports.iter().copied().map(PortSpec::from).collect();
    Resources::new(pods, BTreeMap::new(), ports, protocols.to_vec())
        .expect("test resources are unique")
}
