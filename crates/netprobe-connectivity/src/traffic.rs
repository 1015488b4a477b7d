//! Descriptive traffic model for reports
//!
//! Peers describe who is talking to whom in human terms (workload, namespace,
//! labels, IP). Nothing here feeds back into expected or observed tables.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info};

use crate::grid::render_grid;
use crate::job::Protocol;
use crate::resources::Resources;
use crate::{Error, Result};

/// Workload kinds a locator may name
const WORKLOAD_KINDS: [&str; 5] = ["pod", "replicaset", "deployment", "daemonset", "statefulset"];

/// Networking details of one pod backing a peer
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodNetworking {
    /// Pod IP
    pub ip: String,
}

/// A peer inside the cluster
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InternalPeer {
    /// Workload locator (`namespace/kind/name`), empty if not known
    pub workload: String,
    /// Labels of the pods
    pub pod_labels: BTreeMap<String, String>,
    /// Labels of the namespace
    pub namespace_labels: BTreeMap<String, String>,
    /// Namespace
    pub namespace: String,
    /// Pods backing the peer, when resolved
    pub pods: Vec<PodNetworking>,
}

/// Either end of a connection: internal (with an optional IP) or a bare external IP
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrafficPeer {
    /// Cluster-side identity; `None` for peers outside the cluster
    pub internal: Option<InternalPeer>,
    /// IP address, if known
    pub ip: String,
}

impl TrafficPeer {
    /// A peer outside the cluster
    pub fn external(ip: impl Into<String>) -> Self {
        Self {
            internal: None,
            ip: ip.into(),
        }
    }

    /// Whether the peer lies outside the cluster
    pub fn is_external(&self) -> bool {
        self.internal.is_none()
    }

    /// Namespace of an internal peer, empty for external ones
    pub fn namespace(&self) -> &str {
        self.internal
            .as_ref()
            .map(|i| i.namespace.as_str())
            .unwrap_or("")
    }

    /// Short label: workload if known, else `namespace/[labels]`, else the IP
    pub fn pretty_string(&self) -> String {
        match &self.internal {
            None => self.ip.clone(),
            Some(internal) if !internal.workload.is_empty() => internal.workload.clone(),
            Some(internal) => format!(
                "{}/{}",
                internal.namespace,
                labels_to_string_slim(&internal.pod_labels)
            ),
        }
    }
}

/// A connection between two peers on one port/protocol
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Traffic {
    /// Initiating peer
    pub source: TrafficPeer,
    /// Receiving peer
    pub destination: TrafficPeer,
    /// Destination port number
    pub resolved_port: u16,
    /// Destination port name, empty if unnamed
    pub resolved_port_name: String,
    /// Transport protocol
    pub protocol: Protocol,
}

impl Traffic {
    /// Create traffic without a port name
    pub fn new(source: TrafficPeer, destination: TrafficPeer, port: u16, protocol: Protocol) -> Self {
        Self {
            source,
            destination,
            resolved_port: port,
            resolved_port_name: String::new(),
            protocol,
        }
    }

    /// `src -> dst:port (protocol)`
    pub fn pretty_string(&self) -> String {
        format!(
            "{} -> {}:{} ({})",
            self.source.pretty_string(),
            self.destination.pretty_string(),
            self.resolved_port,
            self.protocol
        )
    }

    /// Grid with one row per peer: port, role, IP, namespace and labels
    pub fn table(&self) -> String {
        let pp = format!(
            "{} ({}) on {}",
            self.resolved_port, self.resolved_port_name, self.protocol
        );
        let header: Vec<String> = [
            "Port/Protocol",
            "Source/Dest",
            "Pod IP",
            "Namespace",
            "NS Labels",
            "Pod Labels",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let rows = vec![
            peer_row(&pp, "source", &self.source),
            peer_row(&pp, "destination", &self.destination),
        ];
        render_grid(&header, &rows, true)
    }
}

impl fmt::Display for Traffic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty_string())
    }
}

fn peer_row(pp: &str, role: &str, peer: &TrafficPeer) -> Vec<String> {
    let mut row = vec![pp.to_string(), role.to_string(), peer.ip.clone()];
    match &peer.internal {
        Some(internal) => row.extend([
            internal.namespace.clone(),
            labels_to_string(&internal.namespace_labels),
            labels_to_string(&internal.pod_labels),
        ]),
        None => row.extend([String::new(), String::new(), String::new()]),
    }
    row
}

/// One `key: value` per line, sorted by key
fn labels_to_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `[k1=v1,k2=v2]`, sorted by key
fn labels_to_string_slim(labels: &BTreeMap<String, String>) -> String {
    let list = labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",");
    format!("[{}]", list)
}

/// A parsed `namespace/kind/name` workload locator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadLocator {
    /// Namespace
    pub namespace: String,
    /// Workload kind, lowercase
    pub kind: String,
    /// Workload name, lowercase
    pub name: String,
}

impl WorkloadLocator {
    /// Parse `namespace/kind/name`. Kind must be one of pod, replicaset,
    /// deployment, daemonset or statefulset (any case).
    pub fn parse(locator: &str) -> Result<Self> {
        let lower = locator.to_lowercase();
        let parts: Vec<&str> = lower.split('/').collect();
        let [namespace, kind, name] = parts.as_slice() else {
            return Err(Error::invalid_workload(
                locator,
                "expected <namespace>/<workloadType>/<workloadName>",
            ));
        };
        if namespace.is_empty() || kind.is_empty() || name.is_empty() {
            return Err(Error::invalid_workload(locator, "all three fields are required"));
        }
        if !WORKLOAD_KINDS.contains(kind) {
            return Err(Error::invalid_workload(
                locator,
                format!(
                    "unsupported workload type '{}': expected one of {}",
                    kind,
                    WORKLOAD_KINDS.join(", ")
                ),
            ));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for WorkloadLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind, self.name)
    }
}

/// Resolves a workload locator to the peer it currently denotes
pub trait PeerResolver {
    /// Resolve `locator`. `Ok(None)` means no such workload exists right now.
    fn resolve(&self, locator: &WorkloadLocator) -> Result<Option<TrafficPeer>>;
}

/// [`PeerResolver`] over a static set of [`Resources`]
pub struct ResourcesPeerResolver<'a> {
    resources: &'a Resources,
}

impl<'a> ResourcesPeerResolver<'a> {
    /// Resolve against `resources`
    pub fn new(resources: &'a Resources) -> Self {
        Self { resources }
    }
}

impl PeerResolver for ResourcesPeerResolver<'_> {
    fn resolve(&self, locator: &WorkloadLocator) -> Result<Option<TrafficPeer>> {
        let matching: Vec<_> = self
            .resources
            .pods()
            .filter(|pod| pod.namespace.to_lowercase() == locator.namespace)
            .filter(|pod| {
                if locator.kind == "pod" {
                    pod.name.to_lowercase() == locator.name
                } else {
                    pod.workload.as_ref().is_some_and(|w| {
                        w.kind.to_lowercase() == locator.kind
                            && w.name.to_lowercase() == locator.name
                    })
                }
            })
            .collect();

        let Some(first) = matching.first() else {
            info!(workload = %locator, "workload not found");
            return Ok(None);
        };

        let internal = InternalPeer {
            workload: locator.to_string(),
            pod_labels: first.labels.clone(),
            namespace_labels: self.resources.namespace_labels(&first.namespace),
            namespace: first.namespace.clone(),
            pods: matching
                .iter()
                .map(|pod| PodNetworking { ip: pod.ip.clone() })
                .collect(),
        };
        debug!(
            workload = %locator,
            pods = internal.pods.len(),
            namespace = %internal.namespace,
            "resolved workload"
        );

        Ok(Some(TrafficPeer {
            ip: first.ip.clone(),
            internal: Some(internal),
        }))
    }
}
