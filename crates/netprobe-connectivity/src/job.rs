//! Probe jobs and their expected/observed results

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::connectivity::Connectivity;
use crate::Error;

/// Transport protocol a job is probed over
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP
    #[serde(alias = "TCP")]
    Tcp,
    /// UDP
    #[serde(alias = "UDP")]
    Udp,
    /// SCTP
    #[serde(alias = "SCTP")]
    Sctp,
}

impl Protocol {
    /// Kubernetes wire name (`TCP`, `UDP`, `SCTP`)
    pub fn as_kube(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Sctp => "SCTP",
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Sctp => "sctp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "sctp" => Ok(Protocol::Sctp),
            other => Err(Error::validation(format!(
                "unsupported protocol '{}': expected one of tcp, udp, sctp",
                other
            ))),
        }
    }
}

/// Cell key for a (protocol, port) pair, e.g. `tcp/80`
pub fn port_protocol_key(protocol: Protocol, port: u16) -> String {
    format!("{}/{}", protocol, port)
}

/// One probe: a connection attempt from one entity to another
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Source entity key
    pub from_key: String,
    /// Destination entity key
    pub to_key: String,
    /// Destination port number
    pub resolved_port: u16,
    /// Name of the destination port, empty if unnamed
    pub resolved_port_name: String,
    /// Protocol to probe with
    pub protocol: Protocol,
    /// How long the collaborator may wait for the connection
    pub timeout_seconds: u32,
}

impl Job {
    /// The `protocol/port` key this job is stored under within its cell
    pub fn key(&self) -> String {
        port_protocol_key(self.protocol, self.resolved_port)
    }

    /// Whether the job probes an entity from itself
    pub fn is_loopback(&self) -> bool {
        self.from_key == self.to_key
    }
}

/// A job together with its expected legs, combined verdict and observation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobResult {
    /// The probe specification
    pub job: Job,
    /// Expected ingress leg
    pub ingress: Connectivity,
    /// Expected egress leg
    pub egress: Connectivity,
    /// Combined verdict, derived from the two legs
    pub combined: Connectivity,
    /// Outcome reported by the probe collaborator, once executed
    pub observed: Option<Connectivity>,
}

impl JobResult {
    /// Create a result with the given expected legs and a derived verdict.
    ///
    /// Combined starts as `Undefined` and is then recomputed, so unresolved
    /// leg combinations stay `Undefined`.
    pub fn expected(job: Job, ingress: Connectivity, egress: Connectivity) -> Self {
        let mut result = Self {
            job,
            ingress,
            egress,
            combined: Connectivity::Undefined,
            observed: None,
        };
        result.recompute_combined();
        result
    }

    /// Create a result from a probe outcome.
    ///
    /// Both legs take the observed value, so the combined verdict equals it.
    pub fn observed(job: Job, reachable: bool) -> Self {
        let connectivity = Connectivity::from_reachable(reachable);
        let mut result = Self::expected(job, connectivity, connectivity);
        result.observed = Some(connectivity);
        result
    }

    /// The `protocol/port` key of the underlying job
    pub fn key(&self) -> String {
        self.job.key()
    }

    pub(crate) fn set_ingress(&mut self, ingress: Connectivity) {
        self.ingress = ingress;
        self.recompute_combined();
    }

    pub(crate) fn set_egress(&mut self, egress: Connectivity) {
        self.egress = egress;
        self.recompute_combined();
    }

    fn recompute_combined(&mut self) {
        if let Some(combined) = Connectivity::combine(self.ingress, self.egress) {
            self.combined = combined;
        }
    }
}

#[cfg(test)]
pub(crate) fn test_job(from: &str, to: &str, protocol: Protocol, port: u16) -> Job {
    Job {
        from_key: from.to_string(),
        to_key: to.to_string(),
        resolved_port: port,
        resolved_port_name: String::new(),
        protocol,
        timeout_seconds: 3,
    }
}
