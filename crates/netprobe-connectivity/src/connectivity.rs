//! Tri-state connectivity values and the ingress/egress combination rule

use std::fmt;

use serde::{Deserialize, Serialize};

/// Expected or observed reachability for one job
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Traffic is permitted
    Allowed,
    /// Traffic is dropped or rejected
    #[serde(alias = "blocked")]
    Denied,
    /// No evidence either way (loopback, or unresolved state)
    #[default]
    Undefined,
}

impl Connectivity {
    /// Single-character form used in rendered tables
    pub fn short_string(&self) -> &'static str {
        match self {
            Connectivity::Allowed => ".",
            Connectivity::Denied => "X",
            Connectivity::Undefined => "#",
        }
    }

    /// Connectivity for a probe that did or did not reach its destination
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            Connectivity::Allowed
        } else {
            Connectivity::Denied
        }
    }

    /// Combine the ingress and egress legs into a single verdict.
    ///
    /// A denial on either leg wins. Allowed needs both legs to agree. Every
    /// other combination is unresolved and yields `None`: the caller keeps
    /// whatever combined value it already had.
    pub fn combine(ingress: Connectivity, egress: Connectivity) -> Option<Connectivity> {
        if ingress == Connectivity::Denied || egress == Connectivity::Denied {
            Some(Connectivity::Denied)
        } else if ingress == Connectivity::Allowed && egress == Connectivity::Allowed {
            Some(Connectivity::Allowed)
        } else {
            None
        }
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Connectivity::Allowed => "allowed",
            Connectivity::Denied => "denied",
            Connectivity::Undefined => "undefined",
        };
        f.write_str(s)
    }
}
