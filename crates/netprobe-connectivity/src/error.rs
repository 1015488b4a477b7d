//! Error types for the connectivity engine
//!
//! Only conditions a caller can act on are represented here. Broken table
//! invariants (unknown entities, unseeded cells) panic instead, since no
//! partially built table can be reported safely.

use thiserror::Error;

/// Main error type for connectivity operations
#[derive(Debug, Error)]
pub enum Error {
    /// A cell already holds a job result under this key
    #[error("unable to add job result: duplicate key {key} ({from} -> {to})")]
    DuplicateJobResult {
        /// The `protocol/port` key that collided
        key: String,
        /// Source entity of the cell
        from: String,
        /// Destination entity of the cell
        to: String,
    },

    /// A pod name was not found in the resources under test
    #[error("unknown pod: {name}")]
    UnknownPod {
        /// The pod key (`namespace/name`) that was looked up
        name: String,
    },

    /// The probe collaborator failed to run a connection attempt
    #[error("probe error [{source_pod} -> {destination}]: {message}")]
    Probe {
        /// Pod the probe was issued from
        source_pod: String,
        /// Destination address of the probe
        destination: String,
        /// Description of what failed
        message: String,
    },

    /// A workload locator string could not be interpreted
    #[error("invalid workload '{locator}': {message}")]
    InvalidWorkload {
        /// The locator as given
        locator: String,
        /// Description of what's invalid
        message: String,
    },

    /// Invalid expectation rules or resources
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a probe error for a source pod and destination address
    pub fn probe(
        source_pod: impl Into<String>,
        destination: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Probe {
            source_pod: source_pod.into(),
            destination: destination.into(),
            message: msg.into(),
        }
    }

    /// Create an invalid workload error
    pub fn invalid_workload(locator: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidWorkload {
            locator: locator.into(),
            message: msg.into(),
        }
    }

    /// Check if the failed operation may succeed when run again
    ///
    /// Probe failures come from the cluster and may be transient. Everything
    /// else needs a change to the inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Probe { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_message_names_the_cell() {
        let err = Error::DuplicateJobResult {
            key: "tcp/80".to_string(),
            from: "x/a".to_string(),
            to: "y/b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unable to add job result: duplicate key tcp/80 (x/a -> y/b)"
        );
    }

    #[test]
    fn only_probe_errors_are_retryable() {
        assert!(Error::probe("x/a", "10.0.0.2:80", "exec failed").is_retryable());
        assert!(!Error::validation("bad rule").is_retryable());
        assert!(!Error::invalid_workload("x/foo", "missing kind").is_retryable());
        assert!(!Error::UnknownPod {
            name: "x/z".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn probe_error_message_includes_endpoints() {
        let err = Error::probe("x/a", "10.0.0.2:80", "kubectl exited with 1");
        let msg = err.to_string();
        assert!(msg.contains("x/a -> 10.0.0.2:80"));
        assert!(msg.contains("kubectl exited with 1"));
    }
}
