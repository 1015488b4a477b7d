//! Connectivity truth tables for network policy testing
//!
//! Expected connectivity is declared per (source, destination, port,
//! protocol) job, probed through a [`Prober`], and compared cell by cell.

#![deny(missing_docs)]

pub mod comparison;
pub mod connectivity;
pub mod error;
pub mod expectation;
pub mod grid;
pub mod job;
pub mod probe;
pub mod resources;
pub mod result;
pub mod table;
pub mod traffic;
pub mod truth_table;

pub use comparison::{ComparisonEntry, ComparisonTable, Verdict, VerdictCounts};
pub use connectivity::Connectivity;
pub use error::Error;
pub use expectation::{apply_rules, ExpectationRule, PodSelector};
pub use job::{port_protocol_key, Job, JobResult, Protocol};
pub use probe::{ProbeRequest, ProbeRunner, Prober, DEFAULT_CONCURRENCY};
pub use resources::{Pod, PortSpec, Resources, WorkloadRef};
pub use result::{StepResult, TestCaseResult};
pub use table::{Item, Layout, Table, DEFAULT_TIMEOUT_SECONDS};
pub use traffic::{
    InternalPeer, PeerResolver, PodNetworking, ResourcesPeerResolver, Traffic, TrafficPeer,
    WorkloadLocator,
};
pub use truth_table::TruthTable;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
