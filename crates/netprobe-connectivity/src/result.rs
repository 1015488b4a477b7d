//! Step and test-case results
//!
//! A step holds one expected table and every probe round run against it.
//! Only the last round decides whether the step passed; earlier rounds are
//! kept for reporting.

use std::collections::BTreeMap;

use crate::comparison::ComparisonTable;
use crate::job::Protocol;
use crate::table::Table;
use crate::Error;

/// Expected table plus the observed rounds probed against it
#[derive(Clone, Debug)]
pub struct StepResult {
    /// Expected connectivity for this step
    pub expected: Table,
    /// Observed table of each probe round, in order
    pub observed: Vec<Table>,
    /// Comparison of each round against `expected`
    pub comparisons: Vec<ComparisonTable>,
}

impl StepResult {
    /// A step that has not been probed yet
    pub fn new(expected: Table) -> Self {
        Self {
            expected,
            observed: Vec::new(),
            comparisons: Vec::new(),
        }
    }

    /// Record a probe round and compare it against the expectation.
    ///
    /// Returns the new comparison.
    pub fn add_observed(&mut self, observed: Table) -> &ComparisonTable {
        let comparison = ComparisonTable::new(&self.expected, &observed);
        self.observed.push(observed);
        self.comparisons.push(comparison);
        &self.comparisons[self.comparisons.len() - 1]
    }

    /// Comparison of the latest round
    pub fn last_comparison(&self) -> Option<&ComparisonTable> {
        self.comparisons.last()
    }

    /// Observed table of the latest round
    pub fn last_observed(&self) -> Option<&Table> {
        self.observed.last()
    }

    /// Whether the latest round matched. False if nothing was probed.
    pub fn passed(&self, ignore_loopback: bool) -> bool {
        self.last_comparison()
            .map(|c| c.passed(ignore_loopback))
            .unwrap_or(false)
    }
}

/// All steps of one test case
#[derive(Debug)]
pub struct TestCaseResult {
    /// Human-readable name of the test case
    pub description: String,
    /// Steps in execution order
    pub steps: Vec<StepResult>,
    /// Collaborator error that aborted the test case, if any
    pub error: Option<Error>,
}

impl TestCaseResult {
    /// An empty result for a named test case
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            steps: Vec::new(),
            error: None,
        }
    }

    /// True iff no error occurred and every step passed
    pub fn passed(&self, ignore_loopback: bool) -> bool {
        self.error.is_none() && self.steps.iter().all(|s| s.passed(ignore_loopback))
    }

    /// Incorrect jobs summed over the last round of every step
    pub fn failed_count(&self, ignore_loopback: bool) -> usize {
        self.steps
            .iter()
            .filter_map(StepResult::last_comparison)
            .map(|c| c.verdict_counts(ignore_loopback).incorrect)
            .sum()
    }

    /// Jobs counted in the last round of every step
    pub fn total_count(&self, ignore_loopback: bool) -> usize {
        self.steps
            .iter()
            .filter_map(StepResult::last_comparison)
            .map(|c| c.verdict_counts(ignore_loopback).total())
            .sum()
    }

    /// Job counts keyed by success then protocol, summed over each step's last round
    pub fn results_by_protocol(&self) -> BTreeMap<bool, BTreeMap<Protocol, usize>> {
        let mut counts = BTreeMap::from([(true, BTreeMap::new()), (false, BTreeMap::new())]);
        for comparison in self.steps.iter().filter_map(StepResult::last_comparison) {
            for (is_success, by_protocol) in comparison.results_by_protocol() {
                let totals = counts.entry(is_success).or_default();
                for (protocol, count) in by_protocol {
                    *totals.entry(protocol).or_insert(0) += count;
                }
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::Connectivity;
    use crate::job::JobResult;
    use crate::resources::{test_resources, Resources};

    fn observed(resources: &Resources, reachable: bool) -> Table {
        Table::from_job_results(
            resources,
            resources
                .jobs(3)
                .into_iter()
                .map(|job| {
                    let loopback = job.is_loopback();
                    JobResult::observed(job, reachable || loopback)
                })
                .collect(),
        )
    }

    fn denied_step(resources: &Resources) -> StepResult {
        StepResult::new(Table::with_default_connectivity(
            resources,
            Connectivity::Denied,
            Connectivity::Denied,
        ))
    }

    #[test]
    fn unprobed_step_does_not_pass() {
        let resources = test_resources(&["a", "b"], &[80], &[Protocol::Tcp]);
        let step = denied_step(&resources);
        assert!(!step.passed(true));
        assert!(step.last_comparison().is_none());
    }

    #[test]
    fn last_round_decides() {
        let resources = test_resources(&["a", "b"], &[80], &[Protocol::Tcp]);
        let mut step = denied_step(&resources);

        assert!(!step.add_observed(observed(&resources, true)).passed(true));
        assert!(step.add_observed(observed(&resources, false)).passed(true));

        assert_eq!(step.observed.len(), 2);
        assert_eq!(step.comparisons.len(), 2);
        assert!(step.passed(true));
    }

    #[test]
    fn test_case_aggregates_steps() {
        let resources = test_resources(&["a", "b"], &[80], &[Protocol::Tcp, Protocol::Udp]);
        let mut passing = denied_step(&resources);
        passing.add_observed(observed(&resources, false));
        let mut failing = denied_step(&resources);
        failing.add_observed(observed(&resources, true));

        let mut result = TestCaseResult::new("deny all");
        result.steps.push(passing);
        assert!(result.passed(true));

        result.steps.push(failing);
        assert!(!result.passed(true));
        assert_eq!(result.failed_count(true), 4);
        assert_eq!(result.total_count(true), 8);

        let counts = result.results_by_protocol();
        // Passing step: 2 correct pairs and 2 loopback misses per protocol.
        // Failing step: all 4 jobs per protocol miss.
        assert_eq!(counts[&true][&Protocol::Tcp], 2);
        assert_eq!(counts[&true][&Protocol::Udp], 2);
        assert_eq!(counts[&false][&Protocol::Tcp], 6);
        assert_eq!(counts[&false][&Protocol::Udp], 6);
    }

    #[test]
    fn error_fails_the_test_case() {
        let resources = test_resources(&["a"], &[80], &[Protocol::Tcp]);
        let mut step = denied_step(&resources);
        step.add_observed(observed(&resources, false));

        let mut result = TestCaseResult::new("errored");
        result.steps.push(step);
        assert!(result.passed(true));

        result.error = Some(crate::Error::probe("x/a", "10.0.0.1:80", "exec failed"));
        assert!(!result.passed(true));
    }
}
