//! Report formatting for the probe and expect commands

use netprobe_connectivity::{ComparisonTable, StepResult, Table, TestCaseResult};

/// Formats tables and comparison results
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    /// List every mismatched job, not just the grids
    pub noisy: bool,
    /// Leave loopback jobs out of counts and mismatch lists
    pub ignore_loopback: bool,
}

impl Printer {
    /// Create a printer
    pub fn new(noisy: bool, ignore_loopback: bool) -> Self {
        Self {
            noisy,
            ignore_loopback,
        }
    }

    /// Combined, ingress and egress views of an expected table
    pub fn expectation(&self, table: &Table) -> String {
        format!(
            "Expected connectivity:\n{}\nIngress:\n{}\nEgress:\n{}",
            table.render_table(),
            table.render_ingress(),
            table.render_egress()
        )
    }

    /// One probe round: observed grid, verdict grid and summary
    pub fn round(&self, attempt: usize, observed: &Table, comparison: &ComparisonTable) -> String {
        let counts = comparison.verdict_counts(self.ignore_loopback);
        let mut out = String::new();
        out.push_str(&format!("Observed (attempt {}):\n", attempt));
        out.push_str(&observed.render_table());
        out.push_str(&format!("Comparison (attempt {}):\n", attempt));
        out.push_str(&comparison.render_verdicts());
        out.push_str(&format!(
            "correct: {}, incorrect: {}, total: {}\n",
            counts.correct,
            counts.incorrect,
            counts.total()
        ));

        if self.noisy {
            for entry in comparison.incorrect_entries(self.ignore_loopback) {
                let observed = entry
                    .observed
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "not probed".to_string());
                out.push_str(&format!(
                    "  {} -> {} {}: expected {}, observed {}\n",
                    entry.job.from_key,
                    entry.job.to_key,
                    entry.job.key(),
                    entry.expected,
                    observed
                ));
            }
        }
        out
    }

    /// Every round of a step, after its expectation
    pub fn step(&self, step: &StepResult) -> String {
        let mut out = self.expectation(&step.expected);
        for (i, (observed, comparison)) in step.observed.iter().zip(&step.comparisons).enumerate() {
            out.push('\n');
            out.push_str(&self.round(i + 1, observed, comparison));
        }
        out
    }

    /// Pass/fail line plus per-protocol job counts
    pub fn summary(&self, result: &TestCaseResult) -> String {
        let verdict = if result.passed(self.ignore_loopback) {
            "PASSED"
        } else {
            "FAILED"
        };
        let mut out = format!(
            "{}: {} ({} of {} jobs incorrect)\n",
            result.description,
            verdict,
            result.failed_count(self.ignore_loopback),
            result.total_count(self.ignore_loopback)
        );
        for (is_success, by_protocol) in result.results_by_protocol() {
            let label = if is_success { "success" } else { "failure" };
            let counts: Vec<String> = by_protocol
                .iter()
                .map(|(protocol, count)| format!("{}={}", protocol, count))
                .collect();
            out.push_str(&format!("  {}: {}\n", label, counts.join(", ")));
        }
        if let Some(error) = &result.error {
            out.push_str(&format!("  error: {}\n", error));
        }
        out
    }
}
