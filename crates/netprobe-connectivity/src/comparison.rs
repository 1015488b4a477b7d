//! Cell-by-cell diff of an expected table against an observed one

use std::collections::BTreeMap;
use std::fmt;

use crate::connectivity::Connectivity;
use crate::job::{Job, Protocol};
use crate::table::{render_keyed, Layout, Table};
use crate::truth_table::TruthTable;

/// Whether an observation matched its expectation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Observed combined verdict equals the expected one
    Correct,
    /// Observed differs from expected, or was never observed
    Incorrect,
}

impl Verdict {
    /// Single-character form used in rendered tables
    pub fn short_string(&self) -> &'static str {
        match self {
            Verdict::Correct => ".",
            Verdict::Incorrect => "X",
        }
    }

    /// True for [`Verdict::Correct`]
    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Correct)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Correct => f.write_str("correct"),
            Verdict::Incorrect => f.write_str("incorrect"),
        }
    }
}

/// Outcome of comparing one job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComparisonEntry {
    /// The job compared
    pub job: Job,
    /// Expected combined verdict
    pub expected: Connectivity,
    /// Observed combined verdict, `None` if the job was not probed
    pub observed: Option<Connectivity>,
    /// Whether the two agree
    pub verdict: Verdict,
}

impl ComparisonEntry {
    /// Whether this job probes an entity from itself
    pub fn is_loopback(&self) -> bool {
        self.job.is_loopback()
    }
}

/// Correct/incorrect totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerdictCounts {
    /// Jobs whose observation matched
    pub correct: usize,
    /// Jobs whose observation did not match
    pub incorrect: usize,
}

impl VerdictCounts {
    /// Total jobs counted
    pub fn total(&self) -> usize {
        self.correct + self.incorrect
    }
}

/// Per-cell comparison results over the expected table's entities
#[derive(Clone, Debug)]
pub struct ComparisonTable {
    wrapped: TruthTable<BTreeMap<String, ComparisonEntry>>,
}

impl ComparisonTable {
    /// Compare every expected job against the observed table.
    ///
    /// Both tables must be built over the same entities in the same order;
    /// anything else panics. An expected job with no observation counts as
    /// incorrect. Observations with no expectation are not compared.
    pub fn new(expected: &Table, observed: &Table) -> Self {
        if expected.items() != observed.items() {
            panic!(
                "cannot compare tables over different entities: {:?} vs {:?}",
                expected.items(),
                observed.items()
            );
        }

        let wrapped = TruthTable::from_items(expected.items().to_vec(), |fr, to| {
            let observed_item = observed.get(fr, to);
            expected
                .get(fr, to)
                .job_results
                .iter()
                .map(|(key, jr)| {
                    let observed = observed_item.get(key).map(|o| o.combined);
                    let verdict = if observed == Some(jr.combined) {
                        Verdict::Correct
                    } else {
                        Verdict::Incorrect
                    };
                    let entry = ComparisonEntry {
                        job: jr.job.clone(),
                        expected: jr.combined,
                        observed,
                        verdict,
                    };
                    (key.clone(), entry)
                })
                .collect()
        });

        Self { wrapped }
    }

    /// Every comparison entry, row-major then by key
    pub fn entries(&self) -> impl Iterator<Item = &ComparisonEntry> {
        self.wrapped.cells().flat_map(|(_, _, cell)| cell.values())
    }

    /// Entry for one job, if it was expected
    pub fn get(&self, from: &str, to: &str, key: &str) -> Option<&ComparisonEntry> {
        self.wrapped.get(from, to).get(key)
    }

    /// Count correct and incorrect jobs, optionally skipping loopback jobs
    pub fn verdict_counts(&self, ignore_loopback: bool) -> VerdictCounts {
        let mut counts = VerdictCounts::default();
        for entry in self.counted(ignore_loopback) {
            match entry.verdict {
                Verdict::Correct => counts.correct += 1,
                Verdict::Incorrect => counts.incorrect += 1,
            }
        }
        counts
    }

    /// True iff every counted job is correct
    pub fn passed(&self, ignore_loopback: bool) -> bool {
        self.verdict_counts(ignore_loopback).incorrect == 0
    }

    /// Mismatched jobs, optionally skipping loopback jobs
    pub fn incorrect_entries(&self, ignore_loopback: bool) -> Vec<&ComparisonEntry> {
        self.counted(ignore_loopback)
            .filter(|e| !e.verdict.is_correct())
            .collect()
    }

    /// Job counts keyed by success and then protocol.
    ///
    /// Both `true` and `false` are always present.
    pub fn results_by_protocol(&self) -> BTreeMap<bool, BTreeMap<Protocol, usize>> {
        let mut counts = BTreeMap::from([(true, BTreeMap::new()), (false, BTreeMap::new())]);
        for entry in self.entries() {
            *counts
                .entry(entry.verdict.is_correct())
                .or_default()
                .entry(entry.job.protocol)
                .or_insert(0) += 1;
        }
        counts
    }

    /// Render a grid of verdicts using the same layout rules as [`Table`]
    pub fn render_verdicts(&self) -> String {
        let layout = Layout::detect(
            self.wrapped
                .cells()
                .map(|(_, _, cell)| cell.keys().map(String::as_str)),
        );
        render_keyed(
            &self.wrapped,
            layout,
            |cell| cell.keys().cloned().collect(),
            |cell, key| {
                cell.get(key)
                    .map(|e| e.verdict.short_string())
                    .unwrap_or("")
                    .to_string()
            },
        )
    }

    fn counted(&self, ignore_loopback: bool) -> impl Iterator<Item = &ComparisonEntry> {
        self.entries()
            .filter(move |e| !(ignore_loopback && e.is_loopback()))
    }
}
