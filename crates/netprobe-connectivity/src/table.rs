//! Probe tables: a truth table of `protocol/port` keyed job results
//!
//! An expected table is seeded once from the resources
//! ([`Table::with_default_connectivity`]) and then refined leg by leg through
//! [`Table::set_ingress`] / [`Table::set_egress`]. An observed table is
//! assembled from probe results ([`Table::from_job_results`]).
//!
//! Rendering picks one of three layouts after scanning every cell:
//! - simple: each cell holds exactly one key, the same everywhere
//! - uniform multi: all cells share the same key set; keys print once in the corner
//! - non-uniform: cells differ; each prints `key: value` lines

use std::collections::{BTreeMap, BTreeSet};

use crate::connectivity::Connectivity;
use crate::job::{port_protocol_key, Job, JobResult, Protocol};
use crate::resources::Resources;
use crate::truth_table::TruthTable;
use crate::{Error, Result};

/// Default timeout for probes built from resources
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 3;

/// One cell: every job result for a (from, to) pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    /// Source entity
    pub from: String,
    /// Destination entity
    pub to: String,
    /// Results keyed by `protocol/port`
    pub job_results: BTreeMap<String, JobResult>,
}

impl Item {
    /// Create an empty cell
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            job_results: BTreeMap::new(),
        }
    }

    /// Add a result under its job's key. Fails if the key is already taken.
    pub fn add_job_result(&mut self, result: JobResult) -> Result<()> {
        let key = result.key();
        if self.job_results.contains_key(&key) {
            return Err(Error::DuplicateJobResult {
                key,
                from: result.job.from_key.clone(),
                to: result.job.to_key.clone(),
            });
        }
        self.job_results.insert(key, result);
        Ok(())
    }

    /// Result for a `protocol/port` key
    pub fn get(&self, key: &str) -> Option<&JobResult> {
        self.job_results.get(key)
    }

    /// Keys present in this cell, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.job_results.keys().map(String::as_str)
    }
}

/// Layout chosen for rendering a keyed table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// One shared key per cell: print the bare value
    Simple,
    /// Identical multi-key schema everywhere: print values in shared key order
    UniformMulti,
    /// Key sets differ between cells: print `key: value` lines
    NonUniform,
}

impl Layout {
    /// Choose a layout from the key set of every cell.
    ///
    /// Every cell is scanned; the decision covers the whole table.
    pub fn detect<'a, C, K>(cells: C) -> Self
    where
        C: IntoIterator<Item = K>,
        K: IntoIterator<Item = &'a str>,
    {
        let mut is_single_element = true;
        let mut schemas: BTreeSet<Vec<&'a str>> = BTreeSet::new();

        for keys in cells {
            let mut schema: Vec<&'a str> = keys.into_iter().collect();
            schema.sort_unstable();
            if schema.len() != 1 {
                is_single_element = false;
            }
            schemas.insert(schema);
        }

        let is_schema_uniform = schemas.len() <= 1;
        match (is_schema_uniform, is_single_element) {
            (true, true) => Layout::Simple,
            (true, false) => Layout::UniformMulti,
            (false, _) => Layout::NonUniform,
        }
    }
}

/// Render a table of keyed cells in the given layout.
///
/// `cell_keys(payload)` lists the sorted keys of a cell and
/// `value(payload, key)` renders one entry.
pub(crate) fn render_keyed<T, K, V>(
    table: &TruthTable<T>,
    layout: Layout,
    cell_keys: K,
    value: V,
) -> String
where
    K: Fn(&T) -> Vec<String>,
    V: Fn(&T, &str) -> String,
{
    match layout {
        Layout::Simple => table.render("", false, |_, _, cell| {
            cell_keys(cell)
                .first()
                .map(|key| value(cell, key))
                .unwrap_or_default()
        }),
        Layout::UniformMulti => {
            let keys = table
                .cells()
                .next()
                .map(|(_, _, cell)| cell_keys(cell))
                .unwrap_or_default();
            let schema = keys.join("\n");
            table.render(&schema, true, |_, _, cell| {
                keys.iter()
                    .map(|key| value(cell, key))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
        }
        Layout::NonUniform => table.render("", true, |_, _, cell| {
            cell_keys(cell)
                .iter()
                .map(|key| format!("{}: {}", key, value(cell, key)))
                .collect::<Vec<_>>()
                .join("\n")
        }),
    }
}

/// Probe-specific truth table
#[derive(Clone, Debug)]
pub struct Table {
    wrapped: TruthTable<Item>,
}

impl Table {
    /// Table with an empty cell for every ordered pair of `items`
    pub fn new(items: Vec<String>) -> Self {
        Self {
            wrapped: TruthTable::from_items(items, |fr, to| Item::new(fr, to)),
        }
    }

    /// Expected table seeded with default legs for every job.
    ///
    /// Covers every ordered pod pair and every protocol/port under test.
    /// Self pairs are always seeded `Undefined` on both legs, whatever the
    /// defaults. Jobs carry [`DEFAULT_TIMEOUT_SECONDS`].
    pub fn with_default_connectivity(
        resources: &Resources,
        ingress: Connectivity,
        egress: Connectivity,
    ) -> Self {
        Self::with_job_defaults(
            resources,
            resources.jobs(DEFAULT_TIMEOUT_SECONDS),
            ingress,
            egress,
        )
    }

    /// Expected table seeded with default legs for `jobs`, as
    /// [`Table::with_default_connectivity`] does.
    ///
    /// Pass the same jobs that get probed so expected and observed entries
    /// describe identical jobs.
    pub fn with_job_defaults(
        resources: &Resources,
        jobs: Vec<Job>,
        ingress: Connectivity,
        egress: Connectivity,
    ) -> Self {
        let mut table = Self::new(resources.sorted_pod_names());
        for job in jobs {
            let result = if job.is_loopback() {
                JobResult::expected(job, Connectivity::Undefined, Connectivity::Undefined)
            } else {
                JobResult::expected(job, ingress, egress)
            };
            table.insert(result);
        }
        table
    }

    /// Observed table assembled from probe results.
    ///
    /// Panics if two results share a cell key: each job is probed once per
    /// table.
    pub fn from_job_results(resources: &Resources, results: Vec<JobResult>) -> Self {
        let mut table = Self::new(resources.sorted_pod_names());
        for result in results {
            table.insert(result);
        }
        table
    }

    fn insert(&mut self, result: JobResult) {
        let (from, to) = (result.job.from_key.clone(), result.job.to_key.clone());
        if let Err(e) = self.wrapped.get_mut(&from, &to).add_job_result(result) {
            panic!("{}", e);
        }
    }

    /// Entity names in table order
    pub fn items(&self) -> &[String] {
        self.wrapped.items()
    }

    /// Cell at (from, to). Panics if either entity is unknown.
    pub fn get(&self, from: &str, to: &str) -> &Item {
        self.wrapped.get(from, to)
    }

    /// All cells, row-major in table order
    pub fn cells(&self) -> impl Iterator<Item = &Item> {
        self.wrapped.cells().map(|(_, _, item)| item)
    }

    /// All job results across every cell, row-major then by key
    pub fn job_results(&self) -> impl Iterator<Item = &JobResult> {
        self.cells().flat_map(|item| item.job_results.values())
    }

    /// Jobs of every result in the table
    pub fn jobs(&self) -> Vec<Job> {
        self.job_results().map(|jr| jr.job.clone()).collect()
    }

    /// Replace the ingress leg of a seeded job and recompute its verdict.
    ///
    /// Panics if the job was never seeded: this table was not built with
    /// [`Table::with_default_connectivity`] over this port and protocol.
    pub fn set_ingress(
        &mut self,
        ingress: Connectivity,
        from: &str,
        to: &str,
        port: u16,
        protocol: Protocol,
    ) {
        self.seeded_mut(from, to, port, protocol).set_ingress(ingress);
    }

    /// Replace the egress leg of a seeded job and recompute its verdict.
    ///
    /// Panics under the same conditions as [`Table::set_ingress`].
    pub fn set_egress(
        &mut self,
        egress: Connectivity,
        from: &str,
        to: &str,
        port: u16,
        protocol: Protocol,
    ) {
        self.seeded_mut(from, to, port, protocol).set_egress(egress);
    }

    fn seeded_mut(&mut self, from: &str, to: &str, port: u16, protocol: Protocol) -> &mut JobResult {
        let key = port_protocol_key(protocol, port);
        match self.wrapped.get_mut(from, to).job_results.get_mut(&key) {
            Some(result) => result,
            None => panic!(
                "cannot set connectivity: job result non-existent for {} ({} -> {})",
                key, from, to
            ),
        }
    }

    /// Layout the render methods will use for this table
    pub fn layout(&self) -> Layout {
        Layout::detect(self.cells().map(|item| item.keys()))
    }

    /// Render combined verdicts
    pub fn render_table(&self) -> String {
        self.render_with(|jr| jr.combined.short_string())
    }

    /// Render expected ingress legs
    pub fn render_ingress(&self) -> String {
        self.render_with(|jr| jr.ingress.short_string())
    }

    /// Render expected egress legs
    pub fn render_egress(&self) -> String {
        self.render_with(|jr| jr.egress.short_string())
    }

    fn render_with<F>(&self, render: F) -> String
    where
        F: Fn(&JobResult) -> &'static str,
    {
        let layout = self.layout();
        render_keyed(
            &self.wrapped,
            layout,
            |item| item.job_results.keys().cloned().collect(),
            |item, key| item.get(key).map(|jr| render(jr)).unwrap_or("").to_string(),
        )
    }
}
