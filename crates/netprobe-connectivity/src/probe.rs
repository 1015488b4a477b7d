//! Probe collaborator interface and the fan-out runner
//!
//! The runner issues every job concurrently (bounded), waits for all of them,
//! then assembles the observed table in a single pass. Tables are never
//! written from concurrent tasks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, info};

use crate::job::{Job, JobResult, Protocol};
use crate::resources::{Pod, Resources};
use crate::table::Table;
use crate::Result;

/// Default number of probes in flight at once
pub const DEFAULT_CONCURRENCY: usize = 32;

/// One connection attempt for the collaborator to run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeRequest {
    /// Pod the connection is made from
    pub source: Pod,
    /// Address connected to
    pub destination_ip: String,
    /// Destination port
    pub port: u16,
    /// Transport protocol
    pub protocol: Protocol,
    /// Upper bound on the attempt
    pub timeout: Duration,
}

/// Runs a single connection attempt against the cluster
///
/// Implementations own any retry policy; the runner calls each job once.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Prober: Send + Sync {
    /// Attempt the connection, returning whether it succeeded.
    ///
    /// `Err` means the attempt could not be made (e.g. the cluster is
    /// unreachable), not that the connection was refused.
    async fn probe(&self, request: ProbeRequest) -> Result<bool>;
}

/// Probes every job of a table through a [`Prober`]
pub struct ProbeRunner {
    prober: Arc<dyn Prober>,
    concurrency: usize,
}

impl ProbeRunner {
    /// Create a runner with at most `concurrency` probes in flight
    pub fn new(prober: Arc<dyn Prober>, concurrency: usize) -> Self {
        Self {
            prober,
            concurrency: concurrency.max(1),
        }
    }

    /// Probe `jobs` and build the observed table over `resources`.
    ///
    /// Fails with the first collaborator error; no partial table is returned.
    pub async fn run(&self, resources: &Resources, jobs: Vec<Job>) -> Result<Table> {
        let requests = jobs
            .into_iter()
            .map(|job| -> Result<(Job, ProbeRequest)> {
                let request = ProbeRequest {
                    source: resources.pod(&job.from_key)?.clone(),
                    destination_ip: resources.pod(&job.to_key)?.ip.clone(),
                    port: job.resolved_port,
                    protocol: job.protocol,
                    timeout: Duration::from_secs(u64::from(job.timeout_seconds)),
                };
                Ok((job, request))
            })
            .collect::<Result<Vec<_>>>()?;

        let total = requests.len();
        info!(jobs = total, concurrency = self.concurrency, "starting probes");

        let outcomes: Vec<Result<JobResult>> = stream::iter(requests)
            .map(|(job, request)| {
                let prober = Arc::clone(&self.prober);
                async move {
                    let reachable = prober.probe(request).await?;
                    debug!(
                        from = %job.from_key,
                        to = %job.to_key,
                        key = %job.key(),
                        reachable,
                        "probe finished"
                    );
                    Ok::<_, crate::Error>(JobResult::observed(job, reachable))
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let results = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
        let reachable = results
            .iter()
            .filter(|r| r.observed == Some(crate::Connectivity::Allowed))
            .count();
        info!(jobs = total, reachable, "probes complete");

        Ok(Table::from_job_results(resources, results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_resources;
    use crate::{Connectivity, Error};

    #[tokio::test]
    async fn builds_observed_table_from_every_job() {
        let resources = test_resources(&["a", "b"], &[80, 81], &[Protocol::Tcp]);

        let mut prober = MockProber::new();
        prober
            .expect_probe()
            .times(8)
            .returning(|req| Ok(req.port == 80));

        let runner = ProbeRunner::new(Arc::new(prober), 4);
        let table = runner.run(&resources, resources.jobs(3)).await.unwrap();

        let cell = table.get("x/a", "x/b");
        assert_eq!(cell.get("tcp/80").unwrap().combined, Connectivity::Allowed);
        assert_eq!(cell.get("tcp/81").unwrap().combined, Connectivity::Denied);
        assert_eq!(table.job_results().count(), 8);
    }

    #[tokio::test]
    async fn requests_target_destination_ip_from_source_pod() {
        let resources = test_resources(&["a", "b"], &[80], &[Protocol::Udp]);

        let mut prober = MockProber::new();
        prober
            .expect_probe()
            .withf(|req| req.source.name == "a" && req.destination_ip == "10.0.0.2")
            .times(1)
            .returning(|req| {
                assert_eq!(req.protocol, Protocol::Udp);
                assert_eq!(req.timeout, Duration::from_secs(5));
                Ok(true)
            });

        let jobs: Vec<Job> = resources
            .jobs(5)
            .into_iter()
            .filter(|j| j.from_key == "x/a" && j.to_key == "x/b")
            .collect();
        let table = ProbeRunner::new(Arc::new(prober), 1)
            .run(&resources, jobs)
            .await
            .unwrap();

        assert!(table.get("x/a", "x/a").job_results.is_empty());
        assert_eq!(
            table.get("x/a", "x/b").get("udp/80").unwrap().observed,
            Some(Connectivity::Allowed)
        );
    }

    #[tokio::test]
    async fn collaborator_error_fails_the_run() {
        let resources = test_resources(&["a", "b"], &[80], &[Protocol::Tcp]);

        let mut prober = MockProber::new();
        prober.expect_probe().returning(|req| {
            if req.destination_ip == "10.0.0.2" {
                Err(Error::probe(req.source.key(), "10.0.0.2:80", "exec failed"))
            } else {
                Ok(true)
            }
        });

        let err = ProbeRunner::new(Arc::new(prober), 2)
            .run(&resources, resources.jobs(3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Probe { .. }));
    }

    #[tokio::test]
    async fn unknown_pod_in_job_is_rejected_before_probing() {
        let resources = test_resources(&["a"], &[80], &[Protocol::Tcp]);
        let mut prober = MockProber::new();
        prober.expect_probe().never();

        let mut jobs = resources.jobs(3);
        jobs[0].to_key = "x/missing".to_string();

        let err = ProbeRunner::new(Arc::new(prober), 2)
            .run(&resources, jobs)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownPod { name } if name == "x/missing"));
    }
}
