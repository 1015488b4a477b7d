//! Probe command
//!
//! Probes every job of the scenario through kubectl and compares the result
//! against the expected table. A failed round is re-probed after
//! `--perturbation-wait-seconds`, up to `--retries` times.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use netprobe_connectivity::{
    ProbeRunner, Resources, StepResult, Table, TestCaseResult, DEFAULT_CONCURRENCY,
    DEFAULT_TIMEOUT_SECONDS,
};
use tracing::{info, warn};

use super::load_scenario;
use crate::kubectl::{KubectlProber, DEFAULT_AGNHOST_PATH};
use crate::printer::Printer;
use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Scenario file (falls back to NETPROBE_SCENARIO, then ./netprobe.yaml)
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Kube context to probe (current context if unset)
    #[arg(long, env = "NETPROBE_CONTEXT")]
    pub context: Option<String>,

    /// Leave pod-to-itself jobs out of the pass/fail decision
    #[arg(long)]
    pub ignore_loopback: bool,

    /// Print every mismatched job
    #[arg(long)]
    pub noisy: bool,

    /// Extra probe rounds to run while the comparison fails
    #[arg(long, default_value_t = 1)]
    pub retries: usize,

    /// Seconds to wait between probe rounds
    #[arg(long, default_value_t = 5)]
    pub perturbation_wait_seconds: u64,

    /// Per-connection timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout_seconds: u32,

    /// Probes in flight at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Path of the agnhost binary inside the pods
    #[arg(long, env = "NETPROBE_AGNHOST_PATH", default_value = DEFAULT_AGNHOST_PATH)]
    pub agnhost_path: String,
}

/// How many rounds to run and how to judge them
#[derive(Debug, Clone, Copy)]
pub struct RoundPlan {
    /// Total rounds allowed, at least one
    pub attempts: usize,
    /// Pause between rounds
    pub wait: Duration,
    /// Per-connection timeout
    pub timeout_seconds: u32,
    /// Whether loopback jobs count towards passing
    pub ignore_loopback: bool,
}

impl From<&ProbeArgs> for RoundPlan {
    fn from(args: &ProbeArgs) -> Self {
        Self {
            attempts: args.retries + 1,
            wait: Duration::from_secs(args.perturbation_wait_seconds),
            timeout_seconds: args.timeout_seconds,
            ignore_loopback: args.ignore_loopback,
        }
    }
}

pub async fn run(args: ProbeArgs) -> Result<()> {
    let (scenario, resources) = load_scenario(args.scenario.as_deref())?;
    let expected = scenario.expected_table(&resources, args.timeout_seconds)?;

    let prober = KubectlProber::new(args.context.clone(), args.agnhost_path.clone());
    let runner = ProbeRunner::new(Arc::new(prober), args.concurrency);
    let plan = RoundPlan::from(&args);

    let description = match &args.context {
        Some(ctx) => format!("probe {}", ctx),
        None => "probe".to_string(),
    };
    let mut result = drive(&runner, &resources, expected, plan, description).await;

    let printer = Printer::new(args.noisy, args.ignore_loopback);
    for step in &result.steps {
        println!("{}", printer.step(step));
    }
    print!("{}", printer.summary(&result));

    if let Some(error) = result.error.take() {
        return Err(error.into());
    }
    if !result.passed(args.ignore_loopback) {
        return Err(Error::ChecksFailed {
            failed: result.failed_count(args.ignore_loopback),
            total: result.total_count(args.ignore_loopback),
        });
    }
    Ok(())
}

/// Probe and compare until a round passes or the attempts run out.
///
/// Retryable probe errors use up an attempt; any other error ends the run
/// and is recorded on the result.
pub async fn drive(
    runner: &ProbeRunner,
    resources: &Resources,
    expected: Table,
    plan: RoundPlan,
    description: impl Into<String>,
) -> TestCaseResult {
    let attempts = plan.attempts.max(1);
    let mut result = TestCaseResult::new(description);
    let mut step = StepResult::new(expected);

    for attempt in 1..=attempts {
        match runner.run(resources, resources.jobs(plan.timeout_seconds)).await {
            Ok(observed) => {
                let comparison = step.add_observed(observed);
                let counts = comparison.verdict_counts(plan.ignore_loopback);
                info!(
                    attempt,
                    correct = counts.correct,
                    incorrect = counts.incorrect,
                    "probe round finished"
                );
                if counts.incorrect == 0 {
                    break;
                }
            }
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(attempt, error = %e, "probe round failed, retrying");
            }
            Err(e) => {
                result.error = Some(e);
                break;
            }
        }

        if attempt < attempts {
            tokio::time::sleep(plan.wait).await;
        }
    }

    result.steps.push(step);
    result
}
