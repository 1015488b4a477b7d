//! Probing through `kubectl exec` into agnhost
//!
//! Each probe runs `agnhost connect` inside the source pod. agnhost exits
//! zero on success and prints a classified error (`TIMEOUT`, `REFUSED`,
//! `DNS`, `OTHER`) when the connection itself failed.

use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use netprobe_connectivity::{Error as ConnectivityError, ProbeRequest, Prober};
use tokio::process::Command;
use tracing::{debug, warn};

/// Default path of the agnhost binary inside probe pods
pub const DEFAULT_AGNHOST_PATH: &str = "/agnhost";

/// Extra time given to kubectl beyond the probe timeout
const EXEC_GRACE: Duration = Duration::from_secs(10);

/// agnhost connect failure classes that mean "not reachable"
const CONNECT_FAILURES: [&str; 4] = ["TIMEOUT", "REFUSED", "DNS", "OTHER"];

/// [`Prober`] that shells out to kubectl
#[derive(Debug, Clone)]
pub struct KubectlProber {
    context: Option<String>,
    agnhost_path: String,
}

impl KubectlProber {
    /// Create a prober for the given kube context (current context if `None`)
    pub fn new(context: Option<String>, agnhost_path: impl Into<String>) -> Self {
        Self {
            context,
            agnhost_path: agnhost_path.into(),
        }
    }

    /// Arguments passed to kubectl for one request
    pub fn exec_args(&self, request: &ProbeRequest) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ctx) = &self.context {
            args.extend(["--context".to_string(), ctx.clone()]);
        }
        args.extend([
            "exec".to_string(),
            "-n".to_string(),
            request.source.namespace.clone(),
            request.source.name.clone(),
        ]);
        if let Some(container) = &request.source.container {
            args.extend(["-c".to_string(), container.clone()]);
        }
        args.extend([
            "--".to_string(),
            self.agnhost_path.clone(),
            "connect".to_string(),
            format!("{}:{}", request.destination_ip, request.port),
            format!("--timeout={}s", request.timeout.as_secs()),
            format!("--protocol={}", request.protocol),
        ]);
        args
    }
}

/// Outcome of one kubectl exec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Connection succeeded
    Reachable,
    /// agnhost ran and the connection failed
    Unreachable,
    /// The probe could not be run
    Failed(String),
}

/// Classify a finished kubectl exec
pub fn classify_output(success: bool, stdout: &str, stderr: &str) -> ExecOutcome {
    if success {
        return ExecOutcome::Reachable;
    }
    // agnhost prints the failure class alone on a line
    let unreachable = stdout
        .lines()
        .chain(stderr.lines())
        .any(|line| CONNECT_FAILURES.contains(&line.trim()));
    if unreachable {
        return ExecOutcome::Unreachable;
    }
    ExecOutcome::Failed(format!("{}\n{}", stdout, stderr).trim().to_string())
}

fn classify(output: &Output) -> ExecOutcome {
    classify_output(
        output.status.success(),
        &String::from_utf8_lossy(&output.stdout),
        &String::from_utf8_lossy(&output.stderr),
    )
}

#[async_trait]
impl Prober for KubectlProber {
    async fn probe(&self, request: ProbeRequest) -> netprobe_connectivity::Result<bool> {
        let source = request.source.key();
        let destination = format!("{}:{}", request.destination_ip, request.port);
        let args = self.exec_args(&request);
        debug!(args = %args.join(" "), "kubectl exec");

        let run = Command::new("kubectl").args(&args).kill_on_drop(true).output();
        let output = tokio::time::timeout(request.timeout + EXEC_GRACE, run)
            .await
            .map_err(|_| {
                ConnectivityError::probe(&source, &destination, "kubectl exec timed out")
            })?
            .map_err(|e| {
                ConnectivityError::probe(
                    &source,
                    &destination,
                    format!("failed to run kubectl: {}", e),
                )
            })?;

        match classify(&output) {
            ExecOutcome::Reachable => Ok(true),
            ExecOutcome::Unreachable => Ok(false),
            ExecOutcome::Failed(message) => {
                warn!(from = %source, to = %destination, "probe could not run");
                Err(ConnectivityError::probe(source, destination, message))
            }
        }
    }
}
