//! End-to-end: rules -> expected table -> probe -> comparison

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use netprobe_connectivity::{
    apply_rules, ComparisonTable, Connectivity, ExpectationRule, Pod, PodSelector, PortSpec,
    ProbeRequest, ProbeRunner, Prober, Protocol, Resources, StepResult, Table,
    DEFAULT_TIMEOUT_SECONDS,
};

/// Drops everything entering `isolated` from outside it
struct NamespaceIsolation {
    isolated: String,
    resources: Resources,
}

#[async_trait]
impl Prober for NamespaceIsolation {
    async fn probe(&self, request: ProbeRequest) -> netprobe_connectivity::Result<bool> {
        let destination = self
            .resources
            .pods()
            .find(|p| p.ip == request.destination_ip)
            .map(|p| p.namespace.clone())
            .unwrap_or_default();
        Ok(destination != self.isolated || request.source.namespace == self.isolated)
    }
}

struct AllowAll;

#[async_trait]
impl Prober for AllowAll {
    async fn probe(&self, _request: ProbeRequest) -> netprobe_connectivity::Result<bool> {
        Ok(true)
    }
}

fn pod(namespace: &str, name: &str, ip: &str) -> Pod {
    Pod {
        namespace: namespace.to_string(),
        name: name.to_string(),
        ip: ip.to_string(),
        labels: BTreeMap::from([("pod".to_string(), name.to_string())]),
        container: None,
        workload: None,
        named_ports: BTreeMap::new(),
    }
}

fn resources() -> Resources {
    Resources::new(
        vec![
            pod("x", "a", "10.0.0.1"),
            pod("x", "b", "10.0.0.2"),
            pod("y", "a", "10.0.1.1"),
            pod("y", "b", "10.0.1.2"),
        ],
        BTreeMap::new(),
        vec![PortSpec::Number(80), PortSpec::Number(81)],
        vec![Protocol::Tcp, Protocol::Udp],
    )
    .unwrap()
}

fn expected(resources: &Resources) -> Table {
    let mut table =
        Table::with_default_connectivity(resources, Connectivity::Allowed, Connectivity::Allowed);
    let rules = vec![
        ExpectationRule {
            from: PodSelector::All,
            to: PodSelector::Namespace("y".to_string()),
            port: None,
            protocol: None,
            ingress: Some(Connectivity::Denied),
            egress: None,
        },
        ExpectationRule {
            from: PodSelector::Namespace("y".to_string()),
            to: PodSelector::Namespace("y".to_string()),
            port: None,
            protocol: None,
            ingress: Some(Connectivity::Allowed),
            egress: None,
        },
    ];
    apply_rules(&mut table, resources, &rules).unwrap();
    table
}

#[tokio::test]
async fn isolated_namespace_matches_expectation() {
    let resources = resources();
    let expected = expected(&resources);

    let prober = NamespaceIsolation {
        isolated: "y".to_string(),
        resources: resources.clone(),
    };
    let observed = ProbeRunner::new(Arc::new(prober), 8)
        .run(&resources, resources.jobs(DEFAULT_TIMEOUT_SECONDS))
        .await
        .unwrap();

    let comparison = ComparisonTable::new(&expected, &observed);
    assert!(comparison.passed(true));
    // Loopback is Undefined in the expectation but reachable in practice
    assert!(!comparison.passed(false));
    assert_eq!(comparison.verdict_counts(true).total(), 12 * 4);
}

#[tokio::test]
async fn open_cluster_fails_with_cross_namespace_mismatches() {
    let resources = resources();
    let mut step = StepResult::new(expected(&resources));

    let observed = ProbeRunner::new(Arc::new(AllowAll), 8)
        .run(&resources, resources.jobs(DEFAULT_TIMEOUT_SECONDS))
        .await
        .unwrap();
    let comparison = step.add_observed(observed);

    let incorrect = comparison.incorrect_entries(true);
    // x/a and x/b into y/a and y/b, over two ports and two protocols
    assert_eq!(incorrect.len(), 2 * 2 * 2 * 2);
    assert!(incorrect
        .iter()
        .all(|e| e.job.from_key.starts_with("x/") && e.job.to_key.starts_with("y/")));
    assert!(incorrect
        .iter()
        .all(|e| e.expected == Connectivity::Denied && e.observed == Some(Connectivity::Allowed)));

    let by_protocol = comparison.results_by_protocol();
    assert_eq!(by_protocol[&false][&Protocol::Tcp], 8 + 8);
    assert_eq!(by_protocol[&false][&Protocol::Udp], 8 + 8);
    assert!(!step.passed(true));
}

#[test]
fn expected_table_renders_ingress_and_egress_separately() {
    let resources = resources();
    let expected = expected(&resources);

    let ingress = expected.render_ingress();
    let egress = expected.render_egress();
    assert!(ingress.contains("X"));
    assert!(!egress.contains("X"));
    assert_ne!(ingress, egress);
}
