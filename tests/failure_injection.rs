//! Failure injection tests for the reconciliation loop.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use masq_agent::maps::MapOp;
use masq_agent::reconcile::{PassOutcome, ReconcileError};
use masq_agent::{Agent, AgentSettings, CidrMap, Reconciler};

mod common;

use common::{bounded, cidr, fast_settings, wait_until, RecordingMap};

const CONVERGE: Duration = Duration::from_secs(3);

#[test]
fn test_partial_failure_applies_remaining_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ip-masq-agent");
    fs::write(&path, "nonMasqueradeCIDRs: [1.1.1.1/32, 2.2.2.2/16, 3.3.0.0/16]").unwrap();

    let map = Arc::new(RecordingMap::with_entries(&["9.9.0.0/16"]));
    map.fail_updates_for("1.1.1.1/32");
    let dyn_map: Arc<dyn CidrMap> = map.clone();

    let report = Reconciler::new(&path, dyn_map).reconcile();

    assert_eq!(report.outcome(), PassOutcome::Partial);
    assert_eq!(report.added, vec![cidr("2.2.0.0/16"), cidr("3.3.0.0/16")]);
    assert_eq!(report.removed, vec![cidr("9.9.0.0/16")]);
    assert_eq!(report.errors.len(), 1);
    match &report.errors[0] {
        ReconcileError::Apply { op, cidr: failed, .. } => {
            assert_eq!(*op, MapOp::Update);
            assert_eq!(*failed, cidr("1.1.1.1/32"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(report.should_retry());
    assert_eq!(map.snapshot(), ["2.2.0.0/16", "3.3.0.0/16"]);
}

#[test]
fn test_dump_failure_aborts_pass() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ip-masq-agent");
    fs::write(&path, "nonMasqueradeCIDRs: [1.1.1.1/32]").unwrap();

    let map = Arc::new(RecordingMap::with_entries(&["5.5.0.0/16"]));
    map.set_dump_failure(true);
    let dyn_map: Arc<dyn CidrMap> = map.clone();

    let report = Reconciler::new(&path, dyn_map).reconcile();

    assert_eq!(report.outcome(), PassOutcome::Skipped);
    assert!(matches!(report.errors.as_slice(), [ReconcileError::Dump(_)]));
    assert!(report.should_retry());
    assert_eq!(map.mutation_calls(), 0);
    assert_eq!(map.snapshot(), ["5.5.0.0/16"]);
}

#[tokio::test]
async fn test_failed_update_is_retried_until_converged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ip-masq-agent");
    fs::write(&path, "nonMasqueradeCIDRs: [1.1.1.1/32, 2.2.0.0/16]").unwrap();

    let map = Arc::new(RecordingMap::new());
    map.fail_updates_for("1.1.1.1/32");

    let mut agent = Agent::new(&path, map.clone(), fast_settings());
    let restore = agent.start().await.unwrap();
    assert_eq!(restore.outcome(), PassOutcome::Partial);
    assert_eq!(map.snapshot(), ["2.2.0.0/16"]);

    map.clear_failures();
    assert!(wait_until(CONVERGE, || map.snapshot() == ["1.1.1.1/32", "2.2.0.0/16"]).await);

    bounded(agent.stop()).await.unwrap();
}

#[tokio::test]
async fn test_dump_outage_at_start_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ip-masq-agent");
    fs::write(&path, "nonMasqueradeCIDRs: [10.0.0.0/8]").unwrap();

    let map = Arc::new(RecordingMap::with_entries(&["3.3.3.0/24"]));
    map.set_dump_failure(true);

    let mut agent = Agent::new(&path, map.clone(), fast_settings());
    let restore = agent.start().await.unwrap();
    assert_eq!(restore.outcome(), PassOutcome::Skipped);
    assert_eq!(map.snapshot(), ["3.3.3.0/24"]);

    map.set_dump_failure(false);
    assert!(wait_until(CONVERGE, || map.snapshot() == ["10.0.0.0/8"]).await);

    bounded(agent.stop()).await.unwrap();
}

#[tokio::test]
async fn test_malformed_write_leaves_map_then_valid_write_rediffs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ip-masq-agent");
    fs::write(&path, "nonMasqueradeCIDRs: [1.1.1.1/32, 2.2.2.2/16]").unwrap();

    let map = Arc::new(RecordingMap::new());
    let mut agent = Agent::new(&path, map.clone(), fast_settings());
    agent.start().await.unwrap();
    assert_eq!(map.snapshot(), ["1.1.1.1/32", "2.2.0.0/16"]);

    fs::write(&path, "nonMasqueradeCIDRs:\n- 1.1.1.1/32\n- not-a-cidr").unwrap();
    assert!(
        wait_until(CONVERGE, || {
            agent
                .last_report()
                .is_some_and(|r| r.outcome() == PassOutcome::Skipped)
        })
        .await
    );
    assert_eq!(map.snapshot(), ["1.1.1.1/32", "2.2.0.0/16"]);

    // Manual tampering while the config is broken.
    map.insert_out_of_band("7.7.0.0/16");

    fs::write(&path, "nonMasqueradeCIDRs: [2.2.2.2/16, 6.6.0.0/16]").unwrap();
    assert!(wait_until(CONVERGE, || map.snapshot() == ["2.2.0.0/16", "6.6.0.0/16"]).await);

    bounded(agent.stop()).await.unwrap();
}

#[tokio::test]
async fn test_resync_repairs_out_of_band_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ip-masq-agent");
    fs::write(&path, "nonMasqueradeCIDRs: [4.4.0.0/16]").unwrap();

    let map = Arc::new(RecordingMap::new());
    let settings = AgentSettings {
        resync_interval_secs: 1,
        ..fast_settings()
    };
    let mut agent = Agent::new(&path, map.clone(), settings);
    agent.start().await.unwrap();

    map.insert_out_of_band("8.8.8.0/24");
    assert!(wait_until(Duration::from_secs(5), || map.snapshot() == ["4.4.0.0/16"]).await);

    bounded(agent.stop()).await.unwrap();
}
