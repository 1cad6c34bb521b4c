//! End-to-end tests for the offline sweeper.
//!
//! These tests verify:
//! 1. Fresh servers sitting inside their allowed silence
//! 2. Overdue servers firing `offline` alerts to scoped recipients
//! 3. Repeat sweeps suppressed by the per-(server, kind) cooldown
//! 4. Ingest resetting the silence clock
//! 5. The background task sweeping on its period and stopping cleanly

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use vigil_alerts::CollectingNotifier;
use vigil_engine::{start_sweeper_task, EngineConfig, MonitorEngine, SweeperConfig};
use vigil_proto::{
    AlertKind, ContainerSummary, CpuUsage, DiskUsage, MemoryUsage, MetricSnapshot, ServerId,
};
use vigil_store::{MemorySnapshotArchive, NewAlertRule, RuleScope};

// ============================================================================
// Helpers
// ============================================================================

struct TestMonitor {
    engine: MonitorEngine,
    notifier: Arc<CollectingNotifier>,
    _dir: TempDir,
}

impl TestMonitor {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let engine = MonitorEngine::with_archive(
            EngineConfig::default(),
            dir.path(),
            Arc::new(MemorySnapshotArchive::new()),
        );
        let notifier = Arc::new(CollectingNotifier::new());
        engine.add_notifier(notifier.clone());
        Self {
            engine,
            notifier,
            _dir: dir,
        }
    }

    fn register(&self, id: &str) -> ServerId {
        let server_id = ServerId::parse(id).unwrap();
        self.engine.register_server(&server_id);
        server_id
    }

    fn offline_rule(&self, emails: &[&str]) {
        self.engine
            .add_rule(NewAlertRule {
                kind: AlertKind::Offline,
                scope: RuleScope::Global,
                target: None,
                emails: emails.iter().map(ToString::to_string).collect(),
            })
            .unwrap();
    }
}

/// A sweeper config where any silence at all counts as overdue.
fn hair_trigger() -> SweeperConfig {
    SweeperConfig::new()
        .with_offline_multiplier(0)
        .with_offline_minimum(Duration::ZERO)
}

fn quiet(id: &str) -> MetricSnapshot {
    MetricSnapshot {
        server_id: ServerId::parse(id).unwrap(),
        recorded_at: Utc::now(),
        memory: MemoryUsage {
            total: 1000.0,
            used: 100.0,
            free: 900.0,
            cache: 0.0,
        },
        cpu: CpuUsage {
            total: 10.0,
            per_core: vec![10.0],
        },
        disk: DiskUsage {
            total: 500.0,
            used: 50.0,
            free: 450.0,
            percent: 10.0,
        },
        containers: ContainerSummary::default(),
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ============================================================================
// Single sweeps
// ============================================================================

#[tokio::test]
async fn test_fresh_server_is_not_overdue() {
    let rig = TestMonitor::new();
    rig.register("srv1");

    let summary = rig.engine.sweep_offline(&SweeperConfig::default()).await;

    assert_eq!(summary.servers_checked, 1);
    assert_eq!(summary.overdue, 0);
    assert!(summary.fired.is_empty());
    assert_eq!(summary.suppressed, 0);
}

#[tokio::test]
async fn test_overdue_server_alerts_scoped_recipients() {
    let rig = TestMonitor::new();
    let srv = rig.register("srv1");
    rig.offline_rule(&["ops@vigil.dev"]);
    let alice = rig.engine.add_user("Alice", "alice@vigil.dev").unwrap();
    rig.engine.assign_user(&alice.id, &srv, true).unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    let summary = rig.engine.sweep_offline(&hair_trigger()).await;
    settle().await;

    assert_eq!(summary.overdue, 1);
    assert_eq!(summary.fired, vec![srv.clone()]);

    let events = rig.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AlertKind::Offline);
    assert_eq!(events[0].server_id, srv);
    assert!(events[0].snapshot.is_none());
    let mut emails = events[0].emails();
    emails.sort_unstable();
    assert_eq!(emails, vec!["alice@vigil.dev", "ops@vigil.dev"]);
}

#[tokio::test]
async fn test_repeat_sweeps_respect_the_cooldown() {
    let rig = TestMonitor::new();
    rig.register("srv1");
    rig.offline_rule(&["ops@vigil.dev"]);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let first = rig.engine.sweep_offline(&hair_trigger()).await;
    let second = rig.engine.sweep_offline(&hair_trigger()).await;
    settle().await;

    assert_eq!(first.fired.len(), 1);
    assert_eq!(second.overdue, 1);
    assert!(second.fired.is_empty());
    assert_eq!(second.suppressed, 1);
    assert_eq!(rig.notifier.count(), 1);
}

#[tokio::test]
async fn test_ingest_resets_the_silence_clock() {
    let rig = TestMonitor::new();
    let srv = rig.register("srv1");
    rig.offline_rule(&["ops@vigil.dev"]);
    let config = SweeperConfig::new()
        .with_offline_multiplier(0)
        .with_offline_minimum(Duration::from_millis(150));

    tokio::time::sleep(Duration::from_millis(250)).await;
    rig.engine.ingest(&srv, quiet("srv1")).await.unwrap();

    // the report just landed, so the server is inside its allowance again
    let summary = rig.engine.sweep_offline(&config).await;
    assert_eq!(summary.overdue, 0);

    tokio::time::sleep(Duration::from_millis(250)).await;
    let summary = rig.engine.sweep_offline(&config).await;
    assert_eq!(summary.overdue, 1);
}

// ============================================================================
// Background task
// ============================================================================

#[tokio::test]
async fn test_background_sweeper_alerts_once_per_window() {
    let rig = TestMonitor::new();
    rig.register("srv1");
    rig.offline_rule(&["ops@vigil.dev"]);
    let config = hair_trigger().with_check_period(Duration::from_millis(20));

    let handle = start_sweeper_task(rig.engine.clone(), config);
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(handle.is_running());
    assert!(handle.sweep_count() >= 2, "expected repeated sweeps");
    // many sweeps, one alert: the cooldown holds across ticks
    assert_eq!(rig.notifier.count(), 1);

    handle.stop();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!handle.is_running());

    let settled = handle.sweep_count();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(handle.sweep_count() <= settled + 1, "sweeper kept running after stop");
}
