//! End-to-end tests for the ingest pipeline (vigil-proto, vigil-metrics,
//! vigil-store, and vigil-alerts wired together by `MonitorEngine`).
//!
//! These tests verify:
//! 1. Registration gating and snapshot validation
//! 2. Rejected snapshots leaving no trace in the cache or archive
//! 3. Threshold precedence: override beats global, zero disables
//! 4. Scoped recipient resolution with de-duplication
//! 5. Per-(server, kind) cooldown across the whole pipeline
//! 6. Concurrent ingest firing at most one dispatch per window
//! 7. Cache read-through from the archive after a restart

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use vigil_alerts::CollectingNotifier;
use vigil_engine::{EngineConfig, EngineError, MonitorEngine};
use vigil_proto::{
    AlertKind, ContainerSummary, CpuUsage, DiskUsage, MemoryUsage, MetricSnapshot, ServerId,
};
use vigil_store::{MemorySnapshotArchive, NewAlertRule, RuleScope, SnapshotArchive};

// ============================================================================
// Helpers
// ============================================================================

/// An engine over an in-memory archive with a collecting notifier attached.
struct TestMonitor {
    engine: MonitorEngine,
    notifier: Arc<CollectingNotifier>,
    archive: Arc<MemorySnapshotArchive>,
    _dir: TempDir,
}

impl TestMonitor {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let archive = Arc::new(MemorySnapshotArchive::new());
        let engine = MonitorEngine::with_archive(config, dir.path(), archive.clone());
        let notifier = Arc::new(CollectingNotifier::new());
        engine.add_notifier(notifier.clone());
        Self {
            engine,
            notifier,
            archive,
            _dir: dir,
        }
    }

    /// Register a server and hand back its id.
    fn register(&self, id: &str) -> ServerId {
        let server_id = sid(id);
        self.engine.register_server(&server_id);
        server_id
    }

    fn global_rule(&self, kind: AlertKind, emails: &[&str]) {
        self.engine
            .add_rule(NewAlertRule {
                kind,
                scope: RuleScope::Global,
                target: None,
                emails: emails.iter().map(ToString::to_string).collect(),
            })
            .unwrap();
    }
}

fn sid(id: &str) -> ServerId {
    ServerId::parse(id).unwrap()
}

fn snapshot(id: &str, cpu: f64, mem_used: f64, disk: f64) -> MetricSnapshot {
    MetricSnapshot {
        server_id: sid(id),
        recorded_at: Utc::now(),
        memory: MemoryUsage {
            total: 1000.0,
            used: mem_used,
            free: 1000.0 - mem_used,
            cache: 0.0,
        },
        cpu: CpuUsage {
            total: cpu,
            per_core: vec![cpu],
        },
        disk: DiskUsage {
            total: 500.0,
            used: 250.0,
            free: 250.0,
            percent: disk,
        },
        containers: ContainerSummary::default(),
    }
}

/// A snapshot that trips the default 90% CPU threshold and nothing else.
fn cpu_breach(id: &str) -> MetricSnapshot {
    snapshot(id, 95.0, 100.0, 10.0)
}

/// A snapshot comfortably below every default threshold.
fn quiet(id: &str) -> MetricSnapshot {
    snapshot(id, 10.0, 100.0, 10.0)
}

/// Give the fire-and-forget dispatch tasks a beat to land.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ============================================================================
// Registration gating and validation
// ============================================================================

#[tokio::test]
async fn test_ingest_requires_a_registered_server() {
    let rig = TestMonitor::new();

    let err = rig
        .engine
        .ingest(&sid("ghost"), quiet("ghost"))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::UnknownServer(_)));
    assert!(rig.archive.is_empty().unwrap());
}

#[tokio::test]
async fn test_rejected_snapshot_leaves_no_trace() {
    let rig = TestMonitor::new();
    let srv = rig.register("srv1");
    rig.global_rule(AlertKind::Cpu, &["ops@vigil.dev"]);

    // cpu.total over 100 fails validation even though it would breach
    let bad = snapshot("srv1", 150.0, 100.0, 10.0);
    let err = rig.engine.ingest(&srv, bad).await.unwrap_err();

    assert!(matches!(err, EngineError::InvalidSnapshot(_)));
    assert!(rig.engine.recent(&srv, 10).unwrap().is_empty());
    assert!(rig.archive.is_empty().unwrap());
    settle().await;
    assert_eq!(rig.notifier.count(), 0);
}

#[tokio::test]
async fn test_snapshot_for_another_server_is_rejected() {
    let rig = TestMonitor::new();
    let srv1 = rig.register("srv1");
    rig.register("srv2");

    let err = rig
        .engine
        .ingest(&srv1, quiet("srv2"))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidSnapshot(_)));
    assert!(rig.archive.is_empty().unwrap());
}

#[tokio::test]
async fn test_accepted_snapshot_is_cached_and_archived() {
    let rig = TestMonitor::new();
    let srv = rig.register("srv1");

    let receipt = rig.engine.ingest(&srv, quiet("srv1")).await.unwrap();

    assert_eq!(receipt.server_id, srv);
    assert!(receipt.fired.is_empty());
    assert!(receipt.suppressed.is_empty());
    assert_eq!(rig.engine.recent(&srv, 10).unwrap().len(), 1);
    assert_eq!(rig.archive.len().unwrap(), 1);
}

// ============================================================================
// Threshold precedence
// ============================================================================

#[tokio::test]
async fn test_override_beats_the_global_default() {
    let rig = TestMonitor::new();
    let srv1 = rig.register("srv1");
    let srv2 = rig.register("srv2");
    rig.global_rule(AlertKind::Cpu, &["ops@vigil.dev"]);
    rig.engine.set_override(&srv1, Some(50.0), None, None).unwrap();

    // 60% trips srv1's override but sits below srv2's global 90%
    let receipt1 = rig
        .engine
        .ingest(&srv1, snapshot("srv1", 60.0, 100.0, 10.0))
        .await
        .unwrap();
    let receipt2 = rig
        .engine
        .ingest(&srv2, snapshot("srv2", 60.0, 100.0, 10.0))
        .await
        .unwrap();
    settle().await;

    assert_eq!(receipt1.fired, vec![AlertKind::Cpu]);
    assert!(receipt2.fired.is_empty());

    let events = rig.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].server_id, srv1);
    assert_eq!(events[0].value, 60.0);
    assert_eq!(events[0].threshold, 50.0);
}

#[tokio::test]
async fn test_zero_override_disables_one_kind_for_one_server() {
    let rig = TestMonitor::new();
    let srv = rig.register("srv1");
    rig.global_rule(AlertKind::Cpu, &["ops@vigil.dev"]);
    rig.global_rule(AlertKind::Memory, &["ops@vigil.dev"]);
    rig.engine.set_override(&srv, Some(0.0), None, None).unwrap();

    // cpu is disabled, memory still runs on the global 90%
    let receipt = rig
        .engine
        .ingest(&srv, snapshot("srv1", 99.0, 950.0, 10.0))
        .await
        .unwrap();
    settle().await;

    assert_eq!(receipt.fired, vec![AlertKind::Memory]);
    let events = rig.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AlertKind::Memory);
}

#[tokio::test]
async fn test_zero_global_disables_a_kind_fleet_wide() {
    let rig = TestMonitor::new();
    let srv = rig.register("srv1");
    rig.global_rule(AlertKind::Cpu, &["ops@vigil.dev"]);
    rig.engine.set_global_config(0.0, 90.0, 90.0).unwrap();

    let receipt = rig.engine.ingest(&srv, cpu_breach("srv1")).await.unwrap();
    settle().await;

    assert!(receipt.fired.is_empty());
    assert_eq!(rig.notifier.count(), 0);
}

// ============================================================================
// Recipient resolution
// ============================================================================

#[tokio::test]
async fn test_rules_route_by_scope_and_dedupe_addresses() {
    let rig = TestMonitor::new();
    let srv1 = rig.register("srv1");
    let srv2 = rig.register("srv2");
    rig.engine
        .set_server_group(&srv1, Some("batch".to_string()))
        .unwrap();
    rig.engine
        .set_server_group(&srv2, Some("web".to_string()))
        .unwrap();

    rig.global_rule(AlertKind::Cpu, &["ops@vigil.dev"]);
    rig.engine
        .add_rule(NewAlertRule {
            kind: AlertKind::Cpu,
            scope: RuleScope::Server,
            target: Some("srv1".to_string()),
            emails: vec!["oncall@vigil.dev".to_string()],
        })
        .unwrap();
    // overlaps the global address on purpose
    rig.engine
        .add_rule(NewAlertRule {
            kind: AlertKind::Cpu,
            scope: RuleScope::Group,
            target: Some("batch".to_string()),
            emails: vec!["batch@vigil.dev".to_string(), "ops@vigil.dev".to_string()],
        })
        .unwrap();
    // different kind, must not leak into cpu alerts
    rig.engine
        .add_rule(NewAlertRule {
            kind: AlertKind::Memory,
            scope: RuleScope::Server,
            target: Some("srv1".to_string()),
            emails: vec!["mem@vigil.dev".to_string()],
        })
        .unwrap();

    rig.engine.ingest(&srv1, cpu_breach("srv1")).await.unwrap();
    settle().await;

    let events = rig.notifier.events();
    assert_eq!(events.len(), 1);
    let mut emails = events[0].emails();
    emails.sort_unstable();
    assert_eq!(emails, vec!["batch@vigil.dev", "oncall@vigil.dev", "ops@vigil.dev"]);

    // srv2 matches only the global rule
    rig.engine.ingest(&srv2, cpu_breach("srv2")).await.unwrap();
    settle().await;

    let events = rig.notifier.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].server_id, srv2);
    assert_eq!(events[1].emails(), vec!["ops@vigil.dev"]);
}

#[tokio::test]
async fn test_assigned_users_receive_alerts_when_subscribed() {
    let rig = TestMonitor::new();
    let srv = rig.register("srv1");

    let alice = rig.engine.add_user("Alice", "alice@vigil.dev").unwrap();
    let bob = rig.engine.add_user("Bob", "bob@vigil.dev").unwrap();
    rig.engine.add_user("Carol", "carol@vigil.dev").unwrap();

    rig.engine.assign_user(&alice.id, &srv, true).unwrap();
    rig.engine.assign_user(&bob.id, &srv, false).unwrap();
    // Carol is never assigned

    rig.engine.ingest(&srv, cpu_breach("srv1")).await.unwrap();
    settle().await;

    let events = rig.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].emails(), vec!["alice@vigil.dev"]);
}

#[tokio::test]
async fn test_assignment_requires_a_registered_server() {
    let rig = TestMonitor::new();
    let alice = rig.engine.add_user("Alice", "alice@vigil.dev").unwrap();

    let err = rig
        .engine
        .assign_user(&alice.id, &sid("ghost"), true)
        .unwrap_err();

    assert!(matches!(err, EngineError::UnknownServer(_)));
}

#[tokio::test]
async fn test_alert_without_recipients_still_fires_and_cools_down() {
    let rig = TestMonitor::new();
    let srv = rig.register("srv1");

    // no rules, no assignments
    let first = rig.engine.ingest(&srv, cpu_breach("srv1")).await.unwrap();
    settle().await;

    assert_eq!(first.fired, vec![AlertKind::Cpu]);
    assert_eq!(rig.notifier.count(), 0);

    // the silent fire still armed the cooldown
    let second = rig.engine.ingest(&srv, cpu_breach("srv1")).await.unwrap();
    assert!(second.fired.is_empty());
    assert_eq!(second.suppressed, vec![AlertKind::Cpu]);
}

// ============================================================================
// Cooldown across the pipeline
// ============================================================================

#[tokio::test]
async fn test_repeat_breach_inside_the_window_is_suppressed() {
    let rig = TestMonitor::new();
    let srv = rig.register("srv1");
    rig.global_rule(AlertKind::Cpu, &["ops@vigil.dev"]);

    let first = rig.engine.ingest(&srv, cpu_breach("srv1")).await.unwrap();
    let second = rig.engine.ingest(&srv, cpu_breach("srv1")).await.unwrap();
    settle().await;

    assert_eq!(first.fired, vec![AlertKind::Cpu]);
    assert!(second.fired.is_empty());
    assert_eq!(second.suppressed, vec![AlertKind::Cpu]);
    assert_eq!(rig.notifier.count(), 1);
}

#[tokio::test]
async fn test_kinds_cool_down_independently() {
    let rig = TestMonitor::new();
    let srv = rig.register("srv1");
    rig.global_rule(AlertKind::Cpu, &["ops@vigil.dev"]);
    rig.global_rule(AlertKind::Memory, &["ops@vigil.dev"]);

    rig.engine.ingest(&srv, cpu_breach("srv1")).await.unwrap();
    let receipt = rig
        .engine
        .ingest(&srv, snapshot("srv1", 10.0, 950.0, 10.0))
        .await
        .unwrap();
    settle().await;

    assert_eq!(receipt.fired, vec![AlertKind::Memory]);
    assert_eq!(rig.notifier.count(), 2);
}

#[tokio::test]
async fn test_servers_cool_down_independently() {
    let rig = TestMonitor::new();
    let srv1 = rig.register("srv1");
    let srv2 = rig.register("srv2");
    rig.global_rule(AlertKind::Cpu, &["ops@vigil.dev"]);

    rig.engine.ingest(&srv1, cpu_breach("srv1")).await.unwrap();
    let receipt = rig.engine.ingest(&srv2, cpu_breach("srv2")).await.unwrap();
    settle().await;

    assert_eq!(receipt.fired, vec![AlertKind::Cpu]);
    assert_eq!(rig.notifier.count(), 2);
}

#[tokio::test]
async fn test_breach_outside_the_window_fires_again() {
    let rig = TestMonitor::with_config(
        EngineConfig::new().with_cooldown_window(Duration::ZERO),
    );
    let srv = rig.register("srv1");
    rig.global_rule(AlertKind::Cpu, &["ops@vigil.dev"]);

    rig.engine.ingest(&srv, cpu_breach("srv1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let receipt = rig.engine.ingest(&srv, cpu_breach("srv1")).await.unwrap();
    settle().await;

    assert_eq!(receipt.fired, vec![AlertKind::Cpu]);
    assert_eq!(rig.notifier.count(), 2);
}

// ============================================================================
// Concurrent ingest
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_breaches_dispatch_once_per_window() {
    let rig = TestMonitor::new();
    let srv = rig.register("srv1");
    rig.global_rule(AlertKind::Cpu, &["ops@vigil.dev"]);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let engine = rig.engine.clone();
        let srv = srv.clone();
        tasks.push(tokio::spawn(async move {
            engine.ingest(&srv, cpu_breach("srv1")).await.unwrap()
        }));
    }

    let mut fired = 0;
    let mut suppressed = 0;
    for task in tasks {
        let receipt = task.await.unwrap();
        fired += receipt.fired.len();
        suppressed += receipt.suppressed.len();
    }
    settle().await;

    // every snapshot lands, exactly one wins the window
    assert_eq!(fired, 1);
    assert_eq!(suppressed, 7);
    assert_eq!(rig.notifier.count(), 1);
    assert_eq!(rig.archive.len().unwrap(), 8);
    assert_eq!(rig.engine.recent(&srv, 100).unwrap().len(), 8);
}

// ============================================================================
// Restart read-through
// ============================================================================

#[tokio::test]
async fn test_recent_reads_through_the_archive_after_restart() {
    let dir = TempDir::new().unwrap();
    let srv = sid("srv1");

    {
        let engine = MonitorEngine::open(dir.path()).unwrap();
        engine.register_server(&srv);
        engine
            .ingest(&srv, snapshot("srv1", 10.0, 100.0, 10.0))
            .await
            .unwrap();
        engine
            .ingest(&srv, snapshot("srv1", 20.0, 100.0, 10.0))
            .await
            .unwrap();
        engine
            .ingest(&srv, snapshot("srv1", 30.0, 100.0, 10.0))
            .await
            .unwrap();
    }

    // a fresh engine starts with a cold cache and falls back to the archive
    let engine = MonitorEngine::open(dir.path()).unwrap();
    assert!(engine.get_server(&srv).is_some());

    let rows = engine.recent(&srv, 10).unwrap();
    assert_eq!(rows.len(), 3);
    let totals: Vec<f64> = rows.iter().map(|s| s.cpu.total).collect();
    assert_eq!(totals, vec![10.0, 20.0, 30.0]);

    // the read seeded the cache; a second read still answers in full
    assert_eq!(engine.recent(&srv, 10).unwrap().len(), 3);
}

#[tokio::test]
async fn test_thresholds_and_rules_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let srv = sid("srv1");

    {
        let engine = MonitorEngine::open(dir.path()).unwrap();
        engine.register_server(&srv);
        engine.set_override(&srv, Some(55.0), None, None).unwrap();
        engine
            .add_rule(NewAlertRule {
                kind: AlertKind::Cpu,
                scope: RuleScope::Global,
                target: None,
                emails: vec!["ops@vigil.dev".to_string()],
            })
            .unwrap();
    }

    let engine = MonitorEngine::open(dir.path()).unwrap();
    let notifier = Arc::new(CollectingNotifier::new());
    engine.add_notifier(notifier.clone());

    // the reopened engine evaluates against the persisted override
    engine
        .ingest(&srv, snapshot("srv1", 60.0, 100.0, 10.0))
        .await
        .unwrap();
    settle().await;

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].threshold, 55.0);
    assert_eq!(events[0].emails(), vec!["ops@vigil.dev"]);
}
