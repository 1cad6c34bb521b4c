//! Walkthrough of the monitoring core: register a server, shape its
//! thresholds and routing, push agent reports, and run an offline sweep.
//!
//! Run with: RUST_LOG=info cargo run -p vigil-engine --example demo

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vigil_alerts::TracingNotifier;
use vigil_engine::{MonitorEngine, SweeperConfig};
use vigil_proto::{
    AlertKind, ContainerSummary, CpuUsage, DiskUsage, MemoryUsage, MetricKind, MetricSnapshot,
    ServerId,
};
use vigil_store::{NewAlertRule, RuleScope};

fn report(id: &ServerId, cpu: f64, mem_used: f64, disk: f64) -> MetricSnapshot {
    MetricSnapshot {
        server_id: id.clone(),
        recorded_at: Utc::now(),
        memory: MemoryUsage {
            total: 32_768.0,
            used: mem_used,
            free: 32_768.0 - mem_used,
            cache: 2_048.0,
        },
        cpu: CpuUsage {
            total: cpu,
            per_core: vec![cpu; 8],
        },
        disk: DiskUsage {
            total: 1_000.0,
            used: disk * 10.0,
            free: 1_000.0 - disk * 10.0,
            percent: disk,
        },
        containers: ContainerSummary::default(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("vigil_engine=info".parse()?)
                .add_directive("vigil_alerts=info".parse()?),
        )
        .init();

    let dir = tempfile::tempdir()?;
    let engine = MonitorEngine::open(dir.path())?;
    engine.add_notifier(Arc::new(TracingNotifier::new()));

    println!("\n🔍 Vigil Monitoring Core Walkthrough");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    // ─── Fleet setup ───
    let db1 = ServerId::parse("db-1")?;
    let server = engine.register_server(&db1);
    println!("registered {} (token {})", server.id, server.token);
    engine.set_server_group(&db1, Some("databases".to_string()))?;
    engine.set_report_interval(&db1, 30)?;

    // tighten cpu for this one box, leave memory and disk on the defaults
    engine.set_override(&db1, Some(75.0), None, None)?;
    println!(
        "effective cpu threshold: {:?}",
        engine.effective_threshold(&db1, MetricKind::Cpu)
    );

    // ─── Routing ───
    engine.add_rule(NewAlertRule {
        kind: AlertKind::Cpu,
        scope: RuleScope::Global,
        target: None,
        emails: vec!["ops@vigil.dev".to_string()],
    })?;
    engine.add_rule(NewAlertRule {
        kind: AlertKind::Offline,
        scope: RuleScope::Group,
        target: Some("databases".to_string()),
        emails: vec!["dba@vigil.dev".to_string()],
    })?;
    let alice = engine.add_user("Alice", "alice@vigil.dev")?;
    engine.assign_user(&alice.id, &db1, true)?;

    // ─── Agent reports ───
    let receipt = engine.ingest(&db1, report(&db1, 35.0, 8_192.0, 41.0)).await?;
    println!("calm report: fired {:?}", receipt.fired);

    let receipt = engine.ingest(&db1, report(&db1, 88.0, 8_192.0, 41.0)).await?;
    println!("hot report:  fired {:?}", receipt.fired);

    // the same breach again sits inside the cooldown window
    let receipt = engine.ingest(&db1, report(&db1, 91.0, 8_192.0, 41.0)).await?;
    println!("repeat:      fired {:?} suppressed {:?}", receipt.fired, receipt.suppressed);

    // ─── Offline sweep ───
    // a hair-trigger allowance so the sweep has something to find here
    tokio::time::sleep(Duration::from_millis(50)).await;
    let sweep = SweeperConfig::new()
        .with_offline_multiplier(0)
        .with_offline_minimum(Duration::ZERO);
    let summary = engine.sweep_offline(&sweep).await;
    println!(
        "sweep: checked {} overdue {} fired {:?}",
        summary.servers_checked, summary.overdue, summary.fired
    );

    // let the fire-and-forget deliveries land before the runtime exits
    tokio::time::sleep(Duration::from_millis(200)).await;

    let history = engine.recent(&db1, 10)?;
    println!("\nrecent reports held for {}: {}", db1, history.len());

    Ok(())
}
