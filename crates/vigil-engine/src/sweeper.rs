//! The periodic offline sweeper task.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::SweeperConfig;
use crate::engine::MonitorEngine;

/// Handle for controlling the sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    running: Arc<AtomicBool>,
    sweeps: Arc<AtomicU64>,
}

impl SweeperHandle {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            sweeps: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Check if the sweeper task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of sweeps completed so far.
    #[must_use]
    pub fn sweep_count(&self) -> u64 {
        self.sweeps.load(Ordering::SeqCst)
    }

    /// Stop the sweeper task. The current sweep, if one is mid-flight,
    /// finishes; no further sweeps start.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Start the periodic offline sweep over an engine handle.
///
/// Returns a handle to stop the task and observe its progress. The first
/// sweep runs immediately, then one per `check_period`.
pub fn start_sweeper_task(engine: MonitorEngine, config: SweeperConfig) -> SweeperHandle {
    let handle = SweeperHandle::new();
    handle.running.store(true, Ordering::SeqCst);

    let running = Arc::clone(&handle.running);
    let sweeps = Arc::clone(&handle.sweeps);

    info!(
        period_secs = config.check_period.as_secs(),
        multiplier = config.offline_multiplier,
        minimum_secs = config.offline_minimum.as_secs(),
        "started offline sweeper"
    );

    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(config.check_period);

        while running.load(Ordering::SeqCst) {
            interval_timer.tick().await;

            if !running.load(Ordering::SeqCst) {
                break;
            }

            engine.sweep_offline(&config).await;
            sweeps.fetch_add(1, Ordering::SeqCst);
        }

        info!("offline sweeper stopped");
    });

    handle
}
