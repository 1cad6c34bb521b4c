//! Engine and sweeper configuration.

use std::time::Duration;

/// Configuration for the monitor engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Snapshots kept in the recent-metrics cache per server.
    pub cache_max_per_server: usize,
    /// Minimum spacing between fires of the same (server, kind).
    pub cooldown_window: Duration,
    /// Deadline for a single notifier delivery.
    pub notify_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_max_per_server: 500,
            cooldown_window: Duration::from_secs(3600), // 1 hour
            notify_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-server cache bound.
    #[must_use]
    pub const fn with_cache_max_per_server(mut self, max: usize) -> Self {
        self.cache_max_per_server = max;
        self
    }

    /// Set the cooldown window.
    #[must_use]
    pub const fn with_cooldown_window(mut self, window: Duration) -> Self {
        self.cooldown_window = window;
        self
    }

    /// Set the per-delivery timeout.
    #[must_use]
    pub const fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }
}

/// Configuration for the offline sweeper.
#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    /// How often the sweeper scans the registry.
    pub check_period: Duration,
    /// A server is overdue after this many missed report intervals.
    pub offline_multiplier: u32,
    /// Floor for the offline threshold, shielding short intervals from
    /// minor jitter.
    pub offline_minimum: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            check_period: Duration::from_secs(60),
            offline_multiplier: 3,
            offline_minimum: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl SweeperConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sweep period.
    #[must_use]
    pub const fn with_check_period(mut self, period: Duration) -> Self {
        self.check_period = period;
        self
    }

    /// Set the missed-interval multiplier.
    #[must_use]
    pub const fn with_offline_multiplier(mut self, multiplier: u32) -> Self {
        self.offline_multiplier = multiplier;
        self
    }

    /// Set the offline threshold floor.
    #[must_use]
    pub const fn with_offline_minimum(mut self, minimum: Duration) -> Self {
        self.offline_minimum = minimum;
        self
    }

    /// The silence a server with the given report interval is allowed
    /// before it counts as offline.
    #[must_use]
    pub fn offline_threshold(&self, report_interval_secs: u64) -> Duration {
        let scaled = Duration::from_secs(report_interval_secs * u64::from(self.offline_multiplier));
        scaled.max(self.offline_minimum)
    }
}
