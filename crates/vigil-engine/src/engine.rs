//! The monitor engine: ingest pipeline, history reads, and the admin
//! surface over every store.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vigil_alerts::{AlertEvaluator, EvaluatorConfig, Notifier, ThresholdResolver};
use vigil_metrics::RecentCache;
use vigil_proto::{AlertKind, MetricKind, MetricSnapshot, ServerId, ValidationError};
use vigil_store::{
    AlertConfigStore, AlertRule, FileSnapshotArchive, GlobalAlertConfig, NewAlertRule,
    RuleStore, Server, ServerRegistry, ServerThreshold, SnapshotArchive, ThresholdStore,
    User, UserDirectory, UserServerAssignment,
};

use crate::config::{EngineConfig, SweeperConfig};
use crate::error::{EngineError, Result};

/// Default number of snapshots a history read returns.
pub const DEFAULT_RECENT_LIMIT: usize = 100;

/// The outcome of one accepted ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    /// The reporting server.
    pub server_id: ServerId,
    /// The sample time of the accepted snapshot.
    pub recorded_at: DateTime<Utc>,
    /// Alert kinds that fired on this snapshot.
    pub fired: Vec<AlertKind>,
    /// Alert kinds that crossed their threshold but sat inside the
    /// cooldown window.
    pub suppressed: Vec<AlertKind>,
}

/// The outcome of one offline sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Servers examined.
    pub servers_checked: usize,
    /// Servers past their allowed silence.
    pub overdue: usize,
    /// Servers whose offline alert fired this sweep.
    pub fired: Vec<ServerId>,
    /// Overdue servers suppressed by cooldown.
    pub suppressed: usize,
}

/// The core of the monitoring service.
///
/// Owns the server registry, rule and user stores, threshold
/// configuration, the append-only snapshot archive, the recent-metrics
/// cache, and the alert evaluator, and exposes the operations the
/// transport layer calls. Cloning shares all state; handing a clone to
/// the sweeper task or a request handler is the intended usage.
pub struct MonitorEngine {
    config: EngineConfig,
    registry: Arc<RwLock<ServerRegistry>>,
    rules: Arc<RwLock<RuleStore>>,
    users: Arc<RwLock<UserDirectory>>,
    alert_config: Arc<RwLock<AlertConfigStore>>,
    overrides: Arc<RwLock<ThresholdStore>>,
    archive: Arc<dyn SnapshotArchive>,
    cache: RecentCache,
    evaluator: AlertEvaluator,
}

impl MonitorEngine {
    /// Open an engine with default configuration, storing state under
    /// `state_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot archive cannot be opened.
    pub fn open(state_dir: &Path) -> Result<Self> {
        Self::open_with_config(EngineConfig::default(), state_dir)
    }

    /// Open an engine with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot archive cannot be opened.
    pub fn open_with_config(config: EngineConfig, state_dir: &Path) -> Result<Self> {
        let archive = Arc::new(FileSnapshotArchive::open(state_dir)?);
        Ok(Self::with_archive(config, state_dir, archive))
    }

    /// Open an engine over a caller-supplied archive.
    ///
    /// Registry-style stores still live under `state_dir`; only the
    /// snapshot archive is taken from the caller.
    #[must_use]
    pub fn with_archive(
        config: EngineConfig,
        state_dir: &Path,
        archive: Arc<dyn SnapshotArchive>,
    ) -> Self {
        let alert_config = AlertConfigStore::new(state_dir);
        let overrides = ThresholdStore::new(state_dir);

        // warm the resolver from persisted state so the first evaluation
        // already sees every override
        let resolver = ThresholdResolver::new(alert_config.get(), overrides.export());
        let evaluator = AlertEvaluator::with_config(
            EvaluatorConfig::new()
                .with_cooldown_window(config.cooldown_window)
                .with_notify_timeout(config.notify_timeout),
            resolver,
        );

        let engine = Self {
            config,
            registry: Arc::new(RwLock::new(ServerRegistry::new(state_dir))),
            rules: Arc::new(RwLock::new(RuleStore::new(state_dir))),
            users: Arc::new(RwLock::new(UserDirectory::new(state_dir))),
            alert_config: Arc::new(RwLock::new(alert_config)),
            overrides: Arc::new(RwLock::new(overrides)),
            archive,
            cache: RecentCache::new(config.cache_max_per_server),
            evaluator,
        };

        info!(
            servers = engine.registry.read().len(),
            rules = engine.rules.read().len(),
            overrides = engine.overrides.read().len(),
            "opened monitor engine"
        );

        engine
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The evaluator, for registering notifiers.
    #[must_use]
    pub const fn evaluator(&self) -> &AlertEvaluator {
        &self.evaluator
    }

    /// Registers a delivery channel for fired alerts.
    pub fn add_notifier(&self, notifier: Arc<dyn Notifier>) {
        self.evaluator.add_notifier(notifier);
    }

    // ==================== Ingest ====================

    /// Accept one metric snapshot from a registered server.
    ///
    /// The pipeline is: server lookup, validation, durable archive append,
    /// last-seen bump, cache append, alert evaluation. The archive append
    /// is synchronous and its failure rejects the ingest; the cache append
    /// cannot fail; evaluation dispatches fired alerts on detached tasks.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownServer`] for an unregistered server,
    /// [`EngineError::InvalidSnapshot`] when a field is out of range, or a
    /// store error when the archive append fails. On any error nothing is
    /// cached and no alert is evaluated.
    pub async fn ingest(
        &self,
        server_id: &ServerId,
        snapshot: MetricSnapshot,
    ) -> Result<IngestReceipt> {
        let server = self
            .registry
            .read()
            .get(server_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownServer(server_id.to_string()))?;

        if snapshot.server_id != *server_id {
            return Err(EngineError::InvalidSnapshot(ValidationError::new(
                "server_id",
                format!(
                    "snapshot reports '{}' but was submitted for '{server_id}'",
                    snapshot.server_id
                ),
            )));
        }

        snapshot.validate()?;

        // durable first: history and cache must never diverge on a crash
        self.archive.append(&snapshot)?;

        self.registry.write().touch_last_seen(server_id, Utc::now())?;

        self.cache.append(snapshot.clone());

        let rules = self.rules.read().list();
        let assigned = self.users.read().recipients_for(server_id);
        let report = self
            .evaluator
            .evaluate_snapshot(&server, &snapshot, &rules, &assigned)
            .await;

        debug!(
            server_id = %server_id,
            fired = report.fired.len(),
            suppressed = report.suppressed.len(),
            "ingested snapshot"
        );

        Ok(IngestReceipt {
            server_id: server_id.clone(),
            recorded_at: snapshot.recorded_at,
            fired: report.fired_kinds(),
            suppressed: report.suppressed,
        })
    }

    // ==================== History ====================

    /// Up to `limit` most recent snapshots for a server, newest last.
    ///
    /// Served from the cache when the server's buffer is non-empty. On a
    /// miss the newest rows are read back from the archive and re-seed the
    /// cache, so only the first read after a restart touches disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive read-through fails.
    pub fn recent(&self, server_id: &ServerId, limit: usize) -> Result<Vec<MetricSnapshot>> {
        if !self.cache.is_empty(server_id) {
            return Ok(self.cache.recent(server_id, limit));
        }

        let rows = self
            .archive
            .recent(server_id, self.config.cache_max_per_server)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            server_id = %server_id,
            count = rows.len(),
            "re-seeded cache from archive"
        );
        self.cache.seed(server_id, rows);
        Ok(self.cache.recent(server_id, limit))
    }

    // ==================== Threshold administration ====================

    /// Upsert a server's threshold override row, write-through to the
    /// evaluator's view.
    ///
    /// A kind passed as `None` falls back to the global default; all three
    /// `None` clears the row.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any value falls outside `[0, 100]`.
    pub fn set_override(
        &self,
        server_id: &ServerId,
        cpu: Option<f64>,
        memory: Option<f64>,
        disk: Option<f64>,
    ) -> Result<ServerThreshold> {
        let row = self.overrides.write().set(server_id, cpu, memory, disk)?;
        self.evaluator.thresholds().set_override(row.clone());
        Ok(row)
    }

    /// Drop a server's override row; the server reverts to the global
    /// defaults. Removing a missing row is a no-op.
    pub fn remove_override(&self, server_id: &ServerId) -> Option<ServerThreshold> {
        let removed = self.overrides.write().remove(server_id);
        if removed.is_some() {
            self.evaluator.thresholds().remove_override(server_id);
        }
        removed
    }

    /// All override rows, ordered by server id.
    #[must_use]
    pub fn export_thresholds(&self) -> Vec<ServerThreshold> {
        self.overrides.read().export()
    }

    /// Bulk-upsert override rows, returning how many were applied.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending server and field;
    /// the batch is rejected as a whole.
    pub fn import_thresholds(&self, rows: Vec<ServerThreshold>) -> Result<usize> {
        let mut overrides = self.overrides.write();
        let count = overrides.import(rows)?;
        self.evaluator.thresholds().replace_overrides(overrides.export());
        Ok(count)
    }

    /// The current global alert config.
    #[must_use]
    pub fn global_config(&self) -> GlobalAlertConfig {
        self.alert_config.read().get()
    }

    /// Replace the global thresholds, write-through to the evaluator's
    /// view. Zero disables a kind fleet-wide.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any value falls outside `[0, 100]`.
    pub fn set_global_config(&self, cpu: f64, memory: f64, disk: f64) -> Result<GlobalAlertConfig> {
        let config = self.alert_config.write().set(cpu, memory, disk)?;
        self.evaluator.thresholds().set_global(config);
        Ok(config)
    }

    /// The threshold in effect for one server and metric kind; `None`
    /// means the kind is disabled.
    #[must_use]
    pub fn effective_threshold(&self, server_id: &ServerId, kind: MetricKind) -> Option<f64> {
        self.evaluator.thresholds().effective(server_id, kind)
    }

    // ==================== Server administration ====================

    /// Register a server, or rotate the token of an already registered
    /// one. The returned row carries the freshly minted token.
    pub fn register_server(&self, server_id: &ServerId) -> Server {
        self.registry.write().register(server_id)
    }

    /// Look up a server.
    #[must_use]
    pub fn get_server(&self, server_id: &ServerId) -> Option<Server> {
        self.registry.read().get(server_id).cloned()
    }

    /// All registered servers, ordered by id.
    #[must_use]
    pub fn list_servers(&self) -> Vec<Server> {
        self.registry.read().list()
    }

    /// Move a server into a group, or out of any with `None`.
    ///
    /// # Errors
    ///
    /// Returns [`vigil_store::StoreError::ServerNotFound`] if the server
    /// is not registered.
    pub fn set_server_group(&self, server_id: &ServerId, group: Option<String>) -> Result<()> {
        self.registry.write().set_group(server_id, group)?;
        Ok(())
    }

    /// Change a server's expected report interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not registered or the interval
    /// is zero.
    pub fn set_report_interval(&self, server_id: &ServerId, secs: u64) -> Result<()> {
        self.registry.write().set_report_interval(server_id, secs)?;
        Ok(())
    }

    /// Deregister a server and drop its dependent state: cached
    /// snapshots, cooldown entries, threshold override, and user links.
    /// Archived history is append-only and stays.
    ///
    /// # Errors
    ///
    /// Returns [`vigil_store::StoreError::ServerNotFound`] if the server
    /// is not registered.
    pub fn remove_server(&self, server_id: &ServerId) -> Result<Server> {
        let removed = self.registry.write().remove(server_id)?;

        self.cache.remove_server(server_id);
        self.evaluator.cooldowns().remove_server(server_id);
        self.overrides.write().remove(server_id);
        self.evaluator.thresholds().remove_override(server_id);
        self.users.write().remove_server_links(server_id);

        info!(server_id = %server_id, "removed server and dependent state");
        Ok(removed)
    }

    // ==================== Rule administration ====================

    /// Add an alert routing rule.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed scope/target combination
    /// or bad e-mail addresses.
    pub fn add_rule(&self, new: NewAlertRule) -> Result<AlertRule> {
        let rule = self.rules.write().add(new)?;
        Ok(rule)
    }

    /// Remove a rule by id.
    ///
    /// # Errors
    ///
    /// Returns [`vigil_store::StoreError::RuleNotFound`] if no rule has
    /// that id.
    pub fn remove_rule(&self, rule_id: &str) -> Result<AlertRule> {
        let rule = self.rules.write().remove(rule_id)?;
        Ok(rule)
    }

    /// All rules, ordered by creation time.
    #[must_use]
    pub fn list_rules(&self) -> Vec<AlertRule> {
        self.rules.read().list()
    }

    // ==================== User administration ====================

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed or already registered e-mail.
    pub fn add_user(&self, name: &str, email: &str) -> Result<User> {
        let user = self.users.write().add_user(name, email)?;
        Ok(user)
    }

    /// Remove a user and every assignment they hold.
    ///
    /// # Errors
    ///
    /// Returns [`vigil_store::StoreError::UserNotFound`] if no user has
    /// that id.
    pub fn remove_user(&self, user_id: &str) -> Result<User> {
        let user = self.users.write().remove_user(user_id)?;
        Ok(user)
    }

    /// All users, ordered by creation time.
    #[must_use]
    pub fn list_users(&self) -> Vec<User> {
        self.users.read().list_users()
    }

    /// Assign a user to a registered server, or update the existing
    /// link's subscription flag.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownServer`] if the server is not
    /// registered, or a store error if the user does not exist.
    pub fn assign_user(
        &self,
        user_id: &str,
        server_id: &ServerId,
        receive_alerts: bool,
    ) -> Result<UserServerAssignment> {
        if !self.registry.read().contains(server_id) {
            return Err(EngineError::UnknownServer(server_id.to_string()));
        }
        let assignment = self.users.write().assign(user_id, server_id, receive_alerts)?;
        Ok(assignment)
    }

    /// Remove a user-server assignment.
    ///
    /// # Errors
    ///
    /// Returns [`vigil_store::StoreError::AssignmentNotFound`] if no such
    /// link exists.
    pub fn unassign_user(&self, user_id: &str, server_id: &ServerId) -> Result<UserServerAssignment> {
        let assignment = self.users.write().unassign(user_id, server_id)?;
        Ok(assignment)
    }

    /// Toggle the subscription flag on an existing assignment without
    /// deleting it.
    ///
    /// # Errors
    ///
    /// Returns [`vigil_store::StoreError::AssignmentNotFound`] if no such
    /// link exists.
    pub fn set_link_receive_alerts(
        &self,
        user_id: &str,
        server_id: &ServerId,
        enabled: bool,
    ) -> Result<()> {
        self.users
            .write()
            .set_link_receive_alerts(user_id, server_id, enabled)?;
        Ok(())
    }

    /// All assignments for a server, subscribed or not.
    #[must_use]
    pub fn assignments_for(&self, server_id: &ServerId) -> Vec<UserServerAssignment> {
        self.users.read().assignments_for(server_id)
    }

    // ==================== Offline sweep ====================

    /// Scan the registry once and fire `offline` alerts for servers past
    /// their allowed silence.
    ///
    /// A server is overdue when `now - last_seen` exceeds
    /// `max(report_interval * multiplier, minimum)`. Overdue servers run
    /// through the same cooldown and dispatch as metric alerts, so an
    /// unreachable server alerts once per window, not once per sweep.
    pub async fn sweep_offline(&self, config: &SweeperConfig) -> SweepSummary {
        let servers = self.registry.read().list();
        let now = Utc::now();
        let mut summary = SweepSummary::default();

        for server in servers {
            summary.servers_checked += 1;

            let allowed = config.offline_threshold(server.report_interval_secs);
            // a last_seen in the future reads as zero silence
            let silent = (now - server.last_seen).to_std().unwrap_or_default();
            if silent <= allowed {
                continue;
            }

            summary.overdue += 1;
            let rules = self.rules.read().list();
            let assigned = self.users.read().recipients_for(&server.id);

            match self
                .evaluator
                .evaluate_offline(&server, silent, allowed, &rules, &assigned)
                .await
            {
                Some(event) => summary.fired.push(event.server_id),
                None => summary.suppressed += 1,
            }
        }

        info!(
            servers_checked = summary.servers_checked,
            overdue = summary.overdue,
            fired = summary.fired.len(),
            suppressed = summary.suppressed,
            "offline sweep complete"
        );

        summary
    }
}

impl Clone for MonitorEngine {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            registry: Arc::clone(&self.registry),
            rules: Arc::clone(&self.rules),
            users: Arc::clone(&self.users),
            alert_config: Arc::clone(&self.alert_config),
            overrides: Arc::clone(&self.overrides),
            archive: Arc::clone(&self.archive),
            cache: self.cache.clone(),
            evaluator: self.evaluator.clone(),
        }
    }
}

impl std::fmt::Debug for MonitorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorEngine")
            .field("config", &self.config)
            .field("servers", &self.registry.read().len())
            .finish_non_exhaustive()
    }
}
