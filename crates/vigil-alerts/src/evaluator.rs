//! The evaluator that turns snapshots and silence into alert events.
//!
//! This module provides the [`AlertEvaluator`], the entry point of the
//! alerting core. Given a validated snapshot it checks each resource kind
//! against its effective threshold, runs the cooldown state machine, and
//! hands fired events to the registered notifiers on detached tasks so no
//! caller ever waits on a delivery transport.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use vigil_proto::{AlertKind, MetricKind, MetricSnapshot};
use vigil_store::{AlertRule, AssignedRecipient, Server};

use crate::cooldown::CooldownTracker;
use crate::error::AlertError;
use crate::event::AlertEvent;
use crate::notify::Notifier;
use crate::recipients::resolve_recipients;
use crate::thresholds::ThresholdResolver;

/// Configuration for the evaluator.
#[derive(Debug, Clone, Copy)]
pub struct EvaluatorConfig {
    /// Minimum spacing between fires of the same (server, kind).
    pub cooldown_window: Duration,
    /// Deadline for a single notifier delivery.
    pub notify_timeout: Duration,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            cooldown_window: Duration::from_secs(3600), // 1 hour
            notify_timeout: Duration::from_secs(10),
        }
    }
}

impl EvaluatorConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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

/// The outcome of evaluating one snapshot or one offline check.
#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    /// Number of alert kinds checked.
    pub kinds_checked: usize,
    /// Events that fired, in evaluation order.
    pub fired: Vec<AlertEvent>,
    /// Kinds that crossed their threshold but were inside the cooldown
    /// window.
    pub suppressed: Vec<AlertKind>,
}

impl EvaluationReport {
    /// The kinds that fired, in evaluation order.
    #[must_use]
    pub fn fired_kinds(&self) -> Vec<AlertKind> {
        self.fired.iter().map(|e| e.kind).collect()
    }
}

/// Evaluates thresholds and drives the cooldown state machine.
///
/// The evaluator shares its [`ThresholdResolver`] with whoever configures
/// thresholds, so admin updates apply to the next evaluation without any
/// reload step. Cloning shares all state.
#[derive(Debug)]
pub struct AlertEvaluator {
    config: EvaluatorConfig,
    thresholds: ThresholdResolver,
    cooldowns: CooldownTracker,
    notifiers: Arc<RwLock<Vec<Arc<dyn Notifier>>>>,
}

impl AlertEvaluator {
    /// Create an evaluator with default configuration.
    #[must_use]
    pub fn new(thresholds: ThresholdResolver) -> Self {
        Self::with_config(EvaluatorConfig::default(), thresholds)
    }

    /// Create an evaluator with custom configuration.
    #[must_use]
    pub fn with_config(config: EvaluatorConfig, thresholds: ThresholdResolver) -> Self {
        Self {
            config,
            thresholds,
            cooldowns: CooldownTracker::new(config.cooldown_window),
            notifiers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// The shared threshold view.
    #[must_use]
    pub const fn thresholds(&self) -> &ThresholdResolver {
        &self.thresholds
    }

    /// The cooldown state.
    #[must_use]
    pub const fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    /// Registers a delivery channel for fired alerts.
    pub fn add_notifier(&self, notifier: Arc<dyn Notifier>) {
        let mut notifiers = self.notifiers.write();
        info!(notifier = %notifier.name(), "added notifier");
        notifiers.push(notifier);
    }

    /// Number of registered notifiers.
    #[must_use]
    pub fn notifier_count(&self) -> usize {
        self.notifiers.read().len()
    }

    /// Evaluate one validated snapshot against every resource kind.
    ///
    /// Kinds are independent: a disabled or suppressed cpu check never
    /// stops the memory and disk checks. Fired events are already handed
    /// off to the notifiers when this returns; delivery continues on
    /// detached tasks.
    pub async fn evaluate_snapshot(
        &self,
        server: &Server,
        snapshot: &MetricSnapshot,
        rules: &[AlertRule],
        assigned: &[AssignedRecipient],
    ) -> EvaluationReport {
        let mut report = EvaluationReport::default();

        for metric in MetricKind::ALL {
            report.kinds_checked += 1;
            let kind = AlertKind::from(metric);

            // None means the kind is disabled for this server
            let Some(threshold) = self.thresholds.effective(&server.id, metric) else {
                continue;
            };

            let observed = snapshot.observed(metric);
            if observed < threshold {
                continue;
            }

            if !self.cooldowns.check_and_set(&server.id, kind).is_fire() {
                report.suppressed.push(kind);
                continue;
            }

            let recipients = resolve_recipients(server, kind, rules, assigned);
            let event = AlertEvent {
                server_id: server.id.clone(),
                kind,
                value: observed,
                threshold,
                recipients,
                snapshot: Some(snapshot.clone()),
                fired_at: Utc::now(),
            };

            info!(
                server_id = %event.server_id,
                kind = %kind,
                value = observed,
                threshold = threshold,
                recipients = event.recipients.len(),
                "alert fired"
            );

            self.dispatch(&event);
            report.fired.push(event);
        }

        debug!(
            server_id = %server.id,
            kinds_checked = report.kinds_checked,
            fired = report.fired.len(),
            suppressed = report.suppressed.len(),
            "snapshot evaluated"
        );

        report
    }

    /// Evaluate an overdue server as an `offline` alert.
    ///
    /// `silent_for` is how long the server has been quiet, `allowed` the
    /// silence its report interval permits. The caller has already decided
    /// the server is overdue; this only runs the cooldown and dispatch.
    pub async fn evaluate_offline(
        &self,
        server: &Server,
        silent_for: Duration,
        allowed: Duration,
        rules: &[AlertRule],
        assigned: &[AssignedRecipient],
    ) -> Option<AlertEvent> {
        if !self
            .cooldowns
            .check_and_set(&server.id, AlertKind::Offline)
            .is_fire()
        {
            return None;
        }

        let recipients = resolve_recipients(server, AlertKind::Offline, rules, assigned);
        let event = AlertEvent {
            server_id: server.id.clone(),
            kind: AlertKind::Offline,
            value: silent_for.as_secs() as f64,
            threshold: allowed.as_secs() as f64,
            recipients,
            snapshot: None,
            fired_at: Utc::now(),
        };

        info!(
            server_id = %event.server_id,
            kind = %AlertKind::Offline,
            silent_secs = event.value,
            allowed_secs = event.threshold,
            recipients = event.recipients.len(),
            "alert fired"
        );

        self.dispatch(&event);
        Some(event)
    }

    /// Hands one fired event to every enabled notifier on detached tasks.
    ///
    /// Runs with no locks held: the notifier list is copied out of its
    /// guard before any task is spawned. Failures and timeouts are logged
    /// and never retried; the cooldown update stands either way.
    fn dispatch(&self, event: &AlertEvent) {
        if event.recipients.is_empty() {
            info!(
                server_id = %event.server_id,
                kind = %event.kind,
                "no recipients resolved, dispatch skipped"
            );
            return;
        }

        let notifiers: Vec<Arc<dyn Notifier>> = self
            .notifiers
            .read()
            .iter()
            .filter(|n| n.is_enabled())
            .cloned()
            .collect();

        let timeout = self.config.notify_timeout;
        for notifier in notifiers {
            let event = event.clone();
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, notifier.notify(&event)).await {
                    Ok(Ok(())) => {
                        info!(
                            notifier = %notifier.name(),
                            server_id = %event.server_id,
                            kind = %event.kind,
                            "alert dispatched"
                        );
                    }
                    Ok(Err(e)) => {
                        warn!(notifier = %notifier.name(), error = %e, "notification failed");
                    }
                    Err(_) => {
                        let e = AlertError::NotificationTimeout {
                            notifier: notifier.name().to_string(),
                            timeout_secs: timeout.as_secs(),
                        };
                        warn!(error = %e, "notification dropped");
                    }
                }
            });
        }
    }
}

impl Clone for AlertEvaluator {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            thresholds: self.thresholds.clone(),
            cooldowns: self.cooldowns.clone(),
            notifiers: Arc::clone(&self.notifiers),
        }
    }
}
