//! The notify collaborator boundary.
//!
//! Delivery transports (mail, SMS, chat webhooks) live outside this crate;
//! they plug in through the [`Notifier`] trait. The implementations here
//! cover the built-in needs: structured-log delivery, a sink that drops
//! everything, and an in-memory collector for tests and local inspection.

use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::event::AlertEvent;

/// A delivery channel for fired alerts.
///
/// Implementations must not assume they are called on any particular task:
/// the evaluator invokes them from detached tasks with a deadline already
/// applied, so `notify` should do its own work and return without retrying.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Returns the name of this notifier, used in logs.
    fn name(&self) -> &str;

    /// Delivers one alert event.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AlertError::NotificationFailed`] if delivery fails;
    /// the caller logs and moves on.
    async fn notify(&self, event: &AlertEvent) -> Result<()>;

    /// Returns true if this notifier is enabled.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Notifier that emits each alert as a structured warning log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    /// Create a tracing notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn notify(&self, event: &AlertEvent) -> Result<()> {
        warn!(
            server_id = %event.server_id,
            kind = %event.kind,
            value = event.value,
            threshold = event.threshold,
            recipients = ?event.emails(),
            "{}",
            event.summary()
        );
        Ok(())
    }
}

/// Notifier that silently drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl NoopNotifier {
    /// Create a no-op notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for NoopNotifier {
    fn name(&self) -> &str {
        "noop"
    }

    async fn notify(&self, _event: &AlertEvent) -> Result<()> {
        Ok(())
    }
}

/// Notifier that records every event in memory.
///
/// Intended for tests and local inspection; share it via `Arc` and read
/// back delivered events with [`CollectingNotifier::events`].
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    events: Mutex<Vec<AlertEvent>>,
}

impl CollectingNotifier {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events delivered so far, in delivery order.
    #[must_use]
    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().clone()
    }

    /// Number of events delivered so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    fn name(&self) -> &str {
        "collecting"
    }

    async fn notify(&self, event: &AlertEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
