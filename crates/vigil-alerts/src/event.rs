//! The alert event handed to notifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vigil_proto::{AlertKind, MetricSnapshot, ServerId};

use crate::recipients::Recipient;

/// A fired alert, carrying everything a notifier needs to build a message.
///
/// For metric alerts `value` and `threshold` are percentages and
/// `snapshot` holds the report that crossed the line. For offline alerts
/// both are seconds (observed silence vs. allowed silence) and there is
/// no snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// The server the alert concerns.
    pub server_id: ServerId,
    /// What kind of alert fired.
    pub kind: AlertKind,
    /// The observed value that crossed the threshold.
    pub value: f64,
    /// The effective threshold that was crossed.
    pub threshold: f64,
    /// The resolved recipient set.
    pub recipients: Vec<Recipient>,
    /// The snapshot that triggered the alert, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<MetricSnapshot>,
    /// When the fire decision was made.
    pub fired_at: DateTime<Utc>,
}

impl AlertEvent {
    /// The recipient addresses, in resolution order.
    #[must_use]
    pub fn emails(&self) -> Vec<&str> {
        self.recipients.iter().map(|r| r.email.as_str()).collect()
    }

    /// One-line description for logs and plain-text notifications.
    #[must_use]
    pub fn summary(&self) -> String {
        match self.kind {
            AlertKind::Offline => format!(
                "{} offline: silent for {:.0}s (allowed {:.0}s)",
                self.server_id, self.value, self.threshold
            ),
            _ => format!(
                "{} {} at {:.1}% (threshold {:.1}%)",
                self.server_id, self.kind, self.value, self.threshold
            ),
        }
    }
}
