//! Persistent entity types for the Vigil monitoring core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use vigil_proto::{AlertKind, MetricKind, ServerId};

/// Default agent reporting cadence in seconds.
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 5;

/// Default global threshold applied to cpu, memory, and disk on first run.
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 90.0;

/// A registered server in the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Agent-chosen identifier.
    pub id: ServerId,
    /// Opaque ingest token; rotated on every re-registration.
    pub token: String,
    /// Optional group label for group-scoped alert rules.
    #[serde(default)]
    pub group: Option<String>,
    /// Expected seconds between agent reports.
    pub report_interval_secs: u64,
    /// First registration time.
    pub registered_at: DateTime<Utc>,
    /// Last accepted ingest. Equals `registered_at` until the first report.
    pub last_seen: DateTime<Utc>,
}

/// Fleet-wide default thresholds, a persistent singleton.
///
/// Values are percentages; a value of zero (or below) disables that alert
/// kind globally. Per-server overrides take precedence, see
/// [`ServerThreshold`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalAlertConfig {
    /// Default CPU threshold.
    pub cpu_percent: f64,
    /// Default memory threshold.
    pub memory_percent: f64,
    /// Default disk threshold.
    pub disk_percent: f64,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl GlobalAlertConfig {
    /// The raw configured value for a metric kind.
    #[must_use]
    pub const fn value_for(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Cpu => self.cpu_percent,
            MetricKind::Memory => self.memory_percent,
            MetricKind::Disk => self.disk_percent,
        }
    }
}

impl Default for GlobalAlertConfig {
    fn default() -> Self {
        Self {
            cpu_percent: DEFAULT_THRESHOLD_PERCENT,
            memory_percent: DEFAULT_THRESHOLD_PERCENT,
            disk_percent: DEFAULT_THRESHOLD_PERCENT,
            updated_at: Utc::now(),
        }
    }
}

/// Per-server threshold overrides.
///
/// Each field is independent: `Some(v)` overrides the global default for
/// that kind (`Some(0.0)` disables it outright), `None` falls through to
/// the global value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerThreshold {
    /// The server these overrides apply to.
    pub server_id: ServerId,
    /// CPU override.
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    /// Memory override.
    #[serde(default)]
    pub memory_percent: Option<f64>,
    /// Disk override.
    #[serde(default)]
    pub disk_percent: Option<f64>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl ServerThreshold {
    /// The raw override for a metric kind, if one is set.
    #[must_use]
    pub const fn value_for(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Cpu => self.cpu_percent,
            MetricKind::Memory => self.memory_percent,
            MetricKind::Disk => self.disk_percent,
        }
    }

    /// True when no field overrides anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cpu_percent.is_none() && self.memory_percent.is_none() && self.disk_percent.is_none()
    }
}

/// Scope of an alert rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    /// Applies to every server.
    Global,
    /// Applies to the single server named by the rule's target.
    Server,
    /// Applies to every server whose group matches the rule's target.
    Group,
}

impl RuleScope {
    /// String form used in logs and wire payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Server => "server",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scoped recipient rule: who gets mailed when a kind of alert fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Rule identifier (UUID).
    pub id: String,
    /// The alert kind this rule subscribes to.
    pub kind: AlertKind,
    /// Where the rule applies.
    pub scope: RuleScope,
    /// Server id or group name for the narrow scopes; absent for global.
    #[serde(default)]
    pub target: Option<String>,
    /// Recipient e-mail addresses.
    pub emails: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl AlertRule {
    /// Whether this rule applies to the given server.
    ///
    /// Global rules always apply; server-scoped rules match on the server
    /// id; group-scoped rules match only when the server has a group equal
    /// to the rule's target.
    #[must_use]
    pub fn applies_to(&self, server: &Server) -> bool {
        match self.scope {
            RuleScope::Global => true,
            RuleScope::Server => self.target.as_deref() == Some(server.id.as_str()),
            RuleScope::Group => match (&self.target, &server.group) {
                (Some(target), Some(group)) => target == group,
                _ => false,
            },
        }
    }
}

/// A user who can be assigned to servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier (UUID).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unique e-mail address.
    pub email: String,
    /// Legacy account-wide alerting preference. Kept as data; recipient
    /// resolution consults only the per-assignment flag.
    #[serde(default)]
    pub receive_alerts: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Links a user to a server they look after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserServerAssignment {
    /// The assigned user.
    pub user_id: String,
    /// The server they are assigned to.
    pub server_id: ServerId,
    /// Whether this assignment subscribes the user to the server's alerts.
    pub receive_alerts: bool,
}
