//! Core identifier and kind types for the Vigil monitoring core.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtoError;
use crate::validation;

/// Unique identifier for a monitored server.
///
/// Server identifiers are chosen by the agent at registration time and are
/// free-form strings (hostnames, inventory tags), not UUIDs. The shape is
/// constrained by [`validation::validate_server_id`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    /// Parse a `ServerId` from a string, rejecting malformed identifiers.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty, too long, or contains
    /// characters outside the allowed identifier alphabet.
    pub fn parse(s: &str) -> Result<Self, ProtoError> {
        validation::validate_server_id(s)
            .map_err(|e| ProtoError::InvalidServerId(e.to_string()))?;
        Ok(Self(s.to_string()))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ServerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resource metric kinds that carry a numeric threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Total CPU utilization as a percentage.
    Cpu,
    /// Memory in use as a percentage of total.
    Memory,
    /// Disk usage percentage of the monitored filesystem.
    Disk,
}

impl MetricKind {
    /// All resource metric kinds, in evaluation order.
    pub const ALL: [Self; 3] = [Self::Cpu, Self::Memory, Self::Disk];

    /// String form used in rules, logs, and wire payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kinds of alert the core can raise.
///
/// The three resource kinds mirror [`MetricKind`]; `Offline` is raised by
/// the sweeper when a server stops reporting and has no threshold of its
/// own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// CPU utilization above threshold.
    Cpu,
    /// Memory usage above threshold.
    Memory,
    /// Disk usage above threshold.
    Disk,
    /// Server has stopped reporting.
    Offline,
}

impl AlertKind {
    /// All alert kinds.
    pub const ALL: [Self; 4] = [Self::Cpu, Self::Memory, Self::Disk, Self::Offline];

    /// String form used in rules, logs, and wire payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Offline => "offline",
        }
    }

    /// The resource metric behind this kind, if any.
    #[must_use]
    pub const fn metric(&self) -> Option<MetricKind> {
        match self {
            Self::Cpu => Some(MetricKind::Cpu),
            Self::Memory => Some(MetricKind::Memory),
            Self::Disk => Some(MetricKind::Disk),
            Self::Offline => None,
        }
    }
}

impl From<MetricKind> for AlertKind {
    fn from(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Cpu => Self::Cpu,
            MetricKind::Memory => Self::Memory,
            MetricKind::Disk => Self::Disk,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Self::Cpu),
            "memory" => Ok(Self::Memory),
            "disk" => Ok(Self::Disk),
            "offline" => Ok(Self::Offline),
            other => Err(ProtoError::UnknownAlertKind(other.to_string())),
        }
    }
}
