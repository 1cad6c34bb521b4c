//! Metric snapshot types pushed by monitoring agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtoError;
use crate::types::{MetricKind, ServerId};
use crate::validation::{self, ValidationError};

/// Memory usage in MiB as reported by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Total physical memory.
    pub total: f64,
    /// Memory in use.
    pub used: f64,
    /// Free memory.
    pub free: f64,
    /// Memory used for page cache and buffers.
    pub cache: f64,
}

impl MemoryUsage {
    /// Memory in use as a percentage of total.
    ///
    /// Returns 0 for a non-positive total; validated snapshots always have
    /// a positive total.
    #[must_use]
    pub fn used_percent(&self) -> f64 {
        if self.total > 0.0 {
            self.used / self.total * 100.0
        } else {
            0.0
        }
    }
}

/// CPU utilization percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    /// Utilization across all cores.
    pub total: f64,
    /// Per-core utilization, one entry per core.
    #[serde(default)]
    pub per_core: Vec<f64>,
}

/// Disk usage for the monitored filesystem, sizes in GiB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    /// Total capacity.
    pub total: f64,
    /// Space in use.
    pub used: f64,
    /// Free space.
    pub free: f64,
    /// Space in use as a percentage of capacity.
    pub percent: f64,
}

/// A container visible to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Container name.
    pub name: String,
}

/// Summary of containers running on the server.
///
/// Informational only: carried through storage and alert payloads but
/// never alerted on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// Number of running containers.
    #[serde(default)]
    pub running: u32,
    /// Names of the running containers.
    #[serde(default)]
    pub containers: Vec<ContainerInfo>,
}

/// One resource report from an agent.
///
/// Snapshots are append-only: once accepted they are archived verbatim and
/// mirrored into the recent-metrics cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// The reporting server.
    pub server_id: ServerId,
    /// When the sample was taken.
    pub recorded_at: DateTime<Utc>,
    /// Memory usage.
    pub memory: MemoryUsage,
    /// CPU utilization.
    pub cpu: CpuUsage,
    /// Disk usage.
    pub disk: DiskUsage,
    /// Container summary.
    #[serde(default)]
    pub containers: ContainerSummary,
}

impl MetricSnapshot {
    /// The value compared against thresholds for a resource metric kind.
    ///
    /// CPU reports its total utilization, memory its used percentage, disk
    /// its filesystem percentage.
    #[must_use]
    pub fn observed(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Cpu => self.cpu.total,
            MetricKind::Memory => self.memory.used_percent(),
            MetricKind::Disk => self.disk.percent,
        }
    }

    /// Validate the snapshot against the ingest range rules.
    ///
    /// # Errors
    ///
    /// Returns the first offending field; a failing snapshot must be
    /// rejected as a whole.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_snapshot(self)
    }

    /// Serialize to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encoding(e.to_string()))
    }

    /// Deserialize from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, ProtoError> {
        serde_json::from_str(json).map_err(|e| ProtoError::Decoding(e.to_string()))
    }
}
