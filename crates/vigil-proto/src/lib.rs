//! # vigil-proto
//!
//! Shared types for the Vigil fleet monitoring core: server identifiers,
//! metric snapshots pushed by agents, alert kinds, and snapshot validation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod snapshot;
pub mod types;
pub mod validation;

pub use error::ProtoError;
pub use snapshot::{
    ContainerInfo, ContainerSummary, CpuUsage, DiskUsage, MemoryUsage, MetricSnapshot,
};
pub use types::{AlertKind, MetricKind, ServerId};
pub use validation::{ValidationError, ValidationResult};
