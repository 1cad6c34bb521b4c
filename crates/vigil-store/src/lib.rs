//! # vigil-store
//!
//! Persistent entities and stores for the Vigil monitoring core: the server
//! registry, alert rules, users and their server assignments, threshold
//! configuration, and the append-only snapshot archive.
//!
//! Registry-style stores keep their working set in memory and snapshot it
//! to a JSON file on every mutation; the snapshot archive appends JSON
//! lines. Callers that share a store across tasks wrap it in a lock.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod entities;
pub mod error;
pub mod json;
pub mod registry;
pub mod rules;
pub mod thresholds;
pub mod users;

pub use archive::{FileSnapshotArchive, MemorySnapshotArchive, SnapshotArchive};
pub use entities::{
    AlertRule, GlobalAlertConfig, RuleScope, Server, ServerThreshold, User,
    UserServerAssignment, DEFAULT_REPORT_INTERVAL_SECS, DEFAULT_THRESHOLD_PERCENT,
};
pub use error::{Result, StoreError};
pub use json::JsonStore;
pub use registry::ServerRegistry;
pub use rules::{NewAlertRule, RuleStore};
pub use thresholds::{AlertConfigStore, ThresholdStore};
pub use users::{AssignedRecipient, UserDirectory};
