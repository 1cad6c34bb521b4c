//! # vigil-metrics
//!
//! Bounded in-memory cache of recent metric snapshots, one FIFO buffer per
//! server. Serves the dashboard-facing "recent metrics" reads without
//! touching the durable archive.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;

pub use cache::{RecentCache, DEFAULT_MAX_PER_SERVER};
