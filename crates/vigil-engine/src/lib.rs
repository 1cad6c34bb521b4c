//! # vigil-engine
//!
//! The assembled monitoring core: the [`MonitorEngine`] facade wires the
//! server registry, snapshot archive, recent-metrics cache, threshold
//! configuration, and the alert evaluator into the ingest pipeline and
//! admin surface the transport layer calls, and the offline sweeper task
//! watches for servers that stop reporting.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use vigil_alerts::TracingNotifier;
//! use vigil_engine::{MonitorEngine, SweeperConfig, start_sweeper_task};
//!
//! # #[tokio::main]
//! # async fn main() -> vigil_engine::Result<()> {
//! let engine = MonitorEngine::open(Path::new("/var/lib/vigil"))?;
//! engine.add_notifier(Arc::new(TracingNotifier::new()));
//! let sweeper = start_sweeper_task(engine.clone(), SweeperConfig::default());
//! // ... serve ingest and admin calls over the engine ...
//! sweeper.stop();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod sweeper;

pub use config::{EngineConfig, SweeperConfig};
pub use engine::{IngestReceipt, MonitorEngine, SweepSummary, DEFAULT_RECENT_LIMIT};
pub use error::{EngineError, Result};
pub use sweeper::{start_sweeper_task, SweeperHandle};
