//! # vigil-alerts
//!
//! The alert-evaluation core: effective-threshold resolution with
//! per-server overrides, recipient-set resolution from scoped rules and
//! server assignments, and the per-(server, kind) cooldown state machine
//! that throttles repeated notifications.
//!
//! The [`AlertEvaluator`] ties the pieces together: given a validated
//! snapshot it checks every metric kind against its effective threshold,
//! consults the [`CooldownTracker`], resolves recipients, and hands fired
//! events to a [`Notifier`] on a detached task so ingest never waits on a
//! provider.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cooldown;
pub mod error;
pub mod event;
pub mod evaluator;
pub mod notify;
pub mod recipients;
pub mod thresholds;

pub use cooldown::{CooldownDecision, CooldownTracker};
pub use error::{AlertError, Result};
pub use event::AlertEvent;
pub use evaluator::{AlertEvaluator, EvaluationReport, EvaluatorConfig};
pub use notify::{CollectingNotifier, NoopNotifier, Notifier, TracingNotifier};
pub use recipients::{resolve_recipients, Recipient, RecipientSource};
pub use thresholds::ThresholdResolver;
