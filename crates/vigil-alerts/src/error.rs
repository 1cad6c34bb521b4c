//! Error types for the vigil-alerts crate.

use thiserror::Error;

/// Errors that can occur in the alerting core.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Notification delivery failed.
    #[error("notification failed: {reason}")]
    NotificationFailed {
        /// The reason the notification failed.
        reason: String,
    },

    /// Notification did not complete within its allotted time.
    #[error("notification via '{notifier}' timed out after {timeout_secs}s")]
    NotificationTimeout {
        /// The notifier that timed out.
        notifier: String,
        /// The timeout that was exceeded.
        timeout_secs: u64,
    },
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
