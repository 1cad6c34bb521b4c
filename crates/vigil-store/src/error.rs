//! Error types for the vigil-store crate.

use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced server is not registered.
    #[error("server not found: {0}")]
    ServerNotFound(String),

    /// The referenced user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// No assignment links the user to the server.
    #[error("user {user_id} is not assigned to server {server_id}")]
    AssignmentNotFound {
        /// The user side of the missing link.
        user_id: String,
        /// The server side of the missing link.
        server_id: String,
    },

    /// The referenced alert rule does not exist.
    #[error("alert rule not found: {0}")]
    RuleNotFound(String),

    /// A user with this e-mail already exists.
    #[error("duplicate user e-mail: {0}")]
    DuplicateEmail(String),

    /// A rule or entity failed validation before being stored.
    #[error("validation error: {0}")]
    Validation(#[from] vigil_proto::ValidationError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
