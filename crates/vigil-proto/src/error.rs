//! Error types for the vigil-proto crate.

use thiserror::Error;

/// Errors that can occur while handling protocol types.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Failed to encode a value to JSON.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Failed to decode a value from JSON.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// A server identifier did not match the allowed shape.
    #[error("invalid server ID: {0}")]
    InvalidServerId(String),

    /// An alert kind string was not recognized.
    #[error("unknown alert kind: {0}")]
    UnknownAlertKind(String),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),
}
