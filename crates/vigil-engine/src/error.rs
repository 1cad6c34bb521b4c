//! Error types for the vigil-engine crate.

use thiserror::Error;

use vigil_proto::ValidationError;
use vigil_store::StoreError;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The reporting server is not registered.
    #[error("unknown server: {0}")]
    UnknownServer(String),

    /// The snapshot failed ingest validation and was rejected whole.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(#[from] ValidationError),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
