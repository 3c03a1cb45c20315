//! Result codes for the placement engine.

use thiserror::Error;

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors the engine can return. Caller errors and capacity errors never
/// leave partial state behind.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("no nodes")]
    NoNodes,

    #[error("quorum failed")]
    QuorumFailed,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("allocation failed")]
    AllocFailed,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Strategy-internal errors are promoted to this variant; the engine
    /// never panics or corrupts an index on a strategy failure.
    #[error("internal error: {0}")]
    Internal(String),
}
