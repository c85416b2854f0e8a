//! Error types for Reentry.

use thiserror::Error;

use crate::version::SchemaVersion;

/// Top-level error type for Reentry operations.
#[derive(Debug, Error)]
pub enum ReentryError {
    /// Persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Audio output errors
    #[error("Audio error: {0}")]
    Audio(String),

    /// Rendering/window errors
    #[error("Render error: {0}")]
    Render(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading or writing the persisted game snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Snapshot written by an incompatible schema
    #[error("Incompatible snapshot version: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version this build understands
        expected: SchemaVersion,
        /// Version found in the snapshot
        found: SchemaVersion,
    },

    /// Snapshot content violates a board invariant
    #[error("Snapshot corrupted: {0}")]
    Corrupted(String),
}

/// Result type alias for Reentry operations.
pub type ReentryResult<T> = Result<T, ReentryError>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
