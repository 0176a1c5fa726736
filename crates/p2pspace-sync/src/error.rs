//! Error types for the sync module.

use thiserror::Error;

/// Errors that can occur during a sync session.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The underlying byte channel closed.
    #[error("transport closed")]
    TransportClosed,

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A frame could not be encoded or decoded, or broke a size limit.
    #[error("invalid frame: {0}")]
    Frame(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] p2pspace_store::StoreError),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
