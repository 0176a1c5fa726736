//! Error types for the node facade.

use thiserror::Error;

use p2pspace_core::VerifyError;
use p2pspace_governance::RejectReason;
use p2pspace_store::StoreError;
use p2pspace_sync::SyncError;

/// Failures surfaced by [`crate::Node`] operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// An event was rejected by the acceptance pipeline.
    #[error("event rejected: {0}")]
    Rejected(#[from] RejectReason),

    /// A signed object failed verification.
    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),

    /// Storage backend failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Sync session failure.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The operation needs an authority this node does not hold.
    #[error("not permitted: {0}")]
    NotPermitted(&'static str),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
