//! Categorized rejection reasons returned by the acceptance pipeline.

use p2pspace_core::VerifyError;
use thiserror::Error;

/// Why an inbound event was rejected.
///
/// Rejections are surfaced to the embedder as structured records; the sync
/// layer drops the offending event, bumps a counter, and continues.
#[derive(Debug, Error)]
pub enum RejectReason {
    #[error("encoding invalid: {0}")]
    EncodingInvalid(String),

    #[error("identifier mismatch: {0}")]
    IdMismatch(&'static str),

    #[error("signature invalid")]
    SignatureInvalid,

    #[error("delegation outside validity window")]
    DelegationWindow,

    #[error("delegation scope missing: {0}")]
    DelegationScopeMissing(String),

    #[error("invite invalid: {0}")]
    InviteInvalid(String),

    #[error("invite expired")]
    InviteExpired,

    #[error("proof-of-work insufficient")]
    PowInsufficient,

    #[error("author is not a member")]
    NotAMember,

    #[error("author is banned")]
    Banned,

    #[error("author is not authorized for this governance kind")]
    NotAuthorized,

    #[error("limits exceeded: {0}")]
    LimitsExceeded(&'static str),
}

impl From<VerifyError> for RejectReason {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::EncodingInvalid(m) => RejectReason::EncodingInvalid(m),
            VerifyError::IdMismatch(f) => RejectReason::IdMismatch(f),
            VerifyError::SignatureInvalid => RejectReason::SignatureInvalid,
            VerifyError::DelegationWindow => RejectReason::DelegationWindow,
            VerifyError::DelegationScopeMissing(s) => RejectReason::DelegationScopeMissing(s),
            VerifyError::InviteInvalid(m) => RejectReason::InviteInvalid(m),
            VerifyError::InviteExpired => RejectReason::InviteExpired,
            VerifyError::PowInsufficient => RejectReason::PowInsufficient,
            VerifyError::LimitsExceeded(f) => RejectReason::LimitsExceeded(f),
        }
    }
}
