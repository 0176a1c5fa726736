//! Error types for the p2pspace core.

use thiserror::Error;

/// Low-level cryptographic failures.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("invalid SPKI public key: {0}")]
    InvalidSpki(String),

    #[error("invalid signature encoding")]
    InvalidSignatureBytes,

    #[error("signature verification failed")]
    SignatureFailed,
}

/// Verification failures for signed protocol objects.
///
/// Variants correspond to the categorized rejection taxonomy surfaced to
/// embedders; the acceptance pipeline maps these into rejections.
#[derive(Debug, Error)]
pub enum VerifyError {
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

    #[error("limits exceeded: {0}")]
    LimitsExceeded(&'static str),
}

impl From<CryptoError> for VerifyError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::SignatureFailed => VerifyError::SignatureInvalid,
            other => VerifyError::EncodingInvalid(other.to_string()),
        }
    }
}
