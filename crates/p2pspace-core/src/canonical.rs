//! Canonical byte encoding for signature inputs.
//!
//! Every signature in the protocol is computed over bytes produced by one
//! rule: an ASCII domain-separator line terminated by `\n`, followed by a
//! concatenation of netstrings (`<decimal-byte-length>":"<bytes>","`).
//! Integers are ASCII decimal with no leading `+` and no leading zeros.
//! Extensible sub-objects (event bodies, invite constraints and bootstrap
//! hints, peer addresses) are serialized with the JSON Canonicalization
//! Scheme (RFC 8785) and embedded as a single netstring.
//!
//! Verifiers recompute the input byte-for-byte from the parsed wire object,
//! so the same object always hashes and signs identically across peers.

use serde::Serialize;

use crate::error::VerifyError;

/// Domain separator line for each signed object type.
pub mod domain {
    pub const DELEGATION: &str = "p2pspace/delegation/v0";
    pub const SPACE_GENESIS: &str = "p2pspace/space-genesis/v0";
    pub const INVITE_ISSUER: &str = "p2pspace/invite-issuer/v0";
    pub const INVITE: &str = "p2pspace/invite/v0";
    pub const EVENT: &str = "p2pspace/event/v0";
    pub const PEER: &str = "p2pspace/peer/v0";
    pub const POW: &str = "p2pspace/pow/v0";
}

/// Serialize a value to JCS (RFC 8785) bytes.
pub fn jcs_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, VerifyError> {
    let s = serde_jcs::to_string(value)
        .map_err(|e| VerifyError::EncodingInvalid(format!("JCS: {e}")))?;
    Ok(s.into_bytes())
}

/// Incremental writer for a signature input.
///
/// The writer starts with the domain-separator line and appends one
/// netstring per field, in the normative field order of the object.
pub struct SigInput {
    buf: Vec<u8>,
}

impl SigInput {
    /// Start a signature input with the given domain separator.
    pub fn new(domain: &str) -> Self {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(domain.as_bytes());
        buf.push(b'\n');
        Self { buf }
    }

    /// Append a UTF-8 string field.
    pub fn str(&mut self, s: &str) -> &mut Self {
        self.bytes(s.as_bytes())
    }

    /// Append an integer field as ASCII decimal.
    pub fn int(&mut self, n: i64) -> &mut Self {
        self.bytes(n.to_string().as_bytes())
    }

    /// Append a count field (list lengths).
    pub fn count(&mut self, n: usize) -> &mut Self {
        self.bytes(n.to_string().as_bytes())
    }

    /// Append a raw byte field.
    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        // Length is the byte length, not the character count.
        self.buf
            .extend_from_slice(bytes.len().to_string().as_bytes());
        self.buf.push(b':');
        self.buf.extend_from_slice(bytes);
        self.buf.push(b',');
        self
    }

    /// Append an extensible sub-object as one netstring of its JCS bytes.
    pub fn jcs<T: Serialize>(&mut self, value: &T) -> Result<&mut Self, VerifyError> {
        let bytes = jcs_bytes(value)?;
        Ok(self.bytes(&bytes))
    }

    /// Finish and return the signature input bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
