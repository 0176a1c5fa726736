//! Proof-of-work gate for invites.
//!
//! An invite may require joiners to present a nonce such that
//! `sha256("p2pspace/pow/v0\n" || invite_id || 0x00 || joiner_principal_id
//! || 0x00 || nonce)` has a required number of leading zero bits. The hash
//! binds the work to both the invite and the joining principal, so a
//! solution cannot be replayed for another joiner.

use crate::canonical::domain;
use crate::crypto::sha256;
use crate::error::VerifyError;

/// Compute the proof-of-work hash for a candidate nonce.
pub fn pow_hash(invite_id: &str, joiner_principal_id: &str, nonce: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(
        domain::POW.len() + 1 + invite_id.len() + 1 + joiner_principal_id.len() + 1 + nonce.len(),
    );
    data.extend_from_slice(domain::POW.as_bytes());
    data.push(b'\n');
    data.extend_from_slice(invite_id.as_bytes());
    data.push(0x00);
    data.extend_from_slice(joiner_principal_id.as_bytes());
    data.push(0x00);
    data.extend_from_slice(nonce);
    sha256(&data)
}

/// Count leading zero bits of a hash.
pub fn leading_zero_bits(hash: &[u8; 32]) -> u32 {
    let mut bits = 0;
    for byte in hash {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

/// Verify a nonce against the required difficulty.
pub fn verify_pow(
    invite_id: &str,
    joiner_principal_id: &str,
    nonce: &[u8],
    required_bits: u32,
) -> Result<(), VerifyError> {
    let hash = pow_hash(invite_id, joiner_principal_id, nonce);
    if leading_zero_bits(&hash) < required_bits {
        return Err(VerifyError::PowInsufficient);
    }
    Ok(())
}

/// Search for a nonce satisfying the difficulty, up to `max_attempts`.
///
/// Joining clients and tests use this; verifiers only ever call
/// [`verify_pow`].
pub fn solve_pow(
    invite_id: &str,
    joiner_principal_id: &str,
    required_bits: u32,
    max_attempts: u64,
) -> Option<Vec<u8>> {
    for counter in 0..max_attempts {
        let nonce = counter.to_be_bytes();
        let hash = pow_hash(invite_id, joiner_principal_id, &nonce);
        if leading_zero_bits(&hash) >= required_bits {
            return Some(nonce.to_vec());
        }
    }
    None
}
