//! Identifier derivation.
//!
//! Principal, Device, and Space identifiers hash the SPKI DER of the public
//! key; event identifiers hash the signature input bytes. Both use SHA-256
//! rendered as base64url without padding.

use rand::RngCore;

use crate::crypto::{b64url_nopad, sha256};
use crate::error::CryptoError;

/// Derive an `ed25519:`-prefixed identifier from SPKI DER bytes.
pub fn id_from_spki_der(spki_der: &[u8]) -> String {
    format!("ed25519:{}", b64url_nopad(&sha256(spki_der)))
}

/// Derive an identifier from the base64 SPKI string as transported in JSON.
pub fn id_from_spki_b64(spki_b64: &str) -> Result<String, CryptoError> {
    let der = crate::crypto::b64_decode(spki_b64)?;
    Ok(id_from_spki_der(&der))
}

/// Derive an `e:`-prefixed event identifier from signature input bytes.
pub fn event_id_from_sig_input(sig_input: &[u8]) -> String {
    format!("e:{}", b64url_nopad(&sha256(sig_input)))
}

/// Generate a fresh 128-bit random invite identifier.
pub fn new_invite_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    b64url_nopad(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_id_stable_for_same_spki() {
        let kp = Keypair::from_seed(&[0x01; 32]);
        let a = id_from_spki_der(&kp.public_spki_der());
        let b = id_from_spki_der(&kp.public_spki_der());
        assert_eq!(a, b);
        assert!(a.starts_with("ed25519:"));
    }

    #[test]
    fn test_id_from_b64_matches_der() {
        let kp = Keypair::from_seed(&[0x02; 32]);
        let from_der = id_from_spki_der(&kp.public_spki_der());
        let from_b64 = id_from_spki_b64(&kp.public_spki_b64()).unwrap();
        assert_eq!(from_der, from_b64);
    }

    #[test]
    fn test_event_id_prefix() {
        let id = event_id_from_sig_input(b"anything");
        assert!(id.starts_with("e:"));
        // 32 hash bytes render to 43 base64url characters.
        assert_eq!(id.len(), 2 + 43);
    }

    #[test]
    fn test_invite_ids_unique() {
        assert_ne!(new_invite_id(), new_invite_id());
    }
}
