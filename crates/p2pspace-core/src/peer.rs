//! Signed peer presence records.
//!
//! A peer record advertises where a Device can be reached (relay hints,
//! rendezvous strings) for offline bootstrap. Records are signed by the
//! Device and expire; storage and refresh policy belong to the embedder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{domain, SigInput};
use crate::crypto::{verify_b64, Keypair};
use crate::delegation::DelegationCert;
use crate::error::VerifyError;
use crate::ids::id_from_spki_b64;

/// Peer record schema version.
pub const PEER_RECORD_VERSION: i64 = 1;

/// A Device-signed address advertisement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub v: i64,
    pub principal_id: String,
    pub principal_pub: String,
    pub device_id: String,
    pub device_pub: String,
    pub delegation: DelegationCert,
    pub ts: i64,
    pub expires_ts: i64,
    /// Free-form address hints; round-trips through JCS untouched.
    pub addrs: Value,
}

/// A peer record together with its detached signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedPeerRecord {
    #[serde(flatten)]
    pub record: PeerRecord,
    pub sig: String,
}

impl PeerRecord {
    /// Signature input bytes in normative field order.
    pub fn sig_input(&self) -> Result<Vec<u8>, VerifyError> {
        let mut w = SigInput::new(domain::PEER);
        w.int(self.v)
            .str(&self.principal_id)
            .str(&self.principal_pub)
            .str(&self.device_id)
            .str(&self.device_pub)
            .str(&self.delegation.sig)
            .int(self.ts)
            .int(self.expires_ts);
        w.jcs(&self.addrs)?;
        Ok(w.finish())
    }

    /// Sign with the Device key.
    pub fn sign(self, device: &Keypair) -> Result<SignedPeerRecord, VerifyError> {
        let sig = device.sign_b64(&self.sig_input()?);
        Ok(SignedPeerRecord { record: self, sig })
    }
}

impl SignedPeerRecord {
    /// Verify identities, signature, delegation, and expiry at `now_ms`.
    pub fn verify(&self, now_ms: i64) -> Result<(), VerifyError> {
        let r = &self.record;
        if id_from_spki_b64(&r.principal_pub)? != r.principal_id {
            return Err(VerifyError::IdMismatch("peer record principal_id"));
        }
        if id_from_spki_b64(&r.device_pub)? != r.device_id {
            return Err(VerifyError::IdMismatch("peer record device_id"));
        }
        if r.delegation.device_id != r.device_id || r.delegation.principal_id != r.principal_id {
            return Err(VerifyError::IdMismatch("peer record delegation"));
        }
        verify_b64(&r.device_pub, &r.sig_input()?, &self.sig)
            .map_err(|_| VerifyError::SignatureInvalid)?;
        r.delegation.verify(now_ms)?;
        if now_ms > r.expires_ts {
            return Err(VerifyError::EncodingInvalid("peer record expired".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    fn record_for(identity: &mut Identity) -> SignedPeerRecord {
        let delegation = identity.ensure_delegation_for_space("s", NOW).clone();
        PeerRecord {
            v: PEER_RECORD_VERSION,
            principal_id: identity.principal_id(),
            principal_pub: identity.principal().public_spki_b64(),
            device_id: identity.device_id(),
            device_pub: identity.device().public_spki_b64(),
            delegation,
            ts: NOW,
            expires_ts: NOW + 3_600_000,
            addrs: json!({ "relays": ["signal-ws:wss://relay.example#sid=abc123"] }),
        }
        .sign(identity.device())
        .unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let mut id = Identity::generate();
        let signed = record_for(&mut id);
        signed.verify(NOW + 1_000).expect("fresh record verifies");
    }

    #[test]
    fn test_expired_record_rejected() {
        let mut id = Identity::generate();
        let signed = record_for(&mut id);
        assert!(signed.verify(signed.record.expires_ts + 1).is_err());
    }

    #[test]
    fn test_tampered_addrs_rejected() {
        let mut id = Identity::generate();
        let mut signed = record_for(&mut id);
        signed.record.addrs = json!({ "relays": ["signal-ws:wss://evil.example#sid=ff"] });
        assert!(matches!(
            signed.verify(NOW),
            Err(VerifyError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_serde_roundtrip_flattens_record() {
        let mut id = Identity::generate();
        let signed = record_for(&mut id);
        let json = serde_json::to_value(&signed).unwrap();
        // The record fields and the signature live at the same level.
        assert!(json.get("principal_id").is_some());
        assert!(json.get("sig").is_some());
        let back: SignedPeerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, signed);
    }
}
