//! Device delegation certificates.
//!
//! A Principal authorizes a Device by signing a `DelegationCert` that binds
//! the device key to the principal key for a validity window and a set of
//! scopes. Scopes are device-local restrictions of the form
//! `space:<space_id>:{join,post,governance}` or `dm:{read,post}`; they never
//! grant anything the principal itself lacks.

use serde::{Deserialize, Serialize};

use crate::canonical::{domain, SigInput};
use crate::crypto::{verify_b64, Keypair};
use crate::error::VerifyError;
use crate::ids::id_from_spki_b64;

/// Delegation schema version.
pub const DELEGATION_VERSION: i64 = 1;

/// Clock skew tolerated on either side of a validity window.
pub const CLOCK_SKEW_MS: i64 = 10 * 60 * 1000;

/// Build a space-scoped delegation scope string.
pub fn space_scope(space_id: &str, action: &str) -> String {
    format!("space:{space_id}:{action}")
}

/// A Principal-signed certificate authorizing a Device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationCert {
    pub v: i64,
    pub principal_id: String,
    pub principal_pub: String,
    pub device_id: String,
    pub device_pub: String,
    pub not_before_ts: i64,
    pub expires_ts: i64,
    pub scopes: Vec<String>,
    pub sig: String,
}

impl DelegationCert {
    /// Issue a delegation from `principal` to `device`.
    pub fn issue(
        principal: &Keypair,
        device: &Keypair,
        not_before_ts: i64,
        expires_ts: i64,
        scopes: Vec<String>,
    ) -> Self {
        let mut cert = Self {
            v: DELEGATION_VERSION,
            principal_id: principal.id(),
            principal_pub: principal.public_spki_b64(),
            device_id: device.id(),
            device_pub: device.public_spki_b64(),
            not_before_ts,
            expires_ts,
            scopes,
            sig: String::new(),
        };
        cert.sig = principal.sign_b64(&cert.sig_input());
        cert
    }

    /// Signature input bytes in normative field order.
    pub fn sig_input(&self) -> Vec<u8> {
        let mut w = SigInput::new(domain::DELEGATION);
        w.int(self.v)
            .str(&self.principal_id)
            .str(&self.principal_pub)
            .str(&self.device_id)
            .str(&self.device_pub)
            .int(self.not_before_ts)
            .int(self.expires_ts)
            .count(self.scopes.len());
        for scope in &self.scopes {
            w.str(scope);
        }
        w.finish()
    }

    /// Verify the certificate at time `now_ms`.
    pub fn verify(&self, now_ms: i64) -> Result<(), VerifyError> {
        // 1. Identifiers must recompute from the embedded public keys.
        if id_from_spki_b64(&self.principal_pub)? != self.principal_id {
            return Err(VerifyError::IdMismatch("delegation principal_id"));
        }
        if id_from_spki_b64(&self.device_pub)? != self.device_id {
            return Err(VerifyError::IdMismatch("delegation device_id"));
        }

        // 2. Principal signature over the canonical input.
        verify_b64(&self.principal_pub, &self.sig_input(), &self.sig)
            .map_err(|_| VerifyError::SignatureInvalid)?;

        // 3. Validity window with clock-skew tolerance.
        if now_ms < self.not_before_ts - CLOCK_SKEW_MS || now_ms > self.expires_ts + CLOCK_SKEW_MS {
            return Err(VerifyError::DelegationWindow);
        }

        Ok(())
    }

    /// Whether the delegation carries the given scope.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue_for(space_id: &str, not_before: i64, expires: i64) -> (Keypair, Keypair, DelegationCert) {
        let principal = Keypair::from_seed(&[0x11; 32]);
        let device = Keypair::from_seed(&[0x22; 32]);
        let cert = DelegationCert::issue(
            &principal,
            &device,
            not_before,
            expires,
            vec![
                space_scope(space_id, "join"),
                space_scope(space_id, "post"),
            ],
        );
        (principal, device, cert)
    }

    #[test]
    fn test_issue_and_verify() {
        let (_, _, cert) = issue_for("ed25519:AAA", 1_000, 100_000);
        cert.verify(50_000).expect("valid in window");
        assert!(cert.has_scope("space:ed25519:AAA:join"));
        assert!(!cert.has_scope("space:ed25519:AAA:governance"));
    }

    #[test]
    fn test_window_edges_with_skew() {
        let (_, _, cert) = issue_for("s", 1_000_000, 2_000_000);

        // Accepted exactly at the skew-extended edges.
        cert.verify(1_000_000 - CLOCK_SKEW_MS).expect("start edge");
        cert.verify(2_000_000 + CLOCK_SKEW_MS).expect("end edge");

        // Rejected one millisecond beyond.
        assert!(matches!(
            cert.verify(1_000_000 - CLOCK_SKEW_MS - 1),
            Err(VerifyError::DelegationWindow)
        ));
        assert!(matches!(
            cert.verify(2_000_000 + CLOCK_SKEW_MS + 1),
            Err(VerifyError::DelegationWindow)
        ));
    }

    #[test]
    fn test_tampered_scope_fails_signature() {
        let (_, _, mut cert) = issue_for("s", 0, 10_000);
        cert.scopes.push("space:s:governance".into());
        assert!(matches!(cert.verify(5_000), Err(VerifyError::SignatureInvalid)));
    }

    #[test]
    fn test_wrong_device_id_rejected() {
        let (_, _, mut cert) = issue_for("s", 0, 10_000);
        cert.device_id = "ed25519:bogus".into();
        assert!(matches!(cert.verify(5_000), Err(VerifyError::IdMismatch(_))));
    }

    #[test]
    fn test_serde_roundtrip() {
        let (_, _, cert) = issue_for("s", 0, 10_000);
        let json = serde_json::to_string(&cert).unwrap();
        let back: DelegationCert = serde_json::from_str(&json).unwrap();
        assert_eq!(cert, back);
    }
}
