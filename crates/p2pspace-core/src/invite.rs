//! The invite capability.
//!
//! An invite is a bearer object granting at least read access to a Space.
//! It is signed by the issuer's Device key and carries the full chain a
//! verifier needs: the issuer's delegation and, when the issuer is not the
//! Space Root itself, an Invite Issuer Certificate signed by the root.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{domain, SigInput};
use crate::crypto::{b64url_nopad, b64url_nopad_decode, verify_b64, Keypair};
use crate::delegation::{space_scope, DelegationCert, CLOCK_SKEW_MS};
use crate::error::VerifyError;
use crate::genesis::SpaceGenesis;
use crate::ids::{id_from_spki_b64, new_invite_id};

/// Invite schema version.
pub const INVITE_VERSION: i64 = 1;

/// Default invite lifetime.
pub const INVITE_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Space-Root-signed certificate authorizing another Principal to issue
/// invites with a subset of scopes for a validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteIssuerCert {
    pub v: i64,
    pub space_id: String,
    pub space_root_pub: String,
    pub issuer_principal_id: String,
    pub issuer_principal_pub: String,
    pub not_before_ts: i64,
    pub expires_ts: i64,
    pub allowed_scopes: Vec<String>,
    pub sig: String,
}

impl InviteIssuerCert {
    /// Issue a certificate from the Space Root to `issuer`.
    pub fn issue(
        space_root: &Keypair,
        issuer_principal_id: String,
        issuer_principal_pub: String,
        not_before_ts: i64,
        expires_ts: i64,
        allowed_scopes: Vec<String>,
    ) -> Self {
        let mut cert = Self {
            v: INVITE_VERSION,
            space_id: space_root.id(),
            space_root_pub: space_root.public_spki_b64(),
            issuer_principal_id,
            issuer_principal_pub,
            not_before_ts,
            expires_ts,
            allowed_scopes,
            sig: String::new(),
        };
        cert.sig = space_root.sign_b64(&cert.sig_input());
        cert
    }

    /// Signature input bytes in normative field order.
    pub fn sig_input(&self) -> Vec<u8> {
        let mut w = SigInput::new(domain::INVITE_ISSUER);
        w.int(self.v)
            .str(&self.space_id)
            .str(&self.space_root_pub)
            .str(&self.issuer_principal_id)
            .str(&self.issuer_principal_pub)
            .int(self.not_before_ts)
            .int(self.expires_ts)
            .count(self.allowed_scopes.len());
        for scope in &self.allowed_scopes {
            w.str(scope);
        }
        w.finish()
    }
}

/// Proof-of-work requirement inside invite constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowRequirement {
    /// Required leading zero bits of the proof-of-work hash.
    pub bits: u32,
    /// Latest event timestamp at which a solution is honored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_ts: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Optional restrictions on how an invite may be used.
///
/// Unknown fields are preserved: they participate in the invite signature
/// through the JCS bytes and must round-trip untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InviteConstraints {
    /// Only this Principal may use the invite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_principal_id: Option<String>,
    /// Best-effort use cap; not enforceable without an online issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    /// Joiners must present a proof-of-work nonce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_pow: Option<PowRequirement>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A bearer capability to join a Space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    pub v: i64,
    pub space_id: String,
    pub invite_id: String,
    pub issued_ts: i64,
    pub expires_ts: i64,
    pub issuer_principal_id: String,
    pub issuer_device_id: String,
    pub issuer_device_pub: String,
    pub issuer_delegation: DelegationCert,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_issuer: Option<InviteIssuerCert>,
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<InviteConstraints>,
    /// Free-form peer hints, relays, and rendezvous strings.
    #[serde(default = "empty_object")]
    pub bootstrap: Value,
    pub sig: String,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Builder for issuing invites.
pub struct InviteBuilder {
    space_id: String,
    scopes: Vec<String>,
    ttl_ms: i64,
    invite_issuer: Option<InviteIssuerCert>,
    constraints: Option<InviteConstraints>,
    bootstrap: Value,
}

impl InviteBuilder {
    pub fn new(space_id: impl Into<String>) -> Self {
        Self {
            space_id: space_id.into(),
            scopes: Vec::new(),
            ttl_ms: INVITE_TTL_MS,
            invite_issuer: None,
            constraints: None,
            bootstrap: empty_object(),
        }
    }

    /// Grant additional scopes beyond the always-present read scope.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    /// Attach the issuer certificate for a non-root issuer.
    pub fn via_issuer_cert(mut self, cert: InviteIssuerCert) -> Self {
        self.invite_issuer = Some(cert);
        self
    }

    pub fn constraints(mut self, constraints: InviteConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn bootstrap(mut self, bootstrap: Value) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Sign the invite with the issuer's Device key.
    pub fn issue(
        self,
        device: &Keypair,
        delegation: &DelegationCert,
        now_ms: i64,
    ) -> Result<Invite, VerifyError> {
        let read = space_scope(&self.space_id, "read");
        let mut scopes = self.scopes;
        if !scopes.contains(&read) {
            scopes.insert(0, read);
        }

        let mut invite = Invite {
            v: INVITE_VERSION,
            space_id: self.space_id,
            invite_id: new_invite_id(),
            issued_ts: now_ms,
            expires_ts: now_ms + self.ttl_ms,
            issuer_principal_id: delegation.principal_id.clone(),
            issuer_device_id: device.id(),
            issuer_device_pub: device.public_spki_b64(),
            issuer_delegation: delegation.clone(),
            invite_issuer: self.invite_issuer,
            scopes,
            constraints: self.constraints,
            bootstrap: self.bootstrap,
            sig: String::new(),
        };
        invite.sig = device.sign_b64(&invite.sig_input()?);
        Ok(invite)
    }
}

impl Invite {
    /// Signature input bytes in normative field order.
    ///
    /// The delegation and issuer-certificate chains enter through their
    /// signatures; constraints and bootstrap enter as JCS bytes (`{}` when
    /// absent).
    pub fn sig_input(&self) -> Result<Vec<u8>, VerifyError> {
        let mut w = SigInput::new(domain::INVITE);
        w.int(self.v)
            .str(&self.space_id)
            .str(&self.invite_id)
            .int(self.issued_ts)
            .int(self.expires_ts)
            .str(&self.issuer_principal_id)
            .str(&self.issuer_device_id)
            .str(&self.issuer_device_pub)
            .str(&self.issuer_delegation.sig)
            .str(self.invite_issuer.as_ref().map(|c| c.sig.as_str()).unwrap_or(""));
        match &self.constraints {
            Some(c) => w.jcs(c)?,
            None => w.jcs(&empty_object())?,
        };
        w.jcs(&self.bootstrap)?;
        Ok(w.finish())
    }

    /// Verify the full invite chain at time `now_ms`.
    ///
    /// When the genesis record is available it anchors the `space_id`;
    /// otherwise the derivation checks against the embedded root key still
    /// apply.
    pub fn verify(&self, now_ms: i64, genesis: Option<&SpaceGenesis>) -> Result<(), VerifyError> {
        // 1. Space binding.
        if let Some(genesis) = genesis {
            genesis.verify()?;
            if genesis.space_id != self.space_id {
                return Err(VerifyError::InviteInvalid("space_id does not match genesis".into()));
            }
        }
        if let Some(cert) = &self.invite_issuer {
            if cert.space_id != self.space_id {
                return Err(VerifyError::InviteInvalid(
                    "issuer certificate names a different space".into(),
                ));
            }
            if id_from_spki_b64(&cert.space_root_pub)? != self.space_id {
                return Err(VerifyError::InviteInvalid(
                    "issuer certificate root key does not derive space_id".into(),
                ));
            }
        }

        // 2. Issuer identities recompute from their public keys.
        if id_from_spki_b64(&self.issuer_device_pub)? != self.issuer_device_id {
            return Err(VerifyError::IdMismatch("invite issuer_device_id"));
        }

        // 3. The embedded delegation belongs to the issuer and verifies.
        if self.issuer_delegation.device_id != self.issuer_device_id
            || self.issuer_delegation.principal_id != self.issuer_principal_id
        {
            return Err(VerifyError::InviteInvalid(
                "delegation does not bind the issuer identities".into(),
            ));
        }
        self.issuer_delegation.verify(now_ms)?;

        // 4. Invite lifetime.
        if now_ms > self.expires_ts {
            return Err(VerifyError::InviteExpired);
        }

        // 5. Issuance authority: the Space Root directly, or via certificate.
        match &self.invite_issuer {
            None => {
                if self.issuer_principal_id != self.space_id {
                    return Err(VerifyError::InviteInvalid(
                        "issuer is not the space root and carries no issuer certificate".into(),
                    ));
                }
            }
            Some(cert) => {
                if cert.issuer_principal_id != self.issuer_principal_id {
                    return Err(VerifyError::InviteInvalid(
                        "issuer certificate names a different principal".into(),
                    ));
                }
                if id_from_spki_b64(&cert.issuer_principal_pub)? != cert.issuer_principal_id {
                    return Err(VerifyError::IdMismatch("issuer certificate principal_id"));
                }
                verify_b64(&cert.space_root_pub, &cert.sig_input(), &cert.sig)
                    .map_err(|_| VerifyError::SignatureInvalid)?;
                if now_ms < cert.not_before_ts - CLOCK_SKEW_MS
                    || now_ms > cert.expires_ts + CLOCK_SKEW_MS
                {
                    return Err(VerifyError::InviteInvalid(
                        "issuer certificate outside validity window".into(),
                    ));
                }
                for scope in &self.scopes {
                    if !cert.allowed_scopes.contains(scope) {
                        return Err(VerifyError::InviteInvalid(format!(
                            "scope {scope} is not allowed by the issuer certificate"
                        )));
                    }
                }
            }
        }

        // 6. Invite signature under the issuer device key.
        verify_b64(&self.issuer_device_pub, &self.sig_input()?, &self.sig)
            .map_err(|_| VerifyError::SignatureInvalid)?;

        Ok(())
    }

    /// Encode as a URL fragment: `#invite=<base64url-nopad JSON>`.
    pub fn encode_link(&self) -> Result<String, VerifyError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| VerifyError::EncodingInvalid(e.to_string()))?;
        Ok(format!("#invite={}", b64url_nopad(&json)))
    }

    /// Decode from a URL fragment, with or without the `#invite=` prefix.
    pub fn decode_link(fragment: &str) -> Result<Self, VerifyError> {
        let code = fragment
            .trim_start_matches('#')
            .trim_start_matches("invite=");
        let json = b64url_nopad_decode(code)?;
        serde_json::from_slice(&json).map_err(|e| VerifyError::EncodingInvalid(e.to_string()))
    }
}
