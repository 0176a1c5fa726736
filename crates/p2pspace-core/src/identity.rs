//! Local identity: Principal and Device keypairs plus delegation cache.
//!
//! The Principal keypair is the root of a user's identity and is created
//! once. Device keypairs exist per installation and are never exported.
//! Delegations are synthesized lazily per Space and cached until close to
//! expiry.

use std::collections::HashMap;

use crate::delegation::{space_scope, DelegationCert};
use crate::crypto::Keypair;

/// Backdate applied to a fresh delegation's `not_before_ts`.
pub const DELEGATION_BACKDATE_MS: i64 = 10 * 60 * 1000;

/// Lifetime of a fresh delegation.
pub const DELEGATION_TTL_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// A cached delegation is reused only while it outlives this margin.
pub const DELEGATION_REUSE_MARGIN_MS: i64 = 60 * 1000;

/// A local actor: Principal keypair, Device keypair, per-Space delegations.
pub struct Identity {
    principal: Keypair,
    device: Keypair,
    delegations: HashMap<String, DelegationCert>,
}

impl Identity {
    /// Generate a fresh identity with empty delegation cache.
    pub fn generate() -> Self {
        Self {
            principal: Keypair::generate(),
            device: Keypair::generate(),
            delegations: HashMap::new(),
        }
    }

    /// Build from existing keypairs (key import, deterministic tests).
    pub fn from_keypairs(principal: Keypair, device: Keypair) -> Self {
        Self {
            principal,
            device,
            delegations: HashMap::new(),
        }
    }

    pub fn principal_id(&self) -> String {
        self.principal.id()
    }

    pub fn device_id(&self) -> String {
        self.device.id()
    }

    pub fn principal(&self) -> &Keypair {
        &self.principal
    }

    pub fn device(&self) -> &Keypair {
        &self.device
    }

    /// Return a delegation for the given Space, reusing a cached one while
    /// it remains valid for at least [`DELEGATION_REUSE_MARGIN_MS`].
    ///
    /// A fresh delegation is backdated ten minutes, lives thirty days, and
    /// carries the `join`, `post`, and `governance` scopes for the Space.
    pub fn ensure_delegation_for_space(&mut self, space_id: &str, now_ms: i64) -> &DelegationCert {
        let reusable = self
            .delegations
            .get(space_id)
            .map(|d| d.expires_ts >= now_ms + DELEGATION_REUSE_MARGIN_MS)
            .unwrap_or(false);

        if !reusable {
            let cert = DelegationCert::issue(
                &self.principal,
                &self.device,
                now_ms - DELEGATION_BACKDATE_MS,
                now_ms + DELEGATION_TTL_MS,
                vec![
                    space_scope(space_id, "join"),
                    space_scope(space_id, "post"),
                    space_scope(space_id, "governance"),
                ],
            );
            self.delegations.insert(space_id.to_string(), cert);
        }

        self.delegations.get(space_id).expect("just inserted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_derive_from_distinct_keys() {
        let id = Identity::generate();
        assert_ne!(id.principal_id(), id.device_id());
    }

    #[test]
    fn test_delegation_synthesized_and_cached() {
        let mut id = Identity::generate();
        let now = 1_700_000_000_000;

        let sig = id.ensure_delegation_for_space("s", now).sig.clone();
        let again = id.ensure_delegation_for_space("s", now + 1_000);
        assert_eq!(again.sig, sig, "unexpired delegation is reused");
    }

    #[test]
    fn test_delegation_window_and_scopes() {
        let mut id = Identity::generate();
        let now = 1_700_000_000_000;
        let cert = id.ensure_delegation_for_space("s", now).clone();

        assert_eq!(cert.not_before_ts, now - DELEGATION_BACKDATE_MS);
        assert_eq!(cert.expires_ts, now + DELEGATION_TTL_MS);
        for action in ["join", "post", "governance"] {
            assert!(cert.has_scope(&space_scope("s", action)));
        }
        cert.verify(now).expect("fresh delegation verifies");
    }

    #[test]
    fn test_near_expiry_delegation_replaced() {
        let mut id = Identity::generate();
        let now = 1_700_000_000_000;

        let first = id.ensure_delegation_for_space("s", now).clone();
        // Just inside the reuse margin of the first delegation's expiry.
        let later = first.expires_ts - DELEGATION_REUSE_MARGIN_MS + 1;
        let second = id.ensure_delegation_for_space("s", later);
        assert_ne!(second.sig, first.sig, "expiring delegation is replaced");
        assert_eq!(second.expires_ts, later + DELEGATION_TTL_MS);
    }

    #[test]
    fn test_delegations_are_per_space() {
        let mut id = Identity::generate();
        let now = 1_700_000_000_000;
        let a = id.ensure_delegation_for_space("space-a", now).clone();
        let b = id.ensure_delegation_for_space("space-b", now).clone();
        assert_ne!(a.scopes, b.scopes);
        assert_eq!(a.sig, id.ensure_delegation_for_space("space-a", now).sig);
        assert_eq!(b.sig, id.ensure_delegation_for_space("space-b", now).sig);
    }
}
