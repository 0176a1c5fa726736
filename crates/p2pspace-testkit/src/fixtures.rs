//! Test fixtures: spaces, members, and event chains.
//!
//! Common setup shared by the integration tests across the workspace.

use std::sync::atomic::{AtomicI64, Ordering};

use serde_json::json;

use p2pspace_core::{
    event::kind, space_scope, Clock, Event, EventBuilder, Identity, Invite, InviteBuilder,
    InviteConstraints, InviteIssuerCert, SpaceGenesis, GOVERNANCE_ROOM,
};

/// A controllable clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn at(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// A Space under test: root identity plus genesis record.
pub struct TestSpace {
    pub root: Identity,
    pub genesis: SpaceGenesis,
    pub space_id: String,
}

impl TestSpace {
    /// Create a Space named "test" rooted at a fresh identity.
    pub fn new(now_ms: i64) -> Self {
        let root = Identity::generate();
        let genesis = SpaceGenesis::create(root.principal(), now_ms, Some("test".into()));
        let space_id = genesis.space_id.clone();
        Self { root, genesis, space_id }
    }

    /// Issue an invite directly from the Space Root with the given scope
    /// actions on top of the implicit read scope.
    pub fn root_invite(&mut self, now_ms: i64, actions: &[&str]) -> Invite {
        self.root_invite_with(now_ms, actions, None)
    }

    /// Same, with constraints attached.
    pub fn root_invite_with(
        &mut self,
        now_ms: i64,
        actions: &[&str],
        constraints: Option<InviteConstraints>,
    ) -> Invite {
        let space_id = self.space_id.clone();
        let delegation = self.root.ensure_delegation_for_space(&space_id, now_ms).clone();
        let mut builder = InviteBuilder::new(&space_id);
        for action in actions {
            builder = builder.scope(space_scope(&space_id, action));
        }
        if let Some(c) = constraints {
            builder = builder.constraints(c);
        }
        builder.issue(self.root.device(), &delegation, now_ms).unwrap()
    }

    /// Sign an issuer certificate for another principal.
    pub fn issuer_cert(
        &self,
        issuer: &Identity,
        now_ms: i64,
        ttl_ms: i64,
        allowed_actions: &[&str],
    ) -> InviteIssuerCert {
        InviteIssuerCert::issue(
            self.root.principal(),
            issuer.principal_id(),
            issuer.principal().public_spki_b64(),
            now_ms - 1_000,
            now_ms + ttl_ms,
            allowed_actions
                .iter()
                .map(|a| space_scope(&self.space_id, a))
                .collect(),
        )
    }

    /// Author a governance event as the Space Root.
    pub fn governance_event(&mut self, event_kind: &str, body: serde_json::Value, ts: i64) -> Event {
        let space_id = self.space_id.clone();
        let delegation = self.root.ensure_delegation_for_space(&space_id, ts).clone();
        EventBuilder::new(&space_id, GOVERNANCE_ROOM, event_kind)
            .ts(ts)
            .body(body)
            .sign(self.root.device(), &delegation)
            .unwrap()
    }

    /// Ban a principal.
    pub fn ban(&mut self, principal_id: &str, ts: i64) -> Event {
        self.governance_event(kind::MEMBER_BAN, json!({ "principal_id": principal_id }), ts)
    }
}

/// A joining participant under test.
pub struct TestMember {
    pub identity: Identity,
}

impl TestMember {
    pub fn new() -> Self {
        Self {
            identity: Identity::generate(),
        }
    }

    pub fn principal_id(&self) -> String {
        self.identity.principal_id()
    }

    /// Author a `MEMBER_JOIN` redeeming the invite.
    pub fn join(&mut self, space_id: &str, invite: &Invite, ts: i64) -> Event {
        self.join_with_nonce(space_id, invite, ts, None)
    }

    /// Join with an optional proof-of-work nonce.
    pub fn join_with_nonce(
        &mut self,
        space_id: &str,
        invite: &Invite,
        ts: i64,
        pow_nonce: Option<String>,
    ) -> Event {
        let mut body = json!({
            "principal_id": self.identity.principal_id(),
            "principal_pub": self.identity.principal().public_spki_b64(),
            "invite": invite,
        });
        if let Some(nonce) = pow_nonce {
            body["pow_nonce"] = json!(nonce);
        }
        self.event(space_id, GOVERNANCE_ROOM, kind::MEMBER_JOIN, body, vec![], ts)
    }

    /// Author a `MSG_POST`.
    pub fn post(
        &mut self,
        space_id: &str,
        room_id: &str,
        text: &str,
        prev: Vec<String>,
        ts: i64,
    ) -> Event {
        self.event(space_id, room_id, kind::MSG_POST, json!({ "text": text }), prev, ts)
    }

    /// Author an arbitrary event.
    pub fn event(
        &mut self,
        space_id: &str,
        room_id: &str,
        event_kind: &str,
        body: serde_json::Value,
        prev: Vec<String>,
        ts: i64,
    ) -> Event {
        let delegation = self.identity.ensure_delegation_for_space(space_id, ts).clone();
        EventBuilder::new(space_id, room_id, event_kind)
            .ts(ts)
            .prev(prev)
            .body(body)
            .sign(self.identity.device(), &delegation)
            .unwrap()
    }

    /// Author a chain of `count` posts, each naming the previous one.
    pub fn post_chain(
        &mut self,
        space_id: &str,
        room_id: &str,
        count: usize,
        start_ts: i64,
    ) -> Vec<Event> {
        let mut chain: Vec<Event> = Vec::with_capacity(count);
        for i in 0..count {
            let prev = chain.last().map(|e| vec![e.event_id.clone()]).unwrap_or_default();
            chain.push(self.post(space_id, room_id, &format!("message {i}"), prev, start_ts + i as i64));
        }
        chain
    }
}

impl Default for TestMember {
    fn default() -> Self {
        Self::new()
    }
}
