//! The Node: unified API over identity, store, governance, and sync.
//!
//! A node binds one local identity to one Space. It authors events through
//! the same acceptance pipeline inbound events pass, so a node can never
//! persist something its peers would refuse.

use std::sync::Arc;

use serde_json::{json, Value};

use p2pspace_core::{
    crypto::b64url_nopad, event::kind, pow::solve_pow, space_scope, Clock, Event, EventBuilder,
    Identity, Invite, InviteBuilder, InviteConstraints, InviteIssuerCert, RoomDag, SpaceGenesis,
    GOVERNANCE_ROOM,
};
use p2pspace_governance::{accept_event, Acceptance, GovernanceState, RejectReason};
use p2pspace_store::Store;
use p2pspace_sync::{governance_state, SyncConfig, SyncSession, Transport};

use crate::error::{NodeError, Result};

/// A local participant in one Space.
pub struct Node<S: Store> {
    identity: Identity,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    genesis: SpaceGenesis,
    space_id: String,
}

impl<S: Store> Node<S> {
    /// Found a new Space rooted at this identity's Principal key.
    ///
    /// The founder joins its own governance room through a self-issued
    /// invite, so membership holds for the root like anyone else.
    pub async fn create_space(
        identity: Identity,
        name: Option<String>,
        store: S,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let now = clock.now_ms();
        let genesis = SpaceGenesis::create(identity.principal(), now, name);
        let space_id = genesis.space_id.clone();

        let mut node = Self {
            identity,
            store: Arc::new(store),
            clock,
            genesis,
            space_id,
        };

        let invite = node.issue_invite(&["post", "governance"], None, None)?;
        node.author_join(&invite, None).await?;
        Ok(node)
    }

    /// Join an existing Space by redeeming an invite.
    ///
    /// When the invite demands proof-of-work the solution is computed here,
    /// bounded by `pow_budget` attempts.
    pub async fn join_space(
        identity: Identity,
        invite: &Invite,
        genesis: SpaceGenesis,
        store: S,
        clock: Arc<dyn Clock>,
        pow_budget: u64,
    ) -> Result<Self> {
        let now = clock.now_ms();
        invite.verify(now, Some(&genesis))?;

        let mut node = Self {
            space_id: invite.space_id.clone(),
            identity,
            store: Arc::new(store),
            clock,
            genesis,
        };

        let pow_nonce = match invite.constraints.as_ref().and_then(|c| c.requires_pow.as_ref()) {
            Some(pow) => Some(
                solve_pow(
                    &invite.invite_id,
                    &node.identity.principal_id(),
                    pow.bits,
                    pow_budget,
                )
                .map(|nonce| b64url_nopad(&nonce))
                .ok_or(RejectReason::PowInsufficient)?,
            ),
            None => None,
        };

        node.author_join(invite, pow_nonce).await?;
        Ok(node)
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    pub fn genesis(&self) -> &SpaceGenesis {
        &self.genesis
    }

    pub fn principal_id(&self) -> String {
        self.identity.principal_id()
    }

    /// The principal public key as transported in JSON (base64 SPKI).
    pub fn principal_pub(&self) -> String {
        self.identity.principal().public_spki_b64()
    }

    /// Whether this node holds the Space Root key.
    pub fn is_space_root(&self) -> bool {
        self.identity.principal_id() == self.space_id
    }

    /// Issue an invite for this Space.
    ///
    /// The Space Root issues directly; anyone else must supply the issuer
    /// certificate the root signed for them.
    pub fn issue_invite(
        &mut self,
        actions: &[&str],
        constraints: Option<InviteConstraints>,
        issuer_cert: Option<InviteIssuerCert>,
    ) -> Result<Invite> {
        if issuer_cert.is_none() && !self.is_space_root() {
            return Err(NodeError::NotPermitted(
                "only the space root issues invites without an issuer certificate",
            ));
        }

        let now = self.clock.now_ms();
        let space_id = self.space_id.clone();
        let delegation = self.identity.ensure_delegation_for_space(&space_id, now).clone();

        let mut builder = InviteBuilder::new(&space_id);
        for action in actions {
            builder = builder.scope(space_scope(&space_id, action));
        }
        if let Some(c) = constraints {
            builder = builder.constraints(c);
        }
        if let Some(cert) = issuer_cert {
            builder = builder.via_issuer_cert(cert);
        }
        Ok(builder.issue(self.identity.device(), &delegation, now)?)
    }

    /// Sign an issuer certificate for another principal (root only).
    pub fn issue_invite_issuer_cert(
        &self,
        issuer_principal_id: String,
        issuer_principal_pub: String,
        ttl_ms: i64,
        allowed_actions: &[&str],
    ) -> Result<InviteIssuerCert> {
        if !self.is_space_root() {
            return Err(NodeError::NotPermitted("only the space root signs issuer certificates"));
        }
        let now = self.clock.now_ms();
        Ok(InviteIssuerCert::issue(
            self.identity.principal(),
            issuer_principal_id,
            issuer_principal_pub,
            now,
            now + ttl_ms,
            allowed_actions
                .iter()
                .map(|a| space_scope(&self.space_id, a))
                .collect(),
        ))
    }

    /// Author an event in a room: parents are the current heads, and the
    /// event passes the acceptance pipeline before it is persisted.
    pub async fn author(&mut self, room_id: &str, event_kind: &str, body: Value) -> Result<Event> {
        let now = self.clock.now_ms();
        let prev = self.heads(room_id).await?;
        let space_id = self.space_id.clone();
        let delegation = self.identity.ensure_delegation_for_space(&space_id, now).clone();

        let event = EventBuilder::new(&space_id, room_id, event_kind)
            .ts(now)
            .prev(prev)
            .body(body)
            .sign(self.identity.device(), &delegation)?;

        self.accept(&event).await?;
        Ok(event)
    }

    /// Author a `MSG_POST` in a room.
    pub async fn post(&mut self, room_id: &str, text: &str) -> Result<Event> {
        self.author(room_id, kind::MSG_POST, json!({ "text": text })).await
    }

    /// Run the acceptance pipeline on an event and persist it on success.
    pub async fn accept(&mut self, event: &Event) -> Result<Acceptance> {
        let state = self.governance().await?;
        let verdict = accept_event(event, &state, Some(&self.genesis), self.clock.now_ms())?;
        self.store.insert_event(event).await?;
        Ok(verdict)
    }

    /// Current governance fold of this Space.
    pub async fn governance(&self) -> Result<GovernanceState> {
        Ok(governance_state(self.store.as_ref(), Some(&self.genesis)).await?)
    }

    /// Current DAG heads of a room, sorted ascending.
    pub async fn heads(&self, room_id: &str) -> Result<Vec<String>> {
        Ok(self.room_dag(room_id).await?.heads())
    }

    /// A room's events in deterministic topological order.
    pub async fn ordered_events(&self, room_id: &str) -> Result<Vec<Event>> {
        let dag = self.room_dag(room_id).await?;
        Ok(dag.topo_sort().into_iter().cloned().collect())
    }

    /// Open a sync session for one room over a transport.
    pub fn open_session<T: Transport>(
        &self,
        transport: T,
        room_id: &str,
        config: SyncConfig,
    ) -> SyncSession<S, T> {
        SyncSession::new(
            Arc::clone(&self.store),
            transport,
            Arc::clone(&self.clock),
            self.space_id.clone(),
            room_id,
            Some(self.genesis.clone()),
            config,
        )
    }

    async fn room_dag(&self, room_id: &str) -> Result<RoomDag> {
        let events = self.store.room_events(room_id).await?;
        Ok(RoomDag::from_events(events))
    }

    async fn author_join(&mut self, invite: &Invite, pow_nonce: Option<String>) -> Result<Event> {
        let mut body = json!({
            "principal_id": self.identity.principal_id(),
            "principal_pub": self.identity.principal().public_spki_b64(),
            "invite": invite,
        });
        if let Some(nonce) = pow_nonce {
            body["pow_nonce"] = json!(nonce);
        }
        self.author(GOVERNANCE_ROOM, kind::MEMBER_JOIN, body).await
    }
}
