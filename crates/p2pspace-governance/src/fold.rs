//! The governance fold.
//!
//! Membership and moderation state is a pure function of the ordered
//! governance-room DAG: replaying the same event set always produces the
//! same `(members, banned)` pair on every peer. All time-dependent checks
//! inside the fold use the event's own timestamp, never the wall clock,
//! to keep the fold deterministic.

use std::collections::BTreeSet;

use p2pspace_core::{
    crypto::b64url_nopad_decode, event::kind, pow::verify_pow, Event, RoomDag, SpaceGenesis,
    VerifyError,
};

use crate::body::{parse_body, MemberJoinBody, MemberModerationBody};

/// Membership and ban state derived from the governance room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GovernanceState {
    members: BTreeSet<String>,
    banned: BTreeSet<String>,
}

impl GovernanceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_member(&self, principal_id: &str) -> bool {
        self.members.contains(principal_id)
    }

    pub fn is_banned(&self, principal_id: &str) -> bool {
        self.banned.contains(principal_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    pub fn banned(&self) -> impl Iterator<Item = &str> {
        self.banned.iter().map(String::as_str)
    }

    /// Fold a governance-room DAG in deterministic topological order.
    pub fn fold_dag(dag: &RoomDag, genesis: Option<&SpaceGenesis>) -> Self {
        let mut state = Self::new();
        for event in dag.topo_sort() {
            state.apply(event, genesis);
        }
        state
    }

    /// Fold an already-ordered slice of governance events.
    pub fn fold<'a, I: IntoIterator<Item = &'a Event>>(
        events: I,
        genesis: Option<&SpaceGenesis>,
    ) -> Self {
        let mut state = Self::new();
        for event in events {
            state.apply(event, genesis);
        }
        state
    }

    /// Apply one governance event. Kinds outside the membership vocabulary
    /// are ignored; invalid joins leave the state untouched.
    pub fn apply(&mut self, event: &Event, genesis: Option<&SpaceGenesis>) {
        match event.kind.as_str() {
            kind::MEMBER_JOIN => {
                if validate_join(event, genesis).is_ok() {
                    self.members.insert(event.author_principal_id.clone());
                }
            }
            kind::MEMBER_BAN => {
                if let Some(body) = parse_body::<MemberModerationBody>(event) {
                    if !body.principal_id.is_empty() {
                        self.banned.insert(body.principal_id);
                    }
                }
            }
            kind::MEMBER_UNBAN => {
                if let Some(body) = parse_body::<MemberModerationBody>(event) {
                    self.banned.remove(&body.principal_id);
                }
            }
            _ => {}
        }
    }
}

/// Validate a `MEMBER_JOIN` event against its embedded invite.
///
/// The invite is verified at the event's timestamp so the outcome is the
/// same on every peer regardless of when the event arrives.
pub fn validate_join(event: &Event, genesis: Option<&SpaceGenesis>) -> Result<(), VerifyError> {
    let body: MemberJoinBody = parse_body(event)
        .ok_or_else(|| VerifyError::EncodingInvalid("malformed MEMBER_JOIN body".into()))?;

    // 1. The join must be for the author itself.
    if body.principal_id != event.author_principal_id {
        return Err(VerifyError::IdMismatch("join body principal_id"));
    }
    if body.principal_pub != event.delegation.principal_pub {
        return Err(VerifyError::IdMismatch("join body principal_pub"));
    }

    // 2. The invite must verify and belong to this space.
    body.invite.verify(event.ts, genesis)?;
    if body.invite.space_id != event.space_id {
        return Err(VerifyError::InviteInvalid(
            "invite is for a different space".into(),
        ));
    }

    // 3. Constraints.
    if let Some(constraints) = &body.invite.constraints {
        if let Some(bound) = &constraints.bound_principal_id {
            if bound != &event.author_principal_id {
                return Err(VerifyError::InviteInvalid(
                    "invite is bound to a different principal".into(),
                ));
            }
        }
        if let Some(pow) = &constraints.requires_pow {
            let nonce_b64 = body
                .pow_nonce
                .as_deref()
                .ok_or(VerifyError::PowInsufficient)?;
            let nonce = b64url_nopad_decode(nonce_b64).map_err(|_| VerifyError::PowInsufficient)?;
            if let Some(pow_expires) = pow.expires_ts {
                if event.ts > pow_expires {
                    return Err(VerifyError::PowInsufficient);
                }
            }
            verify_pow(
                &body.invite.invite_id,
                &event.author_principal_id,
                &nonce,
                pow.bits,
            )?;
        }
    }

    Ok(())
}
