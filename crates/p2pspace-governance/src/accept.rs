//! The acceptance pipeline for inbound events.
//!
//! Every event, local or remote, passes through the same gate before it
//! may touch a room log: size caps, full cryptographic validation, and
//! governance authorization. The pipeline is pure; persistence is the
//! caller's final step once a verdict of acceptance is returned.

use p2pspace_core::{event::kind, is_governance_kind, limits, Event, SpaceGenesis, GOVERNANCE_ROOM};

use crate::body::{parse_body, MsgPostBody};
use crate::error::RejectReason;
use crate::fold::{validate_join, GovernanceState};

/// Verdict for an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// The event passed every check.
    Accepted,
    /// The event is valid but its kind is unrecognized; it is stored and
    /// relayed without participating in governance.
    AcceptedUnknownKind,
}

const KNOWN_KINDS: &[&str] = &[
    kind::MSG_POST,
    kind::MSG_EDIT,
    kind::MSG_REDACT,
    kind::REACTION_ADD,
    kind::REACTION_REMOVE,
    kind::PIN_ADD,
    kind::PIN_REMOVE,
    kind::SPACE_POLICY_SET,
    kind::ROLE_DEFINE,
    kind::ROLE_GRANT,
    kind::ROLE_REVOKE,
    kind::MEMBER_BAN,
    kind::MEMBER_UNBAN,
    kind::INVITE_ISSUE,
    kind::INVITE_REVOKE,
    kind::MEMBER_JOIN,
    kind::ROOM_DEFINE,
    kind::ROOM_ARCHIVE,
    kind::DEVICE_REVOKE,
];

/// Run the full acceptance pipeline on one event.
///
/// `state` is the governance fold of the event's Space as currently known;
/// `now_ms` drives the delegation-window and invite-lifetime checks.
pub fn accept_event(
    event: &Event,
    state: &GovernanceState,
    genesis: Option<&SpaceGenesis>,
    now_ms: i64,
) -> Result<Acceptance, RejectReason> {
    // 1. Local-policy size caps before any crypto.
    check_limits(event)?;

    // 2. Cryptographic validation: identifiers, content address, signature,
    //    delegation chain and window, per-kind scope.
    event.verify(now_ms)?;

    // 3. Authorization against the governance state.
    if event.room_id == GOVERNANCE_ROOM {
        match event.kind.as_str() {
            kind::MEMBER_JOIN => {
                validate_join(event, genesis)?;
            }
            k if is_governance_kind(k) => {
                // Baseline: only the Space Root steers governance beyond
                // joins. Role-derived permissions are an extension point.
                if event.author_principal_id != event.space_id {
                    return Err(RejectReason::NotAuthorized);
                }
            }
            _ => {
                // Non-governance kinds in the governance room still require
                // membership.
                check_membership(event, state)?;
            }
        }
    } else {
        check_membership(event, state)?;
    }

    if KNOWN_KINDS.contains(&event.kind.as_str()) {
        Ok(Acceptance::Accepted)
    } else {
        Ok(Acceptance::AcceptedUnknownKind)
    }
}

fn check_membership(event: &Event, state: &GovernanceState) -> Result<(), RejectReason> {
    if !state.is_member(&event.author_principal_id) {
        return Err(RejectReason::NotAMember);
    }
    if state.is_banned(&event.author_principal_id) {
        return Err(RejectReason::Banned);
    }
    Ok(())
}

fn check_limits(event: &Event) -> Result<(), RejectReason> {
    for (field, value) in [
        ("space_id", &event.space_id),
        ("room_id", &event.room_id),
        ("kind", &event.kind),
        ("event_id", &event.event_id),
        ("author_principal_id", &event.author_principal_id),
        ("author_device_id", &event.author_device_id),
    ] {
        if value.len() > limits::MAX_ID_LEN {
            return Err(RejectReason::LimitsExceeded(field));
        }
    }

    if event.author_device_pub.len() > limits::MAX_KEY_LEN
        || event.delegation.principal_pub.len() > limits::MAX_KEY_LEN
        || event.delegation.device_pub.len() > limits::MAX_KEY_LEN
    {
        return Err(RejectReason::LimitsExceeded("public key"));
    }
    if event.sig.len() > limits::MAX_SIG_LEN || event.delegation.sig.len() > limits::MAX_SIG_LEN {
        return Err(RejectReason::LimitsExceeded("signature"));
    }

    if event.prev.len() > limits::MAX_PREV {
        return Err(RejectReason::LimitsExceeded("prev"));
    }
    for parent in &event.prev {
        if parent.len() > limits::MAX_ID_LEN {
            return Err(RejectReason::LimitsExceeded("prev entry"));
        }
    }

    if event.delegation.scopes.len() > limits::MAX_SCOPES {
        return Err(RejectReason::LimitsExceeded("delegation scopes"));
    }

    // The whole serialized event stays under the wire cap, so the ceiling
    // holds for locally authored events too, not only sync-delivered ones.
    let size = serde_json::to_vec(event)
        .map_err(|e| RejectReason::EncodingInvalid(e.to_string()))?
        .len();
    if size > limits::MAX_FRAME_BYTES {
        return Err(RejectReason::LimitsExceeded("event size"));
    }

    if event.kind == kind::MSG_POST {
        let body: MsgPostBody = parse_body(event)
            .ok_or_else(|| RejectReason::EncodingInvalid("malformed MSG_POST body".into()))?;
        if body.text.chars().count() > limits::MAX_TEXT_CHARS {
            return Err(RejectReason::LimitsExceeded("message text"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use p2pspace_core::{space_scope, EventBuilder, Identity, InviteBuilder, RoomDag};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    struct Fixture {
        root: Identity,
        space_id: String,
        genesis: SpaceGenesis,
        member: Identity,
        state: GovernanceState,
    }

    impl Fixture {
        /// A space whose governance room already admitted `member`.
        fn new() -> Self {
            let mut root = Identity::generate();
            let genesis = SpaceGenesis::create(root.principal(), NOW, Some("test".into()));
            let space_id = genesis.space_id.clone();

            let delegation = root.ensure_delegation_for_space(&space_id, NOW).clone();
            let invite = InviteBuilder::new(&space_id)
                .scope(space_scope(&space_id, "post"))
                .issue(root.device(), &delegation, NOW)
                .unwrap();

            let mut member = Identity::generate();
            let member_delegation = member.ensure_delegation_for_space(&space_id, NOW).clone();
            let join = EventBuilder::new(&space_id, GOVERNANCE_ROOM, kind::MEMBER_JOIN)
                .ts(NOW + 1_000)
                .body(json!({
                    "principal_id": member.principal_id(),
                    "principal_pub": member.principal().public_spki_b64(),
                    "invite": invite,
                }))
                .sign(member.device(), &member_delegation)
                .unwrap();

            let dag = RoomDag::from_events([join]);
            let state = GovernanceState::fold_dag(&dag, Some(&genesis));

            Self { root, space_id, genesis, member, state }
        }

        fn member_post(&mut self, text: &str) -> Event {
            let delegation = self
                .member
                .ensure_delegation_for_space(&self.space_id, NOW)
                .clone();
            EventBuilder::new(&self.space_id, "room:general", kind::MSG_POST)
                .ts(NOW + 2_000)
                .body(json!({ "text": text }))
                .sign(self.member.device(), &delegation)
                .unwrap()
        }
    }

    #[test]
    fn test_member_post_accepted() {
        let mut fx = Fixture::new();
        let post = fx.member_post("hello");
        let verdict = accept_event(&post, &fx.state, Some(&fx.genesis), NOW + 3_000).unwrap();
        assert_eq!(verdict, Acceptance::Accepted);
    }

    #[test]
    fn test_acceptance_is_idempotent() {
        let mut fx = Fixture::new();
        let post = fx.member_post("hello");
        let first = accept_event(&post, &fx.state, Some(&fx.genesis), NOW + 3_000).unwrap();
        let second = accept_event(&post, &fx.state, Some(&fx.genesis), NOW + 3_000).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_non_member_post_rejected() {
        let fx = Fixture::new();
        let mut stranger = Identity::generate();
        let delegation = stranger
            .ensure_delegation_for_space(&fx.space_id, NOW)
            .clone();
        let post = EventBuilder::new(&fx.space_id, "room:general", kind::MSG_POST)
            .ts(NOW)
            .body(json!({ "text": "let me in" }))
            .sign(stranger.device(), &delegation)
            .unwrap();

        assert!(matches!(
            accept_event(&post, &fx.state, Some(&fx.genesis), NOW),
            Err(RejectReason::NotAMember)
        ));
    }

    #[test]
    fn test_banned_member_rejected() {
        let mut fx = Fixture::new();
        let member_id = fx.member.principal_id();

        let ban = {
            let delegation = fx
                .root
                .ensure_delegation_for_space(&fx.space_id, NOW)
                .clone();
            EventBuilder::new(&fx.space_id, GOVERNANCE_ROOM, kind::MEMBER_BAN)
                .ts(NOW + 2_500)
                .body(json!({ "principal_id": member_id }))
                .sign(fx.root.device(), &delegation)
                .unwrap()
        };
        fx.state.apply(&ban, Some(&fx.genesis));

        let post = fx.member_post("still here?");
        assert!(matches!(
            accept_event(&post, &fx.state, Some(&fx.genesis), NOW + 3_000),
            Err(RejectReason::Banned)
        ));
    }

    #[test]
    fn test_text_cap_at_2000_chars() {
        let mut fx = Fixture::new();
        let ok = fx.member_post(&"a".repeat(2000));
        accept_event(&ok, &fx.state, Some(&fx.genesis), NOW + 3_000).expect("2000 chars fit");

        let over = fx.member_post(&"a".repeat(2001));
        assert!(matches!(
            accept_event(&over, &fx.state, Some(&fx.genesis), NOW + 3_000),
            Err(RejectReason::LimitsExceeded("message text"))
        ));
    }

    #[test]
    fn test_governance_kind_root_only() {
        let mut fx = Fixture::new();
        let delegation = fx
            .member
            .ensure_delegation_for_space(&fx.space_id, NOW)
            .clone();
        let rogue_ban = EventBuilder::new(&fx.space_id, GOVERNANCE_ROOM, kind::MEMBER_BAN)
            .ts(NOW + 2_000)
            .body(json!({ "principal_id": "ed25519:victim" }))
            .sign(fx.member.device(), &delegation)
            .unwrap();

        assert!(matches!(
            accept_event(&rogue_ban, &fx.state, Some(&fx.genesis), NOW + 3_000),
            Err(RejectReason::NotAuthorized)
        ));
    }

    #[test]
    fn test_root_ban_accepted() {
        let mut fx = Fixture::new();
        let delegation = fx
            .root
            .ensure_delegation_for_space(&fx.space_id, NOW)
            .clone();
        let ban = EventBuilder::new(&fx.space_id, GOVERNANCE_ROOM, kind::MEMBER_BAN)
            .ts(NOW + 2_000)
            .body(json!({ "principal_id": fx.member.principal_id() }))
            .sign(fx.root.device(), &delegation)
            .unwrap();

        let verdict = accept_event(&ban, &fx.state, Some(&fx.genesis), NOW + 3_000).unwrap();
        assert_eq!(verdict, Acceptance::Accepted);
    }

    #[test]
    fn test_unknown_kind_accepted_and_flagged() {
        let mut fx = Fixture::new();
        let delegation = fx
            .member
            .ensure_delegation_for_space(&fx.space_id, NOW)
            .clone();
        let exotic = EventBuilder::new(&fx.space_id, "room:general", "HOLOGRAM_SPIN")
            .ts(NOW + 2_000)
            .body(json!({ "axis": "y" }))
            .sign(fx.member.device(), &delegation)
            .unwrap();

        let verdict = accept_event(&exotic, &fx.state, Some(&fx.genesis), NOW + 3_000).unwrap();
        assert_eq!(verdict, Acceptance::AcceptedUnknownKind);
    }

    #[test]
    fn test_tampered_event_rejected() {
        let mut fx = Fixture::new();
        let mut post = fx.member_post("hello");
        post.body = json!({ "text": "hijacked" });

        assert!(matches!(
            accept_event(&post, &fx.state, Some(&fx.genesis), NOW + 3_000),
            Err(RejectReason::IdMismatch(_))
        ));
    }

    #[test]
    fn test_total_event_size_cap_enforced() {
        let mut fx = Fixture::new();
        let delegation = fx
            .member
            .ensure_delegation_for_space(&fx.space_id, NOW)
            .clone();
        // MSG_EDIT has no per-field text cap, so only the whole-event
        // ceiling can stop an oversized body.
        let oversized = EventBuilder::new(&fx.space_id, "room:general", kind::MSG_EDIT)
            .ts(NOW + 2_000)
            .body(json!({
                "target": "e:abc",
                "text": "x".repeat(limits::MAX_FRAME_BYTES),
            }))
            .sign(fx.member.device(), &delegation)
            .unwrap();

        assert!(matches!(
            accept_event(&oversized, &fx.state, Some(&fx.genesis), NOW + 3_000),
            Err(RejectReason::LimitsExceeded("event size"))
        ));
    }

    #[test]
    fn test_prev_cap_enforced() {
        let mut fx = Fixture::new();
        let mut post = fx.member_post("hello");
        post.prev = (0..65).map(|i| format!("e:{i}")).collect();

        assert!(matches!(
            accept_event(&post, &fx.state, Some(&fx.genesis), NOW + 3_000),
            Err(RejectReason::LimitsExceeded("prev"))
        ));
    }
}
