//! Events: immutable, signed, content-addressed records with DAG parents.
//!
//! An event is authored by a Device on behalf of a Principal, carries its
//! delegation inline, and derives its identifier from the signature input.
//! Edits and redactions are new events referencing the target by id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{domain, SigInput};
use crate::crypto::{verify_b64, Keypair};
use crate::delegation::{space_scope, DelegationCert};
use crate::error::VerifyError;
use crate::ids::{event_id_from_sig_input, id_from_spki_b64};

/// Event schema version.
pub const EVENT_VERSION: i64 = 1;

/// Authors include at most this many parent heads in `prev`.
pub const MAX_PARENTS: usize = 8;

/// The well-known room carrying membership and moderation events.
pub const GOVERNANCE_ROOM: &str = "governance";

/// Event kind strings.
///
/// Kinds are open-ended: valid events with unrecognized kinds are stored
/// and relayed, so the wire type is a string rather than a closed enum.
pub mod kind {
    pub const MSG_POST: &str = "MSG_POST";
    pub const MSG_EDIT: &str = "MSG_EDIT";
    pub const MSG_REDACT: &str = "MSG_REDACT";
    pub const REACTION_ADD: &str = "REACTION_ADD";
    pub const REACTION_REMOVE: &str = "REACTION_REMOVE";
    pub const PIN_ADD: &str = "PIN_ADD";
    pub const PIN_REMOVE: &str = "PIN_REMOVE";

    pub const SPACE_POLICY_SET: &str = "SPACE_POLICY_SET";
    pub const ROLE_DEFINE: &str = "ROLE_DEFINE";
    pub const ROLE_GRANT: &str = "ROLE_GRANT";
    pub const ROLE_REVOKE: &str = "ROLE_REVOKE";
    pub const MEMBER_BAN: &str = "MEMBER_BAN";
    pub const MEMBER_UNBAN: &str = "MEMBER_UNBAN";
    pub const INVITE_ISSUE: &str = "INVITE_ISSUE";
    pub const INVITE_REVOKE: &str = "INVITE_REVOKE";
    pub const MEMBER_JOIN: &str = "MEMBER_JOIN";
    pub const ROOM_DEFINE: &str = "ROOM_DEFINE";
    pub const ROOM_ARCHIVE: &str = "ROOM_ARCHIVE";
    pub const DEVICE_REVOKE: &str = "DEVICE_REVOKE";
}

/// The delegation scope action an author needs for a given event kind.
///
/// `MEMBER_JOIN` needs `join`; message, reaction, and pin kinds need
/// `post`; the remaining governance kinds need `governance`. Unknown kinds
/// default to `post`.
pub fn required_scope_action(event_kind: &str) -> &'static str {
    match event_kind {
        kind::MEMBER_JOIN => "join",
        kind::SPACE_POLICY_SET
        | kind::ROLE_DEFINE
        | kind::ROLE_GRANT
        | kind::ROLE_REVOKE
        | kind::MEMBER_BAN
        | kind::MEMBER_UNBAN
        | kind::INVITE_ISSUE
        | kind::INVITE_REVOKE
        | kind::ROOM_DEFINE
        | kind::ROOM_ARCHIVE
        | kind::DEVICE_REVOKE => "governance",
        _ => "post",
    }
}

/// Whether the kind belongs to the governance vocabulary.
pub fn is_governance_kind(event_kind: &str) -> bool {
    event_kind == kind::MEMBER_JOIN || required_scope_action(event_kind) == "governance"
}

/// An immutable signed event in a Room DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub v: i64,
    pub space_id: String,
    pub room_id: String,
    pub event_id: String,
    pub author_principal_id: String,
    pub author_device_id: String,
    pub author_device_pub: String,
    pub delegation: DelegationCert,
    pub ts: i64,
    pub kind: String,
    pub prev: Vec<String>,
    pub body: Value,
    pub sig: String,
}

impl Event {
    /// Signature input bytes in normative field order.
    pub fn sig_input(&self) -> Result<Vec<u8>, VerifyError> {
        let mut w = SigInput::new(domain::EVENT);
        w.int(self.v)
            .str(&self.space_id)
            .str(&self.room_id)
            .str(&self.author_principal_id)
            .str(&self.author_device_id)
            .str(&self.author_device_pub)
            .str(&self.delegation.sig)
            .int(self.ts)
            .str(&self.kind)
            .count(self.prev.len());
        for parent in &self.prev {
            w.str(parent);
        }
        w.jcs(&self.body)?;
        Ok(w.finish())
    }

    /// Verify every cryptographic invariant of the event at `now_ms`.
    pub fn verify(&self, now_ms: i64) -> Result<(), VerifyError> {
        // 1. Version.
        if self.v != EVENT_VERSION {
            return Err(VerifyError::EncodingInvalid(format!(
                "unsupported event version {}",
                self.v
            )));
        }

        // 2. Author identities recompute and the delegation binds them.
        if id_from_spki_b64(&self.author_device_pub)? != self.author_device_id {
            return Err(VerifyError::IdMismatch("event author_device_id"));
        }
        if self.delegation.device_id != self.author_device_id {
            return Err(VerifyError::IdMismatch("event delegation device_id"));
        }
        if self.delegation.principal_id != self.author_principal_id {
            return Err(VerifyError::IdMismatch("event delegation principal_id"));
        }

        // 3. Content address and signature over the same input bytes.
        let sig_input = self.sig_input()?;
        if event_id_from_sig_input(&sig_input) != self.event_id {
            return Err(VerifyError::IdMismatch("event_id"));
        }
        verify_b64(&self.author_device_pub, &sig_input, &self.sig)
            .map_err(|_| VerifyError::SignatureInvalid)?;

        // 4. Delegation chain, window included.
        self.delegation.verify(now_ms)?;

        // 5. The delegation must carry the scope this kind demands.
        let scope = space_scope(&self.space_id, required_scope_action(&self.kind));
        if !self.delegation.has_scope(&scope) {
            return Err(VerifyError::DelegationScopeMissing(scope));
        }

        Ok(())
    }
}

/// Builder for authoring events.
pub struct EventBuilder {
    space_id: String,
    room_id: String,
    kind: String,
    ts: i64,
    prev: Vec<String>,
    body: Value,
}

impl EventBuilder {
    pub fn new(
        space_id: impl Into<String>,
        room_id: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            space_id: space_id.into(),
            room_id: room_id.into(),
            kind: kind.into(),
            ts: 0,
            prev: Vec::new(),
            body: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn ts(mut self, ts: i64) -> Self {
        self.ts = ts;
        self
    }

    /// Declare parent heads. They are sorted ascending and capped at
    /// [`MAX_PARENTS`] to bound frontier expansion.
    pub fn prev(mut self, mut parents: Vec<String>) -> Self {
        parents.sort();
        parents.truncate(MAX_PARENTS);
        self.prev = parents;
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Sign with the author's Device key and derive the event id.
    pub fn sign(self, device: &Keypair, delegation: &DelegationCert) -> Result<Event, VerifyError> {
        let mut event = Event {
            v: EVENT_VERSION,
            space_id: self.space_id,
            room_id: self.room_id,
            event_id: String::new(),
            author_principal_id: delegation.principal_id.clone(),
            author_device_id: delegation.device_id.clone(),
            author_device_pub: delegation.device_pub.clone(),
            delegation: delegation.clone(),
            ts: self.ts,
            kind: self.kind,
            prev: self.prev,
            body: self.body,
            sig: String::new(),
        };
        let sig_input = event.sig_input()?;
        event.event_id = event_id_from_sig_input(&sig_input);
        event.sig = device.sign_b64(&sig_input);
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    fn author(space_id: &str) -> (Identity, DelegationCert) {
        let mut id = Identity::generate();
        let cert = id.ensure_delegation_for_space(space_id, NOW).clone();
        (id, cert)
    }

    fn post(space_id: &str, text: &str, prev: Vec<String>) -> Event {
        let (id, cert) = author(space_id);
        EventBuilder::new(space_id, "room:general", kind::MSG_POST)
            .ts(NOW)
            .prev(prev)
            .body(json!({ "text": text }))
            .sign(id.device(), &cert)
            .unwrap()
    }

    #[test]
    fn test_author_and_verify() {
        let event = post("s", "hello", vec![]);
        event.verify(NOW).expect("fresh event verifies");
        assert!(event.event_id.starts_with("e:"));
    }

    #[test]
    fn test_event_id_matches_sig_input_hash() {
        let event = post("s", "hello", vec![]);
        let recomputed = event_id_from_sig_input(&event.sig_input().unwrap());
        assert_eq!(event.event_id, recomputed);
    }

    #[test]
    fn test_tampered_body_rejected() {
        let mut event = post("s", "hello", vec![]);
        event.body = json!({ "text": "goodbye" });
        assert!(matches!(event.verify(NOW), Err(VerifyError::IdMismatch("event_id"))));
    }

    #[test]
    fn test_forged_event_id_rejected() {
        let mut event = post("s", "hello", vec![]);
        event.event_id = "e:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into();
        assert!(matches!(event.verify(NOW), Err(VerifyError::IdMismatch("event_id"))));
    }

    #[test]
    fn test_prev_sorted_and_capped() {
        let parents: Vec<String> = (0..12).rev().map(|i| format!("e:{i:02}")).collect();
        let event = post("s", "x", parents);
        assert_eq!(event.prev.len(), MAX_PARENTS);
        let mut sorted = event.prev.clone();
        sorted.sort();
        assert_eq!(event.prev, sorted);
    }

    #[test]
    fn test_scope_enforced_per_kind() {
        let id = Identity::generate();
        let principal = id.principal().clone();
        let device = id.device().clone();
        // Hand-issue a delegation that can join but never post.
        let cert = DelegationCert::issue(
            &principal,
            &device,
            NOW - 1_000,
            NOW + 1_000_000,
            vec![space_scope("s", "join")],
        );

        let event = EventBuilder::new("s", "room:general", kind::MSG_POST)
            .ts(NOW)
            .body(json!({ "text": "hi" }))
            .sign(&device, &cert)
            .unwrap();
        assert!(matches!(
            event.verify(NOW),
            Err(VerifyError::DelegationScopeMissing(_))
        ));
    }

    #[test]
    fn test_unknown_kind_requires_post_scope() {
        assert_eq!(required_scope_action("FANCY_FUTURE_KIND"), "post");
        assert_eq!(required_scope_action(kind::MEMBER_JOIN), "join");
        assert_eq!(required_scope_action(kind::MEMBER_BAN), "governance");
        assert_eq!(required_scope_action(kind::REACTION_ADD), "post");
    }

    #[test]
    fn test_delegation_window_checked() {
        let event = post("s", "hello", vec![]);
        let far_future = event.delegation.expires_ts + crate::delegation::CLOCK_SKEW_MS + 1;
        assert!(matches!(
            event.verify(far_future),
            Err(VerifyError::DelegationWindow)
        ));
    }

    #[test]
    fn test_serde_roundtrip_preserves_unknown_body_fields() {
        let (id, cert) = author("s");
        let event = EventBuilder::new("s", "room:general", "FANCY_FUTURE_KIND")
            .ts(NOW)
            .body(json!({ "widget": { "depth": 3 }, "text": "x" }))
            .sign(id.device(), &cert)
            .unwrap();

        let back: Event = serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(back, event);
        back.verify(NOW).expect("roundtripped event still verifies");
    }
}
