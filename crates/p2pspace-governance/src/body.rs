//! Typed views over governance event bodies.
//!
//! Bodies travel as opaque JSON (they participate in signatures through
//! their JCS bytes), so each kind gets a typed schema with a pass-through
//! map for fields this version does not know about.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use p2pspace_core::{Event, Invite};

/// Body of a `MEMBER_JOIN` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberJoinBody {
    /// The joining principal; must equal the event author.
    pub principal_id: String,
    /// The joining principal's public key; must match the delegation.
    pub principal_pub: String,
    /// The capability being redeemed.
    pub invite: Invite,
    /// Base64url-nopad proof-of-work nonce, when the invite demands one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pow_nonce: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Body of `MEMBER_BAN` and `MEMBER_UNBAN` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberModerationBody {
    pub principal_id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Body of a `MSG_POST` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgPostBody {
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Parse an event body into a typed schema, ignoring nothing.
pub fn parse_body<T: serde::de::DeserializeOwned>(event: &Event) -> Option<T> {
    serde_json::from_value(event.body.clone()).ok()
}
