//! # p2pspace-core
//!
//! Pure protocol primitives for p2pspace: a serverless, invite-only group
//! messaging substrate. Spaces are communities rooted at an Ed25519 key;
//! Rooms are per-Space event logs that form content-addressed DAGs and
//! converge between peers by gossip.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key types
//!
//! - [`Identity`] - Principal and Device keypairs with per-Space delegations
//! - [`DelegationCert`] - Principal-signed Device authorization
//! - [`SpaceGenesis`] - the Space Root's self-signed genesis record
//! - [`Invite`] - bearer capability to join a Space
//! - [`Event`] - immutable, signed, content-addressed DAG record
//! - [`RoomDag`] - heads, orphans, and deterministic topological order
//!
//! ## Canonical encoding
//!
//! All signatures are computed over domain-separated netstring sequences
//! with JCS-embedded sub-objects. See [`canonical`].

pub mod canonical;
pub mod clock;
pub mod crypto;
pub mod dag;
pub mod delegation;
pub mod error;
pub mod event;
pub mod genesis;
pub mod identity;
pub mod ids;
pub mod invite;
pub mod limits;
pub mod peer;
pub mod pow;

pub use canonical::{jcs_bytes, SigInput};
pub use clock::{Clock, SystemClock};
pub use crypto::Keypair;
pub use dag::{DagInsert, RoomDag};
pub use delegation::{space_scope, DelegationCert, CLOCK_SKEW_MS};
pub use error::{CryptoError, VerifyError};
pub use event::{
    is_governance_kind, required_scope_action, Event, EventBuilder, EVENT_VERSION,
    GOVERNANCE_ROOM, MAX_PARENTS,
};
pub use genesis::SpaceGenesis;
pub use identity::Identity;
pub use ids::{event_id_from_sig_input, id_from_spki_b64, id_from_spki_der, new_invite_id};
pub use invite::{Invite, InviteBuilder, InviteConstraints, InviteIssuerCert, PowRequirement};
pub use peer::{PeerRecord, SignedPeerRecord};
