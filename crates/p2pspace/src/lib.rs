//! # p2pspace
//!
//! A serverless, invite-only group messaging substrate. Communities are
//! Spaces rooted at an Ed25519 key; each Space contains Rooms whose
//! messages are signed, content-addressed events forming a DAG that
//! converges between peers by gossip. There is no central registry:
//! membership, moderation, and messaging are all expressed as events in
//! the well-known `governance` room and folded into state every peer
//! derives identically.
//!
//! This crate is the facade over the protocol core:
//!
//! - [`Node`] founds or joins a Space, authors events, accepts inbound
//!   ones, and opens sync sessions.
//! - `p2pspace-core` holds the primitives (identity, delegation, invites,
//!   events, the room DAG, canonical encoding).
//! - `p2pspace-governance` folds the governance room and gates acceptance.
//! - `p2pspace-sync` converges room DAGs between peers.
//! - `p2pspace-store` is the persistence boundary.
//!
//! ```no_run
//! use std::sync::Arc;
//! use p2pspace::{Node, NodeError};
//! use p2pspace_core::{Identity, SystemClock};
//! use p2pspace_store::MemoryStore;
//!
//! async fn example() -> Result<(), NodeError> {
//!     let clock = Arc::new(SystemClock);
//!     let founder = Identity::generate();
//!     let mut node = Node::create_space(
//!         founder,
//!         Some("my community".into()),
//!         MemoryStore::new(),
//!         clock,
//!     )
//!     .await?;
//!
//!     let invite = node.issue_invite(&["post"], None, None)?;
//!     println!("share this: {}", invite.encode_link()?);
//!
//!     node.post("room:general", "welcome!").await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod node;

pub use error::{NodeError, Result};
pub use node::Node;

pub use p2pspace_core as core;
pub use p2pspace_governance as governance;
pub use p2pspace_store as store;
pub use p2pspace_sync as sync;
