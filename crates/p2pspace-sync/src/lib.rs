//! # p2pspace-sync
//!
//! Anti-entropy sync for p2pspace room DAGs.
//!
//! Two peers converge on the union of their accepted events through a
//! four-frame exchange per room:
//!
//! ```text
//! Peer A                              Peer B
//!   |-------- hello ------------------->|
//!   |-------- heads ------------------->|
//!   |<------- hello --------------------|
//!   |<------- heads --------------------|
//!   |<------- want ---------------------|
//!   |-------- have -------------------->|
//!   |<------- want (gap-fill) ----------|
//!   |-------- have -------------------->|
//! ```
//!
//! Every inbound event runs the full acceptance pipeline; rejected events
//! are dropped and counted, never stored. Token buckets bound the frame
//! and signature-verification budget a peer can spend.

pub mod error;
pub mod messages;
pub mod ratelimit;
pub mod session;
pub mod transport;

pub use error::{Result, SyncError};
pub use messages::{limits, Frame, PROTOCOL_VERSION};
pub use ratelimit::{PeerLimiter, TokenBucket};
pub use session::{governance_state, SyncConfig, SyncReport, SyncSession};
pub use transport::{memory::MemoryTransport, Transport};
