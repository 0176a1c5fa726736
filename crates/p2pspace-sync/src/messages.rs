//! Sync protocol frames.
//!
//! Frames are JSON objects tagged by `t`, each carrying the protocol
//! version and the `(spaceId, roomId)` the session is scoped to.

use serde::{Deserialize, Serialize};

use p2pspace_core::Event;

use crate::error::{Result, SyncError};

/// Current sync protocol version.
pub const PROTOCOL_VERSION: i64 = 1;

/// Frame size and cardinality limits.
pub mod limits {
    /// Max serialized frame size in bytes.
    pub const MAX_FRAME_BYTES: usize = p2pspace_core::limits::MAX_FRAME_BYTES;
    /// Max ids in a `heads` frame.
    pub const MAX_HEADS: usize = 256;
    /// Max ids in a `want` frame.
    pub const MAX_WANT: usize = 256;
    /// Max events in a `have` frame.
    pub const MAX_HAVE: usize = 64;
}

/// A sync protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "lowercase")]
pub enum Frame {
    /// Session opener.
    Hello {
        v: i64,
        #[serde(rename = "spaceId")]
        space_id: String,
        #[serde(rename = "roomId")]
        room_id: String,
    },

    /// Advertise current DAG heads.
    Heads {
        v: i64,
        #[serde(rename = "spaceId")]
        space_id: String,
        #[serde(rename = "roomId")]
        room_id: String,
        heads: Vec<String>,
    },

    /// Request events by id.
    Want {
        v: i64,
        #[serde(rename = "spaceId")]
        space_id: String,
        #[serde(rename = "roomId")]
        room_id: String,
        ids: Vec<String>,
    },

    /// Deliver events.
    Have {
        v: i64,
        #[serde(rename = "spaceId")]
        space_id: String,
        #[serde(rename = "roomId")]
        room_id: String,
        events: Vec<Event>,
    },
}

impl Frame {
    pub fn hello(space_id: &str, room_id: &str) -> Self {
        Frame::Hello {
            v: PROTOCOL_VERSION,
            space_id: space_id.into(),
            room_id: room_id.into(),
        }
    }

    pub fn heads(space_id: &str, room_id: &str, heads: Vec<String>) -> Self {
        Frame::Heads {
            v: PROTOCOL_VERSION,
            space_id: space_id.into(),
            room_id: room_id.into(),
            heads,
        }
    }

    pub fn want(space_id: &str, room_id: &str, ids: Vec<String>) -> Self {
        Frame::Want {
            v: PROTOCOL_VERSION,
            space_id: space_id.into(),
            room_id: room_id.into(),
            ids,
        }
    }

    pub fn have(space_id: &str, room_id: &str, events: Vec<Event>) -> Self {
        Frame::Have {
            v: PROTOCOL_VERSION,
            space_id: space_id.into(),
            room_id: room_id.into(),
            events,
        }
    }

    /// The `(spaceId, roomId)` pair every frame carries.
    pub fn scope(&self) -> (&str, &str) {
        match self {
            Frame::Hello { space_id, room_id, .. }
            | Frame::Heads { space_id, room_id, .. }
            | Frame::Want { space_id, room_id, .. }
            | Frame::Have { space_id, room_id, .. } => (space_id, room_id),
        }
    }

    /// Check cardinality limits.
    pub fn validate_limits(&self) -> Result<()> {
        match self {
            Frame::Hello { .. } => {}
            Frame::Heads { heads, .. } => {
                if heads.len() > limits::MAX_HEADS {
                    return Err(SyncError::Frame("too many heads".into()));
                }
            }
            Frame::Want { ids, .. } => {
                if ids.len() > limits::MAX_WANT {
                    return Err(SyncError::Frame("too many want ids".into()));
                }
            }
            Frame::Have { events, .. } => {
                if events.len() > limits::MAX_HAVE {
                    return Err(SyncError::Frame("too many have events".into()));
                }
            }
        }
        Ok(())
    }

    /// Serialize for the wire, enforcing the frame-size cap.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate_limits()?;
        let bytes = serde_json::to_vec(self).map_err(|e| SyncError::Frame(e.to_string()))?;
        if bytes.len() > limits::MAX_FRAME_BYTES {
            return Err(SyncError::Frame("frame exceeds size cap".into()));
        }
        Ok(bytes)
    }

    /// Parse from wire bytes, enforcing the frame-size cap.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > limits::MAX_FRAME_BYTES {
            return Err(SyncError::Frame("frame exceeds size cap".into()));
        }
        serde_json::from_slice(bytes).map_err(|e| SyncError::Frame(e.to_string()))
    }
}
