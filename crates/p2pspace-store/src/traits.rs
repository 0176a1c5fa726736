//! Store trait: the abstract interface for room-event persistence.
//!
//! A store holds the append-only event logs of one Space, keyed by room.
//! Events are content-addressed by `event_id`; inserting the same event
//! twice is an idempotent no-op. Durable backends live with the embedder;
//! the core ships only the in-memory implementation.

use async_trait::async_trait;
use p2pspace_core::Event;

use crate::error::Result;

/// Result of inserting an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// The event was appended.
    Inserted,
    /// The event was already present (not an error).
    AlreadyExists,
}

/// Async interface for per-room event logs.
///
/// An event is either durably appended or not stored at all; there are no
/// partial writes for callers to observe.
#[async_trait]
pub trait Store: Send + Sync {
    /// Append an event to its room log.
    async fn insert_event(&self, event: &Event) -> Result<InsertResult>;

    /// Fetch an event by room and id.
    async fn get_event(&self, room_id: &str, event_id: &str) -> Result<Option<Event>>;

    /// Whether an event exists in the given room.
    async fn has_event(&self, room_id: &str, event_id: &str) -> Result<bool>;

    /// All events of a room in insertion order.
    async fn room_events(&self, room_id: &str) -> Result<Vec<Event>>;

    /// All rooms with at least one event.
    async fn room_ids(&self) -> Result<Vec<String>>;

    /// Number of events in a room.
    async fn room_len(&self, room_id: &str) -> Result<usize>;
}
