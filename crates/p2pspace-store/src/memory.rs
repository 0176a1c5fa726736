//! In-memory implementation of the Store trait.
//!
//! Keeps every room log in memory with no persistence. Thread-safe via
//! RwLock; the same semantics a durable backend must provide.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use p2pspace_core::Event;

use crate::error::Result;
use crate::traits::{InsertResult, Store};

/// In-memory store for one Space.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, RoomLog>>,
}

#[derive(Default)]
struct RoomLog {
    /// Index: event_id -> position in `events`.
    by_id: HashMap<String, usize>,
    /// Events in arrival order.
    events: Vec<Event>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_event(&self, event: &Event) -> Result<InsertResult> {
        let mut inner = self.inner.write().unwrap();
        let log = inner.entry(event.room_id.clone()).or_default();

        if log.by_id.contains_key(&event.event_id) {
            return Ok(InsertResult::AlreadyExists);
        }

        log.by_id.insert(event.event_id.clone(), log.events.len());
        log.events.push(event.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_event(&self, room_id: &str, event_id: &str) -> Result<Option<Event>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.get(room_id).and_then(|log| {
            log.by_id.get(event_id).map(|&i| log.events[i].clone())
        }))
    }

    async fn has_event(&self, room_id: &str, event_id: &str) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .get(room_id)
            .map(|log| log.by_id.contains_key(event_id))
            .unwrap_or(false))
    }

    async fn room_events(&self, room_id: &str) -> Result<Vec<Event>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .get(room_id)
            .map(|log| log.events.clone())
            .unwrap_or_default())
    }

    async fn room_ids(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().unwrap();
        let mut ids: Vec<String> = inner.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn room_len(&self, room_id: &str) -> Result<usize> {
        let inner = self.inner.read().unwrap();
        Ok(inner.get(room_id).map(|log| log.events.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p2pspace_core::{event::kind, EventBuilder, Identity};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    fn make_post(identity: &mut Identity, room: &str, text: &str) -> Event {
        let delegation = identity.ensure_delegation_for_space("s", NOW).clone();
        EventBuilder::new("s", room, kind::MSG_POST)
            .ts(NOW)
            .body(json!({ "text": text }))
            .sign(identity.device(), &delegation)
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();
        let mut id = Identity::generate();
        let event = make_post(&mut id, "room:general", "hello");

        assert_eq!(store.insert_event(&event).await.unwrap(), InsertResult::Inserted);
        let got = store
            .get_event("room:general", &event.event_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, event);
        assert!(store.has_event("room:general", &event.event_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_idempotent() {
        let store = MemoryStore::new();
        let mut id = Identity::generate();
        let event = make_post(&mut id, "room:general", "hello");

        store.insert_event(&event).await.unwrap();
        assert_eq!(
            store.insert_event(&event).await.unwrap(),
            InsertResult::AlreadyExists
        );
        assert_eq!(store.room_len("room:general").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let store = MemoryStore::new();
        let mut id = Identity::generate();
        let a = make_post(&mut id, "room:a", "in a");
        let b = make_post(&mut id, "room:b", "in b");

        store.insert_event(&a).await.unwrap();
        store.insert_event(&b).await.unwrap();

        assert!(!store.has_event("room:b", &a.event_id).await.unwrap());
        assert_eq!(store.room_ids().await.unwrap(), vec!["room:a", "room:b"]);
    }

    #[tokio::test]
    async fn test_room_events_preserve_arrival_order() {
        let store = MemoryStore::new();
        let mut id = Identity::generate();
        let first = make_post(&mut id, "r", "1");
        let second = make_post(&mut id, "r", "2");

        store.insert_event(&first).await.unwrap();
        store.insert_event(&second).await.unwrap();

        let events = store.room_events("r").await.unwrap();
        assert_eq!(events, vec![first, second]);
    }
}
