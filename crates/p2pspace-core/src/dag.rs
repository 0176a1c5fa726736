//! The per-Room event DAG.
//!
//! An arena of events indexed by `event_id`. Edges run from a child to the
//! parents declared in `prev`. Heads are events no observed child points
//! at; orphans (events whose parents have not arrived yet) are kept in the
//! arena and participate once ancestors fill in.

use std::collections::{BTreeSet, BinaryHeap, HashMap};

use crate::event::Event;

/// Result of inserting an event into the DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DagInsert {
    /// The event was new.
    Inserted,
    /// The event was already present (content-addressed no-op).
    Duplicate,
}

/// In-memory DAG over the events of one `(space_id, room_id)`.
#[derive(Debug, Default)]
pub struct RoomDag {
    /// Arena: all observed events by id.
    events: HashMap<String, Event>,
    /// Observed children per event id (including ids not yet in the arena).
    children: HashMap<String, BTreeSet<String>>,
}

impl RoomDag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a DAG from an iterator of events.
    pub fn from_events<I: IntoIterator<Item = Event>>(events: I) -> Self {
        let mut dag = Self::new();
        for event in events {
            dag.insert(event);
        }
        dag
    }

    /// Insert an event. Duplicates are idempotent no-ops.
    pub fn insert(&mut self, event: Event) -> DagInsert {
        if self.events.contains_key(&event.event_id) {
            return DagInsert::Duplicate;
        }
        for parent in &event.prev {
            self.children
                .entry(parent.clone())
                .or_default()
                .insert(event.event_id.clone());
        }
        self.events.insert(event.event_id.clone(), event);
        DagInsert::Inserted
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.events.contains_key(event_id)
    }

    pub fn get(&self, event_id: &str) -> Option<&Event> {
        self.events.get(event_id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event ids with no observed children, sorted ascending.
    pub fn heads(&self) -> Vec<String> {
        let mut heads: Vec<String> = self
            .events
            .keys()
            .filter(|id| {
                self.children
                    .get(*id)
                    .map(|c| c.is_empty())
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        heads.sort();
        heads
    }

    /// Parent ids referenced by some event but absent from the arena,
    /// sorted ascending. These are the gaps a peer should request.
    pub fn missing_parents(&self) -> Vec<String> {
        let mut missing: Vec<String> = self
            .children
            .keys()
            .filter(|id| !self.events.contains_key(*id))
            .cloned()
            .collect();
        missing.sort();
        missing
    }

    /// Deterministic topological order over the observed events.
    ///
    /// Kahn's algorithm; the ready set is a total order on
    /// `(ts ascending, event_id ascending)`. Parents absent from the arena
    /// do not gate their children. Should a cycle survive (impossible with
    /// honest signers, since parents must exist before a child can name
    /// them), the remainder is appended under the same tie-break and treated
    /// as local corruption rather than a protocol error.
    pub fn topo_sort(&self) -> Vec<&Event> {
        let mut indegree: HashMap<&str, usize> = HashMap::with_capacity(self.events.len());
        for event in self.events.values() {
            let present_parents = event
                .prev
                .iter()
                .filter(|p| self.events.contains_key(*p))
                .count();
            indegree.insert(event.event_id.as_str(), present_parents);
        }

        // Min-heap on (ts, event_id) via Reverse.
        let mut ready: BinaryHeap<std::cmp::Reverse<(i64, &str)>> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| std::cmp::Reverse((self.events[*id].ts, *id)))
            .collect();

        let mut order: Vec<&Event> = Vec::with_capacity(self.events.len());
        while let Some(std::cmp::Reverse((_, id))) = ready.pop() {
            let event = &self.events[id];
            order.push(event);
            if let Some(children) = self.children.get(id) {
                for child in children {
                    if let Some(d) = indegree.get_mut(child.as_str()) {
                        *d -= 1;
                        if *d == 0 {
                            let child_event = &self.events[child.as_str()];
                            ready.push(std::cmp::Reverse((
                                child_event.ts,
                                child_event.event_id.as_str(),
                            )));
                        }
                    }
                }
            }
        }

        if order.len() < self.events.len() {
            // Cycle residue: local corruption, ordered by the same tie-break.
            let placed: BTreeSet<&str> = order.iter().map(|e| e.event_id.as_str()).collect();
            let mut rest: Vec<&Event> = self
                .events
                .values()
                .filter(|e| !placed.contains(e.event_id.as_str()))
                .collect();
            rest.sort_by(|a, b| (a.ts, &a.event_id).cmp(&(b.ts, &b.event_id)));
            order.extend(rest);
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegation::DelegationCert;
    use crate::event::{kind, EventBuilder};
    use crate::identity::Identity;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    struct Author {
        identity: Identity,
        delegation: DelegationCert,
    }

    impl Author {
        fn new() -> Self {
            let mut identity = Identity::generate();
            let delegation = identity.ensure_delegation_for_space("s", NOW).clone();
            Self { identity, delegation }
        }

        fn post(&self, ts: i64, text: &str, prev: Vec<String>) -> Event {
            EventBuilder::new("s", "room:general", kind::MSG_POST)
                .ts(ts)
                .prev(prev)
                .body(json!({ "text": text }))
                .sign(self.identity.device(), &self.delegation)
                .unwrap()
        }
    }

    #[test]
    fn test_insert_idempotent() {
        let a = Author::new();
        let e = a.post(NOW, "x", vec![]);
        let mut dag = RoomDag::new();
        assert_eq!(dag.insert(e.clone()), DagInsert::Inserted);
        assert_eq!(dag.insert(e), DagInsert::Duplicate);
        assert_eq!(dag.len(), 1);
    }

    #[test]
    fn test_heads_track_children() {
        let a = Author::new();
        let e1 = a.post(NOW, "1", vec![]);
        let e2 = a.post(NOW + 1, "2", vec![e1.event_id.clone()]);

        let mut dag = RoomDag::new();
        dag.insert(e1.clone());
        assert_eq!(dag.heads(), vec![e1.event_id.clone()]);

        dag.insert(e2.clone());
        assert_eq!(dag.heads(), vec![e2.event_id]);
    }

    #[test]
    fn test_topo_respects_edges_and_tiebreak() {
        let a = Author::new();
        // e_late has an earlier-sorting id chance but a later timestamp tie
        // is what orders the concurrent pair.
        let e1 = a.post(NOW, "1", vec![]);
        let e2a = a.post(NOW + 5, "2a", vec![e1.event_id.clone()]);
        let e2b = a.post(NOW + 3, "2b", vec![e1.event_id.clone()]);
        let e3 = a.post(NOW + 9, "3", vec![e2a.event_id.clone(), e2b.event_id.clone()]);

        let dag = RoomDag::from_events([e1.clone(), e2a.clone(), e2b.clone(), e3.clone()]);
        let order: Vec<&str> = dag.topo_sort().iter().map(|e| e.event_id.as_str()).collect();

        assert_eq!(order[0], e1.event_id);
        assert_eq!(order[1], e2b.event_id, "earlier ts first among concurrent");
        assert_eq!(order[2], e2a.event_id);
        assert_eq!(order[3], e3.event_id);
    }

    #[test]
    fn test_topo_is_insertion_order_independent() {
        let a = Author::new();
        let e1 = a.post(NOW, "1", vec![]);
        let e2 = a.post(NOW + 1, "2", vec![e1.event_id.clone()]);
        let e3 = a.post(NOW + 2, "3", vec![e2.event_id.clone()]);

        let forward = RoomDag::from_events([e1.clone(), e2.clone(), e3.clone()]);
        let backward = RoomDag::from_events([e3, e2, e1]);

        let ids = |d: &RoomDag| -> Vec<String> {
            d.topo_sort().iter().map(|e| e.event_id.clone()).collect()
        };
        assert_eq!(ids(&forward), ids(&backward));
    }

    #[test]
    fn test_equal_ts_breaks_on_event_id() {
        let a = Author::new();
        let x = a.post(NOW, "x", vec![]);
        let y = a.post(NOW, "y", vec![]);

        let dag = RoomDag::from_events([x.clone(), y.clone()]);
        let order: Vec<&str> = dag.topo_sort().iter().map(|e| e.event_id.as_str()).collect();

        let mut expected = [x.event_id.as_str(), y.event_id.as_str()];
        expected.sort();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_orphans_and_missing_parents() {
        let a = Author::new();
        let e1 = a.post(NOW, "1", vec![]);
        let e2 = a.post(NOW + 1, "2", vec![e1.event_id.clone()]);
        let e3 = a.post(NOW + 2, "3", vec![e2.event_id.clone()]);

        let mut dag = RoomDag::new();
        dag.insert(e1.clone());
        dag.insert(e3.clone());

        // e3 is stored despite its missing parent and still participates.
        assert!(dag.contains(&e3.event_id));
        assert_eq!(dag.missing_parents(), vec![e2.event_id.clone()]);
        assert_eq!(dag.topo_sort().len(), 2);

        // Gap fill materializes the chain and clears the missing set.
        dag.insert(e2.clone());
        assert!(dag.missing_parents().is_empty());
        let order: Vec<&str> = dag.topo_sort().iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(order, vec![e1.event_id.as_str(), e2.event_id.as_str(), e3.event_id.as_str()]);
    }
}
