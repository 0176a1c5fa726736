//! Sync session state machine.
//!
//! One session drives the anti-entropy exchange for a single `(space,
//! room)` against one peer over one transport. On open it sends `hello`
//! followed by `heads`; from then on it answers frames until the peer goes
//! quiet or the transport closes. Every inbound event runs the acceptance
//! pipeline before it may touch the log, so a malicious peer can waste this
//! session's budget but never corrupt state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use p2pspace_core::{Clock, Event, RoomDag, SpaceGenesis, GOVERNANCE_ROOM};
use p2pspace_governance::{accept_event, GovernanceState};
use p2pspace_store::{InsertResult, Store};

use crate::error::Result;
use crate::messages::{limits, Frame};
use crate::ratelimit::PeerLimiter;
use crate::transport::Transport;

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long to wait for the next frame before treating the peer as
    /// idle and returning from [`SyncSession::run_until_idle`].
    pub idle_timeout: Duration,
    /// Whether locally persisted events are announced eagerly.
    pub eager_forward: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            eager_forward: true,
        }
    }
}

/// Counters for one session.
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    /// Frames processed.
    pub frames: usize,
    /// Events accepted and appended.
    pub accepted: usize,
    /// Events that were already present.
    pub duplicates: usize,
    /// Events rejected by the acceptance pipeline.
    pub rejected: usize,
    /// Events sent to the peer.
    pub sent: usize,
    /// Frames dropped by rate limiting.
    pub rate_limited: usize,
}

/// Fold the governance room of a store into its current state.
pub async fn governance_state<S: Store>(
    store: &S,
    genesis: Option<&SpaceGenesis>,
) -> Result<GovernanceState> {
    let events = store.room_events(GOVERNANCE_ROOM).await?;
    let dag = RoomDag::from_events(events);
    Ok(GovernanceState::fold_dag(&dag, genesis))
}

/// Anti-entropy session for one room against one peer.
pub struct SyncSession<S: Store, T: Transport> {
    store: Arc<S>,
    transport: T,
    clock: Arc<dyn Clock>,
    space_id: String,
    room_id: String,
    genesis: Option<SpaceGenesis>,
    config: SyncConfig,
    limiter: PeerLimiter,
    /// Ids already requested from this peer, to keep gap-fill from looping.
    requested: HashSet<String>,
    report: SyncReport,
}

impl<S: Store, T: Transport> SyncSession<S, T> {
    pub fn new(
        store: Arc<S>,
        transport: T,
        clock: Arc<dyn Clock>,
        space_id: impl Into<String>,
        room_id: impl Into<String>,
        genesis: Option<SpaceGenesis>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            transport,
            clock,
            space_id: space_id.into(),
            room_id: room_id.into(),
            genesis,
            config,
            limiter: PeerLimiter::new(),
            requested: HashSet::new(),
            report: SyncReport::default(),
        }
    }

    pub fn report(&self) -> &SyncReport {
        &self.report
    }

    /// Open the session: `hello`, then our current heads.
    pub async fn open(&mut self) -> Result<()> {
        self.send(Frame::hello(&self.space_id, &self.room_id)).await?;
        self.send_heads().await
    }

    /// Process frames until the peer stays quiet for the idle timeout or
    /// the transport closes. Returns the session counters.
    pub async fn run_until_idle(&mut self) -> Result<SyncReport> {
        loop {
            let next = tokio::time::timeout(self.config.idle_timeout, self.transport.recv()).await;
            match next {
                Err(_) => break,         // idle
                Ok(Ok(None)) => break,   // closed
                Ok(Ok(Some(bytes))) => self.handle_bytes(&bytes).await?,
                Ok(Err(e)) => return Err(e),
            }
        }
        Ok(self.report.clone())
    }

    /// Announce one freshly persisted local event to the peer.
    pub async fn announce(&mut self, event: &Event) -> Result<()> {
        if !self.config.eager_forward {
            return Ok(());
        }
        self.send(Frame::have(
            &self.space_id,
            &self.room_id,
            vec![event.clone()],
        ))
        .await
    }

    async fn send(&mut self, frame: Frame) -> Result<()> {
        if let Frame::Have { events, .. } = &frame {
            self.report.sent += events.len();
        }
        self.transport.send(frame.encode()?).await
    }

    /// Decode, rate-limit, and dispatch one inbound frame.
    pub async fn handle_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let now = self.clock.now_ms();

        if !self.limiter.allow_message(now) {
            self.report.rate_limited += 1;
            if self.limiter.warn_ready(now) {
                tracing::warn!(room = %self.room_id, "peer rate limited, dropping frames");
            }
            return Ok(());
        }

        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(room = %self.room_id, error = %e, "dropping undecodable frame");
                return Ok(());
            }
        };

        let (space_id, room_id) = frame.scope();
        if space_id != self.space_id || room_id != self.room_id {
            tracing::warn!(room = %self.room_id, "dropping frame for foreign scope");
            return Ok(());
        }

        self.report.frames += 1;
        match frame {
            Frame::Hello { .. } => self.send_heads().await,
            Frame::Heads { heads, .. } => self.on_heads(heads).await,
            Frame::Want { ids, .. } => self.on_want(ids).await,
            Frame::Have { events, .. } => self.on_have(events, now).await,
        }
    }

    async fn send_heads(&mut self) -> Result<()> {
        let mut heads = self.local_dag().await?.heads();
        heads.truncate(limits::MAX_HEADS);
        self.send(Frame::heads(&self.space_id, &self.room_id, heads))
            .await
    }

    async fn on_heads(&mut self, heads: Vec<String>) -> Result<()> {
        let mut want = Vec::new();
        for id in heads.into_iter().take(limits::MAX_HEADS) {
            if !self.store.has_event(&self.room_id, &id).await? && self.requested.insert(id.clone())
            {
                want.push(id);
                if want.len() == limits::MAX_WANT {
                    break;
                }
            }
        }
        if !want.is_empty() {
            self.send(Frame::want(&self.space_id, &self.room_id, want))
                .await?;
        }
        Ok(())
    }

    async fn on_want(&mut self, ids: Vec<String>) -> Result<()> {
        let mut batch = Vec::new();
        for id in ids.into_iter().take(limits::MAX_WANT) {
            if let Some(event) = self.store.get_event(&self.room_id, &id).await? {
                batch.push(event);
                if batch.len() == limits::MAX_HAVE {
                    let full = std::mem::take(&mut batch);
                    self.send(Frame::have(&self.space_id, &self.room_id, full))
                        .await?;
                }
            }
        }
        if !batch.is_empty() {
            self.send(Frame::have(&self.space_id, &self.room_id, batch))
                .await?;
        }
        Ok(())
    }

    async fn on_have(&mut self, events: Vec<Event>, now: i64) -> Result<()> {
        // Only the first MAX_HAVE entries of an oversized batch count.
        let batch: Vec<Event> = events.into_iter().take(limits::MAX_HAVE).collect();

        if !self
            .limiter
            .allow_verifications(batch.len() as u32, now)
        {
            self.report.rate_limited += 1;
            if self.limiter.warn_ready(now) {
                tracing::warn!(room = %self.room_id, "verification budget exhausted, dropping batch");
            }
            return Ok(());
        }

        let mut state = governance_state(self.store.as_ref(), self.genesis.as_ref()).await?;
        let mut gaps = Vec::new();

        for event in batch {
            if event.space_id != self.space_id || event.room_id != self.room_id {
                self.report.rejected += 1;
                continue;
            }
            match accept_event(&event, &state, self.genesis.as_ref(), now) {
                Ok(_) => match self.store.insert_event(&event).await? {
                    InsertResult::Inserted => {
                        self.report.accepted += 1;
                        self.requested.remove(&event.event_id);
                        // A governance event may change who the rest of the
                        // batch is judged against.
                        if self.room_id == GOVERNANCE_ROOM {
                            state.apply(&event, self.genesis.as_ref());
                        }
                        for parent in &event.prev {
                            if !self.store.has_event(&self.room_id, parent).await?
                                && self.requested.insert(parent.clone())
                            {
                                gaps.push(parent.clone());
                            }
                        }
                    }
                    InsertResult::AlreadyExists => self.report.duplicates += 1,
                },
                Err(reason) => {
                    self.report.rejected += 1;
                    tracing::warn!(
                        room = %self.room_id,
                        event = %event.event_id,
                        reason = %reason,
                        "rejected inbound event"
                    );
                }
            }
        }

        // Gap-fill: chase the parents this batch exposed as missing.
        gaps.truncate(limits::MAX_WANT);
        if !gaps.is_empty() {
            self.send(Frame::want(&self.space_id, &self.room_id, gaps))
                .await?;
        }
        Ok(())
    }

    async fn local_dag(&self) -> Result<RoomDag> {
        let events = self.store.room_events(&self.room_id).await?;
        Ok(RoomDag::from_events(events))
    }
}
