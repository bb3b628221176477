//! Typed publish/subscribe event bus.
//!
//! `emit` fans an event out to every sink subscribed to its kind, in the
//! order it was emitted; delivery across unrelated kinds is unordered and
//! concurrent. Each sink is a bounded `mpsc` channel, so a slow subscriber
//! applies back-pressure to `emit` rather than losing events, following the
//! same actor-inbox pattern used elsewhere in this crate for command and
//! event channels.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::chain::{ChainEvent, NewPeer, Publication};
use crate::peer::Peer;

#[derive(Debug, Clone)]
pub enum BusEvent {
    DiscoveryRequested { magnet: String },
    DiscoveryFinished { magnet: String, peer: Peer, download_url: String },
    DiscoveryFailed { magnet: String },
    DownloadFinished { magnet: String },
    PeerRatingUpdated { service_id: String, rating: f64 },
    Publication(Publication),
    NewPeer(NewPeer),
}

impl From<ChainEvent> for BusEvent {
    fn from(event: ChainEvent) -> Self {
        match event {
            ChainEvent::Publication(p) => BusEvent::Publication(p),
            ChainEvent::NewPeer(p) => BusEvent::NewPeer(p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusEventKind {
    DiscoveryRequested,
    DiscoveryFinished,
    DiscoveryFailed,
    DownloadFinished,
    PeerRatingUpdated,
    Publication,
    NewPeer,
}

impl BusEvent {
    pub fn kind(&self) -> BusEventKind {
        match self {
            BusEvent::DiscoveryRequested { .. } => BusEventKind::DiscoveryRequested,
            BusEvent::DiscoveryFinished { .. } => BusEventKind::DiscoveryFinished,
            BusEvent::DiscoveryFailed { .. } => BusEventKind::DiscoveryFailed,
            BusEvent::DownloadFinished { .. } => BusEventKind::DownloadFinished,
            BusEvent::PeerRatingUpdated { .. } => BusEventKind::PeerRatingUpdated,
            BusEvent::Publication(_) => BusEventKind::Publication,
            BusEvent::NewPeer(_) => BusEventKind::NewPeer,
        }
    }
}

/// Default per-sink channel capacity.
const DEFAULT_SINK_CAPACITY: usize = 64;

#[derive(Default)]
pub struct EventBus {
    sinks: HashMap<BusEventKind, Vec<mpsc::Sender<BusEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `kind`, returning the receiving half. Idempotent
    /// subscription identity is the channel itself; callers that want a
    /// single logical subscriber should keep and reuse one `Receiver`.
    pub fn subscribe(&mut self, kind: BusEventKind) -> mpsc::Receiver<BusEvent> {
        self.subscribe_with_capacity(kind, DEFAULT_SINK_CAPACITY)
    }

    pub fn subscribe_with_capacity(&mut self, kind: BusEventKind, capacity: usize) -> mpsc::Receiver<BusEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        self.sinks.entry(kind).or_default().push(tx);
        rx
    }

    /// Deliver `event` to every sink subscribed to its kind, awaiting
    /// back-pressure from each in turn.
    pub async fn emit(&self, event: BusEvent) {
        if let Some(sinks) = self.sinks.get(&event.kind()) {
            for sink in sinks {
                let _ = sink.send(event.clone()).await;
            }
        }
    }
}
