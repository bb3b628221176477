//! Peer table, client contract, and discovery/distribution algorithms.

pub mod client;
pub mod discovery;
pub mod table;
pub mod types;

pub use client::{AsyncWriteVerified, HelloResponse, HttpPeerClient, PeerClient, Timeouts};
pub use discovery::{discover, distribute, DEFAULT_MAX_DEPTH};
pub use table::{ClientFactory, PeerTable};
pub use types::{DiscoveryOutcome, DiscoveryResult, DiscoveryState, Peer};
