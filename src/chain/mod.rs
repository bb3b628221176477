//! Chain-event tailing: adaptive block-range iteration, ABI decoding, and
//! fan-out to subscribers.

pub mod block_range;
pub mod events;
pub mod tailer;

pub use block_range::BlockRange;
pub use events::{ChainEvent, NewPeer, Publication, RawLog};
pub use tailer::{ChainRpcClient, ChainTailer, EventKind};
