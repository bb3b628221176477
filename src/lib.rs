//! Content-addressed bundle overlay.
//!
//! A chain-event tailer watches a contract for `Publication`/`NewPeer`
//! events; a distance-ranked peer table drives bounded-depth discovery and
//! sequential upload distribution; a download pipeline streams, verifies,
//! and installs bundles into a content-addressed store; bundles themselves
//! are ZIP archives readable via an optional manifest. All components
//! communicate through a typed, back-pressured event bus.

pub mod bundle;
pub mod bus;
pub mod chain;
pub mod config;
pub mod distance;
pub mod download;
pub mod error;
pub mod magnet;
pub mod peer;
pub mod store;

pub use bundle::{Bundle, ContentJson};
pub use bus::{BusEvent, BusEventKind, EventBus};
pub use config::Config;
pub use distance::distance;
pub use download::{Download, DownloadPipeline, DownloadStatus};
pub use error::BundlenetError;
pub use magnet::{is_magnet, shard_path};
pub use store::ContentStore;

/// Initialise the crate's `tracing` subscriber from `RUST_LOG` (or `info`
/// if unset). Intended for binaries embedding this crate; library callers
/// that already run their own subscriber should not call this.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
