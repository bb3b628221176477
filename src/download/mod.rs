//! Download pipeline: queue-deduplicated discovery → download → install.

pub mod pipeline;
pub mod types;

pub use pipeline::DownloadPipeline;
pub use types::{Download, DownloadStatus, PeerResult};
