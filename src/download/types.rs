//! Download queue entry types.

use crate::peer::Peer;

/// Lifecycle state of a single magnet's download.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadStatus {
    Pending,
    Discovery,
    Download,
    Finished,
    Failed,
}

/// One magnet's progress through the pipeline.
#[derive(Debug, Clone)]
pub struct Download {
    pub magnet: String,
    pub status: DownloadStatus,
    pub peer: Option<Peer>,
}

impl Download {
    pub fn new(magnet: impl Into<String>) -> Self {
        Self {
            magnet: magnet.into(),
            status: DownloadStatus::Pending,
            peer: None,
        }
    }
}

/// Outcome of a single peer download attempt, used to decide the next state
/// transition: checksum mismatch vs. transport fault take different
/// rating-penalty paths even though both return to `DISCOVERY`.
#[derive(Debug, Clone)]
pub enum PeerResult {
    Success,
    InvalidChecksum,
    DownloadError,
}
