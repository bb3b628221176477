//! Error types for every seam in the overlay.
//!
//! Each module owns a flat `thiserror` enum rather than a shared bag of
//! variants, one enum per component, matching `P2pError`'s split elsewhere
//! in this workspace.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MagnetError {
    #[error("invalid magnet: {0}")]
    InvalidMagnet(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BundleError {
    #[error("malformed bundle: {0}")]
    BundleFormatError(String),
    #[error("unsupported bundle version: {0}")]
    UnsupportedBundleVersion(String),
    #[error("unsafe bundle content: {0}")]
    UnsafeBundleContent(String),
    #[error("archive error: {0}")]
    Archive(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid magnet: {0}")]
    InvalidMagnet(#[from] MagnetError),
    #[error("checksum mismatch for {magnet}: expected {magnet}, observed {observed}")]
    InvalidChecksum { magnet: String, observed: String },
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, Clone)]
pub enum ChainRpcError {
    /// The node reported "Filter not found"; the caller should recreate its
    /// filter/range and retry. Not fatal.
    #[error("filter not found")]
    FilterNotFound,
    /// Any other node-reported error.
    #[error("chain rpc error: {0}")]
    Node(String),
    /// The response could not be decoded per the registered ABI.
    #[error("event decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Error, Clone)]
pub enum TailerError {
    #[error(transparent)]
    Rpc(#[from] ChainRpcError),
    /// A single log failed ABI decoding. Events must never be silently
    /// dropped, so this is fatal to the subscriber-visible stream.
    #[error("fatal decode fault on tx {tx_hash}: {source}")]
    FatalDecode { tx_hash: String, source: ChainRpcError },
}

#[derive(Debug, Error, Clone)]
pub enum PeerError {
    #[error("unsupported peer method: {0}")]
    UnsupportedPeerMethod(String),
    #[error("invalid peer response: {0}")]
    InvalidPeerResponse(String),
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("timeout error: {0}")]
    TimeoutError(String),
    #[error("proxy error: {0}")]
    ProxyError(String),
    #[error("download error for magnet {magnet}: {message}")]
    DownloadError { magnet: String, message: String },
    #[error("checksum mismatch downloading {magnet}: observed {observed}")]
    InvalidChecksum { magnet: String, observed: String },
    #[error("upload error for magnet {magnet}: {message}")]
    UploadError { magnet: String, message: String },
}

#[derive(Debug, Error, Clone)]
pub enum DiscoveryError {
    #[error("magnet not discovered: search reached depth limit")]
    NotDiscovered,
}

#[derive(Debug, Error)]
pub enum BundlenetError {
    #[error(transparent)]
    Magnet(#[from] MagnetError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Tailer(#[from] TailerError),
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}
