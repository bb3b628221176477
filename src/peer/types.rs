//! Peer record and discovery/distribution result types.

/// A remote node known to this overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct Peer {
    pub service_id: String,
    pub content_service_id: Option<String>,
    pub version: Option<String>,
    pub rating: f64,
    pub address: Option<String>,
}

impl Peer {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            content_service_id: None,
            version: None,
            rating: 0.0,
            address: None,
        }
    }

    /// Host used for control-plane requests (`hello`, `discover`, `push`, `upload`).
    pub fn control_host(&self) -> &str {
        &self.service_id
    }

    /// Host used for content-plane requests (`has_magnet`, `download`),
    /// falling back to the control host when no content identity is known.
    pub fn content_host(&self) -> &str {
        self.content_service_id.as_deref().unwrap_or(&self.service_id)
    }
}

/// Result of a remote `discover(magnet)` call.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    pub matching: Vec<Peer>,
    pub near: Vec<Peer>,
}

/// Outcome of a bounded-depth discovery walk.
#[derive(Debug, Clone)]
pub enum DiscoveryOutcome {
    Found { peer: Peer, download_url: String },
    Failed,
}

/// Carries progress across repeated calls into the discovery walk so it can
/// resume (e.g. after `DownloadError`/`InvalidChecksum` sends the pipeline
/// back to `DISCOVERY`) without revisiting already-tried peers.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryState {
    pub visited: std::collections::HashSet<String>,
}

impl DiscoveryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_visited(&mut self, service_id: &str) {
        self.visited.insert(service_id.to_string());
    }

    pub fn is_visited(&self, service_id: &str) -> bool {
        self.visited.contains(service_id)
    }
}
