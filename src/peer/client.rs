//! Remote peer client contract and its HTTP+SOCKS5 implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncRead;

use crate::error::PeerError;
use crate::peer::types::{DiscoveryResult, Peer};

/// Remote operations available against a single peer.
///
/// All operations route through the configured anonymizing transport and
/// honour independent connect/read deadlines; failures map onto
/// [`PeerError`]'s transport/protocol/content variants.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Learn the peer's software version and content-endpoint identity.
    async fn hello(&self) -> Result<HelloResponse, PeerError>;

    /// Ask the peer for holders of and neighbours near `magnet`.
    async fn discover(&self, magnet: &str) -> Result<DiscoveryResult, PeerError>;

    /// Existence probe against the peer's content endpoint.
    async fn has_magnet(&self, magnet: &str) -> Result<bool, PeerError>;

    /// Stream `magnet`'s bytes from the peer's content endpoint into `sink`,
    /// which performs digest verification as it writes.
    async fn download(
        &self,
        magnet: &str,
        sink: &mut (dyn AsyncWriteVerified + Send),
    ) -> Result<(), PeerError>;

    /// Stream `content` to the peer as an upload of `magnet`.
    async fn upload(
        &self,
        magnet: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), PeerError>;

    /// Announce known peers/magnets to this neighbour.
    async fn push(&self, peers: &[Peer], magnets: &[String]) -> Result<(), PeerError>;
}

/// Sink contract a download target must satisfy: an async writer that can
/// report whether the bytes it received hash to the expected magnet. The
/// content store's `store()` fulfils this by hashing incrementally while
/// writing to a temp path.
#[async_trait]
pub trait AsyncWriteVerified {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), PeerError>;
    async fn finish(&mut self, expected_magnet: &str) -> Result<(), PeerError>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HelloResponse {
    pub version: Option<String>,
    pub content_service_id: Option<String>,
}

/// Per-call timeout configuration: 60s total, 30s connect, 10s read-idle.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub total: Duration,
    pub connect: Duration,
    pub read_idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            total: Duration::from_secs(60),
            connect: Duration::from_secs(30),
            read_idle: Duration::from_secs(10),
        }
    }
}

/// `reqwest`-backed client routed through a SOCKS5 proxy, used for real
/// peer communication. Splits control-plane and content-plane calls across
/// the peer's two hostnames.
pub struct HttpPeerClient {
    http: reqwest::Client,
    peer: Peer,
}

impl HttpPeerClient {
    pub fn new(peer: Peer, proxy_url: &str, timeouts: Timeouts) -> Result<Self, PeerError> {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| PeerError::ProxyError(e.to_string()))?;
        let http = reqwest::Client::builder()
            .proxy(proxy)
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.total)
            .build()
            .map_err(|e| PeerError::ConnectionError(e.to_string()))?;
        Ok(Self { http, peer })
    }

    fn control_url(&self, path: &str) -> String {
        format!("http://{}.onion/{}", self.peer.control_host(), path.trim_start_matches('/'))
    }

    fn content_url(&self, path: &str) -> String {
        format!("http://{}.onion/{}", self.peer.content_host(), path.trim_start_matches('/'))
    }

    async fn handle_response(resp: reqwest::Response) -> Result<reqwest::Response, PeerError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status.as_u16() == 404 {
            return Err(PeerError::UnsupportedPeerMethod(resp.url().to_string()));
        }
        let body = resp.text().await.unwrap_or_default();
        Err(PeerError::InvalidPeerResponse(format!("status {status}: {body}")))
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn hello(&self) -> Result<HelloResponse, PeerError> {
        let resp = self
            .http
            .get(self.control_url("hello"))
            .send()
            .await
            .map_err(map_transport_error)?;
        let resp = Self::handle_response(resp).await?;
        resp.json()
            .await
            .map_err(|e| PeerError::InvalidPeerResponse(e.to_string()))
    }

    async fn discover(&self, magnet: &str) -> Result<DiscoveryResult, PeerError> {
        #[derive(Deserialize)]
        struct RawDiscoverResponse {
            #[serde(default)]
            r#match: Vec<RawPeer>,
            #[serde(default)]
            near: Vec<RawPeer>,
        }
        #[derive(Deserialize)]
        struct RawPeer {
            service_id: String,
            #[serde(default)]
            content_service_id: Option<String>,
            #[serde(default)]
            rating: f64,
        }

        let resp = self
            .http
            .post(self.control_url("discover"))
            .json(&serde_json::json!({ "magnet": magnet }))
            .send()
            .await
            .map_err(map_transport_error)?;
        let resp = Self::handle_response(resp).await?;
        let raw: RawDiscoverResponse = resp
            .json()
            .await
            .map_err(|e| PeerError::InvalidPeerResponse(e.to_string()))?;

        let to_peer = |raw: RawPeer| Peer {
            service_id: raw.service_id,
            content_service_id: raw.content_service_id,
            version: None,
            rating: raw.rating,
            address: None,
        };

        Ok(DiscoveryResult {
            matching: raw.r#match.into_iter().map(to_peer).collect(),
            near: raw.near.into_iter().map(to_peer).collect(),
        })
    }

    async fn has_magnet(&self, magnet: &str) -> Result<bool, PeerError> {
        let shard = crate::magnet::shard_path(magnet)
            .map_err(|e| PeerError::InvalidPeerResponse(e.to_string()))?
            .join("/");
        let resp = self
            .http
            .head(self.content_url(&shard))
            .send()
            .await
            .map_err(map_transport_error)?;
        match resp.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            _ => Err(PeerError::InvalidPeerResponse(format!("status {}", resp.status()))),
        }
    }

    async fn download(
        &self,
        magnet: &str,
        sink: &mut (dyn AsyncWriteVerified + Send),
    ) -> Result<(), PeerError> {
        let shard = crate::magnet::shard_path(magnet)
            .map_err(|e| PeerError::InvalidPeerResponse(e.to_string()))?
            .join("/");
        let mut resp = self
            .http
            .get(self.content_url(&shard))
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PeerError::DownloadError {
                magnet: magnet.to_string(),
                message: format!("status {status}"),
            });
        }
        while let Some(chunk) = resp.chunk().await.map_err(map_transport_error)? {
            sink.write_chunk(&chunk).await?;
        }
        sink.finish(magnet).await
    }

    async fn upload(
        &self,
        magnet: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), PeerError> {
        use tokio::io::AsyncReadExt;
        let mut buf = Vec::new();
        content
            .read_to_end(&mut buf)
            .await
            .map_err(|e| PeerError::UploadError { magnet: magnet.to_string(), message: e.to_string() })?;
        let resp = self
            .http
            .post(self.control_url(&format!("upload/{magnet}")))
            .body(buf)
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::handle_response(resp).await.map(|_| ())
    }

    async fn push(&self, peers: &[Peer], magnets: &[String]) -> Result<(), PeerError> {
        let body = serde_json::json!({
            "peers": peers.iter().map(|p| &p.service_id).collect::<Vec<_>>(),
            "magnets": magnets,
        });
        let resp = self
            .http
            .post(self.control_url("push"))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::handle_response(resp).await.map(|_| ())
    }
}

fn map_transport_error(e: reqwest::Error) -> PeerError {
    if e.is_timeout() {
        PeerError::TimeoutError(e.to_string())
    } else if e.is_connect() {
        PeerError::ConnectionError(e.to_string())
    } else {
        PeerError::ConnectionError(e.to_string())
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// A `PeerClient` that fails every call with `UnsupportedPeerMethod`,
    /// used where tests only need a table/factory to compile, not a working
    /// transport.
    pub struct NullClient;

    #[async_trait]
    impl PeerClient for NullClient {
        async fn hello(&self) -> Result<HelloResponse, PeerError> {
            Err(PeerError::UnsupportedPeerMethod("hello".to_string()))
        }
        async fn discover(&self, _magnet: &str) -> Result<DiscoveryResult, PeerError> {
            Err(PeerError::UnsupportedPeerMethod("discover".to_string()))
        }
        async fn has_magnet(&self, _magnet: &str) -> Result<bool, PeerError> {
            Err(PeerError::UnsupportedPeerMethod("has_magnet".to_string()))
        }
        async fn download(
            &self,
            _magnet: &str,
            _sink: &mut (dyn AsyncWriteVerified + Send),
        ) -> Result<(), PeerError> {
            Err(PeerError::UnsupportedPeerMethod("download".to_string()))
        }
        async fn upload(
            &self,
            _magnet: &str,
            _content: &mut (dyn AsyncRead + Send + Unpin),
        ) -> Result<(), PeerError> {
            Err(PeerError::UnsupportedPeerMethod("upload".to_string()))
        }
        async fn push(&self, _peers: &[Peer], _magnets: &[String]) -> Result<(), PeerError> {
            Err(PeerError::UnsupportedPeerMethod("push".to_string()))
        }
    }

    /// A `PeerClient` that fails every call with `ConnectionError`, for
    /// exercising the non-protocol-fault path (no penalty, no boost).
    pub struct UnreachableClient;

    #[async_trait]
    impl PeerClient for UnreachableClient {
        async fn hello(&self) -> Result<HelloResponse, PeerError> {
            Err(PeerError::ConnectionError("refused".to_string()))
        }
        async fn discover(&self, _magnet: &str) -> Result<DiscoveryResult, PeerError> {
            Err(PeerError::ConnectionError("refused".to_string()))
        }
        async fn has_magnet(&self, _magnet: &str) -> Result<bool, PeerError> {
            Err(PeerError::ConnectionError("refused".to_string()))
        }
        async fn download(
            &self,
            _magnet: &str,
            _sink: &mut (dyn AsyncWriteVerified + Send),
        ) -> Result<(), PeerError> {
            Err(PeerError::ConnectionError("refused".to_string()))
        }
        async fn upload(
            &self,
            _magnet: &str,
            _content: &mut (dyn AsyncRead + Send + Unpin),
        ) -> Result<(), PeerError> {
            Err(PeerError::ConnectionError("refused".to_string()))
        }
        async fn push(&self, _peers: &[Peer], _magnets: &[String]) -> Result<(), PeerError> {
            Err(PeerError::ConnectionError("refused".to_string()))
        }
    }
}
