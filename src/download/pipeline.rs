//! Download pipeline: discovery → streamed download → verify → install.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::bus::{BusEvent, EventBus};
use crate::download::types::{Download, DownloadStatus};
use crate::error::{PeerError, StoreError};
use crate::peer::client::AsyncWriteVerified;
use crate::peer::discovery::{discover, DEFAULT_MAX_DEPTH};
use crate::peer::types::DiscoveryOutcome;
use crate::peer::{DiscoveryState, PeerTable};
use crate::store::ContentStore;

/// Bridges the push-based `PeerClient::download` sink contract onto
/// `ContentStore::store`'s pull-based `AsyncRead` writer by piping chunks
/// through an in-memory duplex stream while the store task hashes and
/// writes them to a temp path.
struct StoreSink {
    magnet: String,
    writer: Option<DuplexStream>,
    result_rx: Option<oneshot::Receiver<Result<std::path::PathBuf, StoreError>>>,
}

impl StoreSink {
    fn new(store: ContentStore, magnet: &str) -> Self {
        let (writer, reader) = tokio::io::duplex(64 * 1024);
        let (tx, rx) = oneshot::channel();
        let owned_magnet = magnet.to_string();
        tokio::spawn(async move {
            let result = store.store(&owned_magnet, reader).await;
            let _ = tx.send(result);
        });
        Self {
            magnet: magnet.to_string(),
            writer: Some(writer),
            result_rx: Some(rx),
        }
    }
}

#[async_trait]
impl AsyncWriteVerified for StoreSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), PeerError> {
        let writer = self
            .writer
            .as_mut()
            .expect("write_chunk called after finish");
        writer
            .write_all(chunk)
            .await
            .map_err(|e| PeerError::DownloadError {
                magnet: self.magnet.clone(),
                message: e.to_string(),
            })
    }

    async fn finish(&mut self, expected_magnet: &str) -> Result<(), PeerError> {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        let rx = self
            .result_rx
            .take()
            .expect("finish called more than once");
        match rx.await {
            Ok(Ok(_path)) => Ok(()),
            Ok(Err(StoreError::InvalidChecksum { magnet, observed })) => {
                Err(PeerError::InvalidChecksum { magnet, observed })
            }
            Ok(Err(e)) => Err(PeerError::DownloadError {
                magnet: expected_magnet.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(PeerError::DownloadError {
                magnet: expected_magnet.to_string(),
                message: "store task terminated before reporting a result".to_string(),
            }),
        }
    }
}

/// Drives magnets through `PENDING → DISCOVERY → DOWNLOAD → FINISHED/FAILED`,
/// de-duplicating so at most one download is in flight per magnet at a time.
pub struct DownloadPipeline {
    table: PeerTable,
    store: ContentStore,
    bus: EventBus,
    in_flight: HashSet<String>,
    max_depth: usize,
}

impl DownloadPipeline {
    pub fn new(table: PeerTable, store: ContentStore, bus: EventBus) -> Self {
        Self {
            table,
            store,
            bus,
            in_flight: HashSet::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Enqueue `magnet` for download. Returns `false` without effect if a
    /// download for this magnet is already pending or active.
    pub fn enqueue(&mut self, magnet: &str) -> bool {
        self.in_flight.insert(magnet.to_string())
    }

    /// Run one magnet through the pipeline to a terminal state.
    pub async fn run(&mut self, magnet: &str) -> Download {
        let mut download = Download::new(magnet);
        let mut state = DiscoveryState::new();

        loop {
            download.status = DownloadStatus::Discovery;
            self.bus
                .emit(BusEvent::DiscoveryRequested { magnet: magnet.to_string() })
                .await;

            let outcome = discover(&mut self.table, magnet, &mut state, self.max_depth).await;
            let (peer, download_url) = match outcome {
                DiscoveryOutcome::Failed => {
                    download.status = DownloadStatus::Failed;
                    self.bus
                        .emit(BusEvent::DiscoveryFailed { magnet: magnet.to_string() })
                        .await;
                    self.in_flight.remove(magnet);
                    return download;
                }
                DiscoveryOutcome::Found { peer, download_url } => (peer, download_url),
            };

            self.bus
                .emit(BusEvent::DiscoveryFinished {
                    magnet: magnet.to_string(),
                    peer: peer.clone(),
                    download_url,
                })
                .await;

            download.status = DownloadStatus::Download;
            download.peer = Some(peer.clone());

            let client = self.table.client_for(&peer);
            let mut sink = StoreSink::new(self.store.clone(), magnet);

            match client.download(magnet, &mut sink).await {
                Ok(()) => {
                    download.status = DownloadStatus::Finished;
                    self.bus
                        .emit(BusEvent::DownloadFinished { magnet: magnet.to_string() })
                        .await;
                    self.in_flight.remove(magnet);
                    return download;
                }
                Err(PeerError::InvalidChecksum { observed, .. }) => {
                    warn!(magnet, peer = %peer.service_id, observed, "checksum mismatch, re-entering discovery");
                    let penalised = peer.rating / 4.0;
                    self.table.set_rating(&peer.service_id, penalised);
                    self.bus
                        .emit(BusEvent::PeerRatingUpdated { service_id: peer.service_id.clone(), rating: penalised })
                        .await;
                }
                Err(PeerError::DownloadError { message, .. }) => {
                    info!(magnet, peer = %peer.service_id, message, "transport fault, re-entering discovery");
                }
                Err(e) => {
                    warn!(magnet, error = %e, "unrecoverable pipeline fault");
                    download.status = DownloadStatus::Failed;
                    self.in_flight.remove(magnet);
                    return download;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::client::{HelloResponse, PeerClient};
    use crate::peer::types::{DiscoveryResult, Peer};
    use crate::peer::ClientFactory;
    use std::sync::Arc;
    use tokio::io::AsyncRead;

    struct HolderClient {
        magnet: String,
        content: Vec<u8>,
    }

    #[async_trait]
    impl PeerClient for HolderClient {
        async fn hello(&self) -> Result<HelloResponse, PeerError> {
            Ok(HelloResponse::default())
        }
        async fn discover(&self, _magnet: &str) -> Result<DiscoveryResult, PeerError> {
            Ok(DiscoveryResult::default())
        }
        async fn has_magnet(&self, magnet: &str) -> Result<bool, PeerError> {
            Ok(magnet == self.magnet)
        }
        async fn download(
            &self,
            _magnet: &str,
            sink: &mut (dyn AsyncWriteVerified + Send),
        ) -> Result<(), PeerError> {
            sink.write_chunk(&self.content).await?;
            sink.finish(&self.magnet).await
        }
        async fn upload(
            &self,
            _magnet: &str,
            _content: &mut (dyn AsyncRead + Send + Unpin),
        ) -> Result<(), PeerError> {
            Ok(())
        }
        async fn push(&self, _peers: &[Peer], _magnets: &[String]) -> Result<(), PeerError> {
            Ok(())
        }
    }

    struct HolderFactory {
        magnet: String,
        content: Vec<u8>,
    }
    impl ClientFactory for HolderFactory {
        fn build(&self, _peer: &Peer) -> Arc<dyn PeerClient> {
            Arc::new(HolderClient {
                magnet: self.magnet.clone(),
                content: self.content.clone(),
            })
        }
    }

    #[tokio::test]
    async fn happy_path_installs_content_at_its_own_magnet() {
        use sha3::{Digest, Keccak256};

        let content = b"hello bundle".to_vec();
        let mut hasher = Keccak256::new();
        hasher.update(&content);
        let magnet = hex::encode(hasher.finalize());

        let factory = Arc::new(HolderFactory { magnet: magnet.clone(), content: content.clone() });
        let mut table = PeerTable::new(factory);
        let mut holder = Peer::new("p3");
        holder.rating = 1.0;
        table.add(holder);

        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        let mut pipeline = DownloadPipeline::new(table, store.clone(), EventBus::new());
        pipeline.enqueue(&magnet);

        let download = pipeline.run(&magnet).await;
        assert_eq!(download.status, DownloadStatus::Finished);

        let installed = tokio::fs::read(store.absolute_path(&magnet).unwrap()).await.unwrap();
        assert_eq!(installed, content);
    }
}
