//! Bounded-depth greedy discovery walk and sequential upload distribution.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::PeerError;
use crate::peer::client::AsyncWriteVerified;
use crate::peer::table::PeerTable;
use crate::peer::types::{DiscoveryOutcome, DiscoveryState, Peer};

/// Default search depth.
pub const DEFAULT_MAX_DEPTH: usize = 25;

/// Positive feedback multiplier on a successful remote call.
const RATING_BOOST: f64 = 2.0;
/// Negative feedback divisor on a protocol/transport fault.
const RATING_PENALTY: f64 = 4.0;

/// Walk the peer table outward from `magnet`, querying each candidate in
/// distance order, until a holder is found or `max_depth` is exhausted.
///
/// On each candidate: `rating` doubles when `discover` succeeds, quarters on
/// an invalid response, unsupported method, proxy error, or timeout, and is
/// left unchanged on any other transport fault (e.g. a connection failure).
/// New peers surfaced by `discover` are folded into the table if unseen.
/// Ties are broken by `peers_by_distance`'s own stable ordering.
pub async fn discover(
    table: &mut PeerTable,
    magnet: &str,
    state: &mut DiscoveryState,
    max_depth: usize,
) -> DiscoveryOutcome {
    for depth in 0..=max_depth {
        let candidates = table.peers_by_distance(magnet, None);
        if candidates.is_empty() {
            break;
        }

        for peer in candidates {
            if state.is_visited(&peer.service_id) {
                continue;
            }
            state.mark_visited(&peer.service_id);

            let client = table.client_for(&peer);

            let (has_magnet, discover_result) =
                futures::join!(client.has_magnet(magnet), client.discover(magnet));

            match (&has_magnet, &discover_result) {
                (Err(e), _) | (_, Err(e)) if is_protocol_fault(e) => {
                    let penalised = peer.rating / RATING_PENALTY;
                    table.set_rating(&peer.service_id, penalised);
                    debug!(peer = %peer.service_id, rating = penalised, "discovery fault, penalised");
                    continue;
                }
                _ => {}
            }

            if discover_result.is_err() {
                debug!(peer = %peer.service_id, "discovery round-trip failed, rating unchanged");
                continue;
            }

            let boosted = peer.rating * RATING_BOOST;
            table.set_rating(&peer.service_id, boosted);

            if let Ok(result) = discover_result {
                for candidate in result.matching.into_iter().chain(result.near.into_iter()) {
                    if table.get(&candidate.service_id).is_none() {
                        table.add(candidate);
                    }
                }
            }

            if matches!(has_magnet, Ok(true)) {
                return DiscoveryOutcome::Found {
                    download_url: format!("content://{}", peer.content_host()),
                    peer,
                };
            }
        }

        debug!(depth, "discovery depth exhausted without a holder");
    }

    warn!(magnet, "discovery reached depth limit without finding a holder");
    DiscoveryOutcome::Failed
}

fn is_protocol_fault(e: &PeerError) -> bool {
    matches!(
        e,
        PeerError::InvalidPeerResponse(_)
            | PeerError::ProxyError(_)
            | PeerError::TimeoutError(_)
            | PeerError::UnsupportedPeerMethod(_)
    )
}

/// Attempt streamed uploads of `content` sequentially to peers ranked near
/// `magnet`, until `success_threshold` uploads succeed or the candidate list
/// is exhausted. If no peers are known yet, poll every `poll_interval` until
/// some appear.
pub async fn distribute(
    table: &mut PeerTable,
    magnet: &str,
    mut content: impl FnMut() -> Box<dyn tokio::io::AsyncRead + Send + Unpin>,
    success_threshold: usize,
    poll_interval: Duration,
) -> usize {
    let candidates = loop {
        let candidates = table.peers_by_distance(magnet, None);
        if !candidates.is_empty() {
            break candidates;
        }
        warn!(magnet, "no peers known, waiting to retry distribution");
        sleep(poll_interval).await;
    };

    let mut success_count = 0;
    for peer in candidates {
        if success_count >= success_threshold {
            break;
        }
        let client = table.client_for(&peer);
        let mut reader = content();
        match client.upload(magnet, reader.as_mut()).await {
            Ok(()) => success_count += 1,
            Err(e) => warn!(peer = %peer.service_id, error = %e, "upload failed"),
        }
    }

    success_count
}

/// Marker trait alias so `download` sinks can be passed without pulling the
/// full `PeerClient` trait into discovery callers.
pub trait DownloadSink: AsyncWriteVerified + Send {}
impl<T: AsyncWriteVerified + Send> DownloadSink for T {}
