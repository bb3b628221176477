//! Peer table: a capacity-bounded collection indexed by `service_id` and
//! ordered by ascending rating, with a cached remote client per peer.

use std::collections::HashMap;
use std::sync::Arc;

use crate::distance::distance;
use crate::peer::client::PeerClient;
use crate::peer::types::Peer;

/// Default cap on resident peers.
pub const DEFAULT_MAX_PEER_COUNT: usize = 1000;

/// Builds a [`PeerClient`] for a given peer. Kept as a trait object so the
/// table never depends on a concrete transport (HTTP+SOCKS in production,
/// an in-memory stub in tests).
pub trait ClientFactory: Send + Sync {
    fn build(&self, peer: &Peer) -> Arc<dyn PeerClient>;
}

/// Peers indexed by `service_id`, plus a parallel rating-sorted sequence for
/// `peers_by_distance` and capacity control.
pub struct PeerTable {
    max_peer_count: usize,
    peers: HashMap<String, Peer>,
    /// Ascending by rating; ties keep insertion order (stable sort).
    by_rating: Vec<String>,
    clients: HashMap<String, Arc<dyn PeerClient>>,
    factory: Arc<dyn ClientFactory>,
}

impl PeerTable {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self::with_capacity(DEFAULT_MAX_PEER_COUNT, factory)
    }

    pub fn with_capacity(max_peer_count: usize, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            max_peer_count,
            peers: HashMap::new(),
            by_rating: Vec::new(),
            clients: HashMap::new(),
            factory,
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn get(&self, service_id: &str) -> Option<&Peer> {
        self.peers.get(service_id)
    }

    /// Insert or update `peer` by `service_id`; idempotent on repeat inserts
    /// of the same id. Runs capacity control afterwards.
    pub fn add(&mut self, peer: Peer) {
        if self.peers.contains_key(&peer.service_id) {
            return;
        }
        self.by_rating.push(peer.service_id.clone());
        self.peers.insert(peer.service_id.clone(), peer);
        self.resort();
        self.enforce_capacity();
    }

    /// Remove a peer and drop its cached client.
    pub fn remove(&mut self, service_id: &str) {
        self.peers.remove(service_id);
        self.by_rating.retain(|id| id != service_id);
        self.clients.remove(service_id);
    }

    /// Update a peer's rating in place, keeping the rating index sorted.
    pub fn set_rating(&mut self, service_id: &str, rating: f64) {
        if let Some(peer) = self.peers.get_mut(service_id) {
            peer.rating = rating;
        }
        self.resort();
    }

    fn resort(&mut self) {
        let peers = &self.peers;
        self.by_rating
            .sort_by(|a, b| peers[a].rating.partial_cmp(&peers[b].rating).unwrap());
    }

    fn enforce_capacity(&mut self) {
        while self.by_rating.len() > self.max_peer_count {
            let lowest = self.by_rating.remove(0);
            self.peers.remove(&lowest);
            self.clients.remove(&lowest);
        }
    }

    /// Top-`top_k` peers by rating, filtered to `rating > 0.1`, sorted
    /// ascending by distance to `magnet`.
    pub fn peers_by_distance(&self, magnet: &str, top_k: Option<usize>) -> Vec<Peer> {
        let k = top_k.unwrap_or(self.by_rating.len());
        let mut candidates: Vec<Peer> = self
            .by_rating
            .iter()
            .rev()
            .take(k)
            .map(|id| self.peers[id].clone())
            .filter(|peer| peer.rating > 0.1)
            .collect();
        candidates.sort_by(|a, b| {
            distance(&a.service_id, magnet)
                .partial_cmp(&distance(&b.service_id, magnet))
                .unwrap()
        });
        candidates
    }

    /// Cached `PeerClient` for a peer, building and caching one if absent.
    pub fn client_for(&mut self, peer: &Peer) -> Arc<dyn PeerClient> {
        self.clients
            .entry(peer.service_id.clone())
            .or_insert_with(|| self.factory.build(peer))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::client::test_support::NullClient;

    struct NullFactory;
    impl ClientFactory for NullFactory {
        fn build(&self, _peer: &Peer) -> Arc<dyn PeerClient> {
            Arc::new(NullClient)
        }
    }

    fn peer(service_id: &str, rating: f64) -> Peer {
        let mut p = Peer::new(service_id);
        p.rating = rating;
        p
    }

    #[test]
    fn duplicate_add_is_idempotent() {
        let mut table = PeerTable::new(Arc::new(NullFactory));
        table.add(peer("a", 1.0));
        table.add(peer("a", 1.0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn capacity_control_retains_highest_rated() {
        let mut table = PeerTable::with_capacity(3, Arc::new(NullFactory));
        table.add(peer("a", 0.1));
        table.add(peer("b", 0.2));
        table.add(peer("c", 0.3));
        table.add(peer("d", 0.4));
        assert_eq!(table.len(), 3);
        let mut ratings: Vec<f64> = table.by_rating.iter().map(|id| table.peers[id].rating).collect();
        ratings.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ratings, vec![0.2, 0.3, 0.4]);
    }

    #[test]
    fn peers_by_distance_excludes_low_rating_and_sorts_by_distance() {
        let mut table = PeerTable::new(Arc::new(NullFactory));
        table.add(peer("low", 0.05));
        table.add(peer("a", 5.0));
        table.add(peer("b", 5.0));
        let magnet = "13600b294191fc92924bb3ce4b969c1e7e2bab8f4c93c3fc6d0a51733df3c060";
        let ranked = table.peers_by_distance(magnet, None);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|p| p.rating > 0.1));
    }
}
