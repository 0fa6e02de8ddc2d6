use crate::protocol::Endpoint;
use tokio::sync::RwLock;

/// The peers a node gossips with.
///
/// Filled once by bootstrap and only shrinks afterwards, when a failure
/// detector confirms a death. Read by every fan-out and written by detectors
/// concurrently, hence the lock.
pub struct PeerView {
    peers: RwLock<Vec<Endpoint>>,
    capacity: usize,
}

impl PeerView {
    pub fn new(capacity: usize) -> Self {
        Self {
            peers: RwLock::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Adds `peer` unless it is already tracked or the view is full.
    pub async fn insert(&self, peer: Endpoint) -> bool {
        let mut peers = self.peers.write().await;
        if peers.len() >= self.capacity || peers.contains(&peer) {
            return false;
        }
        peers.push(peer);
        true
    }

    /// Stops tracking `peer`; `false` if it was not tracked.
    pub async fn remove(&self, peer: &Endpoint) -> bool {
        let mut peers = self.peers.write().await;
        match peers.iter().position(|p| p == peer) {
            Some(index) => {
                peers.remove(index);
                true
            }
            None => false,
        }
    }

    pub async fn contains(&self, peer: &Endpoint) -> bool {
        self.peers.read().await.contains(peer)
    }

    /// Copy of the current peers, so fan-out never holds the lock across sends.
    pub async fn snapshot(&self) -> Vec<Endpoint> {
        self.peers.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}
