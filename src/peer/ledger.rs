//! Message Ledger
//!
//! Remembers which gossip payloads this node has already processed, keyed by
//! a SHA-256 fingerprint of the payload alone (sender annotation excluded), so
//! the same message relayed along different paths is recognised as one.

use crate::shutdown::Shutdown;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(payload: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Fingerprint -> time it was first seen.
#[derive(Default)]
pub struct MessageLedger {
    seen: DashMap<Fingerprint, Instant>,
}

impl MessageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `fingerprint` as seen. Returns `true` only for the caller that
    /// marked it first; concurrent callers racing on the same fingerprint see
    /// exactly one `true` because the check and the insert happen under the
    /// same shard lock.
    pub fn mark(&self, fingerprint: Fingerprint) -> bool {
        match self.seen.entry(fingerprint) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                true
            }
        }
    }

    pub fn is_seen(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forgets fingerprints first seen more than `retention` ago.
    pub fn evict_older_than(&self, retention: Duration) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, first_seen| first_seen.elapsed() <= retention);
        before.saturating_sub(self.seen.len())
    }
}

/// Periodically drops expired fingerprints until shutdown.
pub async fn run_eviction(
    ledger: Arc<MessageLedger>,
    retention: Duration,
    every: Duration,
    mut shutdown: Shutdown,
) {
    while shutdown.sleep(every).await {
        let evicted = ledger.evict_older_than(retention);
        if evicted > 0 {
            tracing::debug!(
                "Evicted {} gossip fingerprints ({} retained)",
                evicted,
                ledger.len()
            );
        }
    }
}
