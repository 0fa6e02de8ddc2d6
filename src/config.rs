//! Node configuration.
//!
//! Two sources: the static seed list shared by every process of a deployment,
//! and the per-node protocol timings (defaults follow the protocol's fixed
//! cadence; tests shrink them to milliseconds).

use crate::protocol::Endpoint;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// The fixed list of seed registries, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeedSet(Vec<Endpoint>);

impl SeedSet {
    pub fn new(seeds: Vec<Endpoint>) -> Self {
        Self(seeds)
    }

    /// Parses one seed per line, written either `host port` or `host:port`.
    /// Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut seeds: Vec<Endpoint> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let endpoint = match line.split_whitespace().collect::<Vec<_>>().as_slice() {
                [host, port] => Endpoint::from_parts(host, port),
                [addr] => addr.parse(),
                _ => bail!("line {}: expected `host port`, got {:?}", index + 1, line),
            }
            .with_context(|| format!("line {}: invalid seed {:?}", index + 1, line))?;

            if !seeds.contains(&endpoint) {
                seeds.push(endpoint);
            }
        }

        Ok(Self(seeds))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading seed list {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of seeds a joining peer registers with: `⌊n/2⌋ + 1`.
    pub fn quorum_size(&self) -> usize {
        if self.0.is_empty() {
            0
        } else {
            self.0.len() / 2 + 1
        }
    }
}

/// Protocol timings and limits for a peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Pause between self-originated gossip messages.
    pub gossip_interval_ms: u64,
    /// Number of self-originated gossip messages.
    pub gossip_rounds: u32,
    /// Pause between liveness probes of one peer.
    pub liveness_interval_ms: u64,
    /// Consecutive failed probes before a peer is reported dead.
    pub failure_threshold: u32,
    /// PeerView size cap at bootstrap.
    pub max_peers: usize,
    /// Bound on a single probe exchange; exceeding it counts as a failure.
    pub probe_timeout_ms: u64,
    /// Age after which a gossip fingerprint may be forgotten. `None` keeps
    /// every fingerprint for the node's lifetime.
    pub ledger_retention_ms: Option<u64>,
    /// How often expired fingerprints are swept when retention is enabled.
    pub ledger_sweep_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            gossip_interval_ms: 5_000,
            gossip_rounds: 10,
            liveness_interval_ms: 13_000,
            failure_threshold: 3,
            max_peers: 4,
            probe_timeout_ms: 13_000,
            ledger_retention_ms: None,
            ledger_sweep_interval_ms: 60_000,
        }
    }
}

impl NodeConfig {
    /// Reads a JSON settings file; missing fields keep their defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading settings {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parsing settings {}", path.display()))?;
        Ok(config)
    }

    pub fn gossip_interval(&self) -> Duration {
        Duration::from_millis(self.gossip_interval_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn ledger_retention(&self) -> Option<Duration> {
        self.ledger_retention_ms.map(Duration::from_millis)
    }

    pub fn ledger_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.ledger_sweep_interval_ms)
    }
}
