//! Bootstrap / Discovery
//!
//! Runs once at startup: register with a random quorum of seeds, merge the
//! candidate lists they return, and connect-probe candidates in random order
//! until the view is full.
//!
//! Candidates that refuse the connection are not added to the view but are
//! handed back as `unreachable`; the node still runs a failure detector
//! against each so the seeds that listed it eventually hear it is dead.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use std::collections::BTreeSet;

use super::view::PeerView;
use crate::config::SeedSet;
use crate::protocol::messages::{encode_registration, split_peer_list};
use crate::protocol::Endpoint;
use crate::transport;

#[derive(Debug, Default, Clone)]
pub struct BootstrapOutcome {
    /// Seeds that answered our registration.
    pub registered_with: Vec<Endpoint>,
    /// Candidates that accepted a connection and joined the view.
    pub peers: Vec<Endpoint>,
    /// Candidates that refused a connection.
    pub unreachable: Vec<Endpoint>,
}

impl BootstrapOutcome {
    pub fn is_isolated(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Picks `⌊n/2⌋ + 1` distinct seeds uniformly at random.
pub fn select_seeds(seeds: &SeedSet) -> Vec<Endpoint> {
    let mut rng = rand::thread_rng();
    seeds
        .endpoints()
        .choose_multiple(&mut rng, seeds.quorum_size())
        .cloned()
        .collect()
}

/// Registers with each seed in turn and returns the union of the raw
/// candidate entries they sent back, plus the seeds that answered.
pub async fn register_with_seeds(
    local: &Endpoint,
    seeds: &[Endpoint],
) -> Result<(BTreeSet<String>, Vec<Endpoint>)> {
    let registration = encode_registration(local);
    let mut candidates = BTreeSet::new();
    let mut answered = Vec::with_capacity(seeds.len());

    for seed in seeds {
        match transport::exchange(seed, &registration).await {
            Ok(reply) => {
                tracing::debug!("Seed {} returned {:?}", seed, reply);
                candidates.extend(split_peer_list(&reply).map(str::to_string));
                answered.push(seed.clone());
            }
            Err(e) if transport::is_refusal(&e) => {
                tracing::warn!("Seed {} is not reachable, skipping", seed);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("registering with seed {}", seed));
            }
        }
    }

    Ok((candidates, answered))
}

/// Turns raw `host:port` entries into endpoints, dropping garbage and
/// ourselves.
pub fn parse_candidates<'a>(
    raw: impl IntoIterator<Item = &'a String>,
    local: &Endpoint,
) -> Vec<Endpoint> {
    let mut parsed = Vec::new();
    for entry in raw {
        match entry.parse::<Endpoint>() {
            Ok(endpoint) if &endpoint == local => {}
            Ok(endpoint) => {
                if !parsed.contains(&endpoint) {
                    parsed.push(endpoint);
                }
            }
            Err(e) => tracing::warn!("Ignoring bad candidate {:?}: {}", entry, e),
        }
    }
    parsed
}

/// Shuffles `candidates` and connects to each until `view` is full.
///
/// Returns the refused candidates. Candidates after the view fills are never
/// tried.
pub async fn probe_candidates(
    mut candidates: Vec<Endpoint>,
    view: &PeerView,
) -> Result<Vec<Endpoint>> {
    candidates.shuffle(&mut rand::thread_rng());
    let mut unreachable = Vec::new();

    for candidate in candidates {
        if view.len().await >= view.capacity() {
            break;
        }

        match transport::connect(&candidate).await {
            Ok(_stream) => {
                view.insert(candidate).await;
            }
            Err(e) if transport::is_refusal(&e) => {
                tracing::debug!("Candidate {} refused connection", candidate);
                unreachable.push(candidate);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("probing candidate {}", candidate));
            }
        }
    }

    Ok(unreachable)
}

/// Full discovery pass; populates `view` and reports what happened.
pub async fn bootstrap(
    local: &Endpoint,
    seeds: &SeedSet,
    view: &PeerView,
) -> Result<BootstrapOutcome> {
    let selected = select_seeds(seeds);
    tracing::info!(
        "Registering {} with {} of {} seeds",
        local,
        selected.len(),
        seeds.len()
    );

    let (raw, registered_with) = register_with_seeds(local, &selected).await?;
    let candidates = parse_candidates(&raw, local);

    if candidates.is_empty() {
        tracing::info!("No candidates returned, {} starts isolated", local);
        return Ok(BootstrapOutcome {
            registered_with,
            ..Default::default()
        });
    }

    let unreachable = probe_candidates(candidates, view).await?;
    let peers = view.snapshot().await;
    tracing::info!("Connected peers: {:?}", peers);

    Ok(BootstrapOutcome {
        registered_with,
        peers,
        unreachable,
    })
}
