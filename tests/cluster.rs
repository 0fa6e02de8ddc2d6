//! Loopback cluster tests: real seeds and peers over TCP.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use gossip_membership::config::{NodeConfig, SeedSet};
use gossip_membership::event_log::EventSink;
use gossip_membership::peer::PeerNode;
use gossip_membership::protocol::Endpoint;
use gossip_membership::seed::SeedRegistry;
use gossip_membership::shutdown::{self, Shutdown, ShutdownTrigger};

const WAIT: Duration = Duration::from_secs(10);

fn loopback() -> Endpoint {
    Endpoint::new("127.0.0.1", 0)
}

struct Seeds {
    registries: Vec<Arc<SeedRegistry>>,
    sink: Arc<EventSink>,
    set: SeedSet,
}

async fn start_seeds(count: usize, shutdown: &Shutdown) -> Seeds {
    let sink = EventSink::memory();
    let mut registries = Vec::new();
    for _ in 0..count {
        let registry = SeedRegistry::new(loopback(), sink.clone()).await.unwrap();
        tokio::spawn(registry.clone().run(shutdown.clone()));
        registries.push(registry);
    }

    let set = SeedSet::new(registries.iter().map(|r| r.endpoint.clone()).collect());
    Seeds {
        registries,
        sink,
        set,
    }
}

impl Seeds {
    async fn holding(&self, peer: &Endpoint) -> usize {
        let mut count = 0;
        for registry in &self.registries {
            if registry.table.members().await.contains(peer) {
                count += 1;
            }
        }
        count
    }
}

/// Starts a peer and waits until a quorum of seeds has registered it, then
/// gives the candidate probes a moment to settle.
async fn start_peer(
    seeds: &Seeds,
    config: &NodeConfig,
    shutdown: Shutdown,
) -> (Arc<PeerNode>, Arc<EventSink>) {
    let sink = EventSink::memory();
    let node = PeerNode::new(loopback(), seeds.set.clone(), config.clone(), sink.clone())
        .await
        .unwrap();
    tokio::spawn(node.clone().run(shutdown));

    let quorum = seeds.set.quorum_size();
    tokio::time::timeout(WAIT, async {
        while seeds.holding(&node.endpoint).await < quorum {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("peer never registered with a quorum of seeds");
    tokio::time::sleep(Duration::from_millis(200)).await;

    (node, sink)
}

async fn gossip_lines(sink: &EventSink, payload: &str) -> usize {
    let needle = format!("Gossip {} (from ", payload);
    sink.lines()
        .await
        .iter()
        .filter(|line| line.contains(&needle))
        .count()
}

// ============================================================================
// Flooding
// ============================================================================

#[tokio::test]
async fn gossip_reaches_every_peer_reachable_through_views_once() {
    let (_trigger, shutdown): (ShutdownTrigger, Shutdown) = shutdown::channel();
    let config = NodeConfig {
        gossip_rounds: 0,
        liveness_interval_ms: 60_000,
        probe_timeout_ms: 1_000,
        ..NodeConfig::default()
    };

    let seeds = start_seeds(3, &shutdown).await;
    let mut nodes = Vec::new();
    for _ in 0..5 {
        nodes.push(start_peer(&seeds, &config, shutdown.clone()).await);
    }

    // Every later peer shares at least one seed with every earlier one, so
    // the last node knows somebody.
    let (origin, origin_sink) = nodes.last().unwrap().clone();
    assert!(!origin.view.is_empty().await);

    let mut views: HashMap<Endpoint, Vec<Endpoint>> = HashMap::new();
    for (node, _) in &nodes {
        views.insert(node.endpoint.clone(), node.view.snapshot().await);
    }

    let mut reachable = BTreeSet::new();
    let mut queue = VecDeque::from([origin.endpoint.clone()]);
    while let Some(current) = queue.pop_front() {
        for next in views.get(&current).into_iter().flatten() {
            if *next != origin.endpoint && reachable.insert(next.clone()) {
                queue.push_back(next.clone());
            }
        }
    }
    assert!(!reachable.is_empty());

    origin.gossip.publish("cluster-message").await;

    tokio::time::timeout(WAIT, async {
        loop {
            let mut delivered = 0;
            for (node, sink) in &nodes {
                if reachable.contains(&node.endpoint)
                    && gossip_lines(sink, "cluster-message").await > 0
                {
                    delivered += 1;
                }
            }
            if delivered == reachable.len() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("gossip did not reach every reachable peer");

    // Let any late duplicates land before counting.
    tokio::time::sleep(Duration::from_millis(300)).await;

    for (node, sink) in &nodes {
        let expected = usize::from(reachable.contains(&node.endpoint));
        assert_eq!(
            gossip_lines(sink, "cluster-message").await,
            expected,
            "unexpected gossip count at {}",
            node.endpoint
        );
    }
    assert_eq!(gossip_lines(&origin_sink, "cluster-message").await, 0);
}

// ============================================================================
// Failure Detection
// ============================================================================

#[tokio::test]
async fn stopped_peer_is_dropped_by_seeds_and_neighbours() {
    let (_seed_trigger, seed_shutdown) = shutdown::channel();
    let config = NodeConfig {
        gossip_rounds: 0,
        liveness_interval_ms: 50,
        probe_timeout_ms: 200,
        ..NodeConfig::default()
    };

    let seeds = start_seeds(3, &seed_shutdown).await;

    let (victim_trigger, victim_shutdown) = shutdown::channel();
    let victim_endpoint = {
        let (victim, _) = start_peer(&seeds, &config, victim_shutdown).await;
        victim.endpoint.clone()
    };

    let (_watcher_trigger, watcher_shutdown) = shutdown::channel();
    let (watcher, _) = start_peer(&seeds, &config, watcher_shutdown).await;
    assert!(watcher.view.contains(&victim_endpoint).await);

    // The victim's listener closes once its run loop returns.
    victim_trigger.trigger();

    tokio::time::timeout(WAIT, async {
        while seeds.holding(&victim_endpoint).await > 0
            || watcher.view.contains(&victim_endpoint).await
        {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("dead peer was never removed");

    let report = format!(
        "Dead Node {} reported by {}",
        victim_endpoint, watcher.endpoint
    );
    let lines = seeds.sink.lines().await;
    assert!(lines.iter().any(|line| line.contains(&report)));
    assert!(seeds.holding(&watcher.endpoint).await >= seeds.set.quorum_size());
}
