//! Gossip Disseminator
//!
//! Push-based flooding: every new payload is forwarded once to every peer in
//! the view except the one it came from. The [`MessageLedger`] is what stops
//! the flood; a payload is logged and forwarded only by the first arrival.

use std::sync::Arc;

use super::ledger::{Fingerprint, MessageLedger};
use super::view::PeerView;
use crate::config::NodeConfig;
use crate::event_log::EventLog;
use crate::protocol::messages::timestamp;
use crate::protocol::{Endpoint, GossipEnvelope};
use crate::shutdown::Shutdown;
use crate::transport;

/// What happened to an inbound gossip message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reception {
    /// Already processed; dropped.
    Duplicate,
    /// First sighting; logged and forwarded to this many peers.
    Accepted { forwarded: usize },
}

pub struct Gossip {
    local: Endpoint,
    view: Arc<PeerView>,
    ledger: Arc<MessageLedger>,
    log: EventLog,
    config: NodeConfig,
}

impl Gossip {
    pub fn new(
        local: Endpoint,
        view: Arc<PeerView>,
        ledger: Arc<MessageLedger>,
        log: EventLog,
        config: NodeConfig,
    ) -> Self {
        Self {
            local,
            view,
            ledger,
            log,
            config,
        }
    }

    /// Emits this node's own messages, `timestamp:host:port:seq`, one per
    /// gossip interval. Does nothing for an isolated node. Returns the number
    /// of sends started.
    pub async fn originate(&self, mut shutdown: Shutdown) -> usize {
        if self.view.is_empty().await {
            tracing::info!("{} has no peers, not originating gossip", self.local);
            return 0;
        }

        let mut sends = 0;
        for seq in 1..=self.config.gossip_rounds {
            let payload = format!(
                "{}:{}:{}:{}",
                timestamp(),
                self.local.host,
                self.local.port,
                seq
            );
            sends += self.publish(&payload).await;

            if seq < self.config.gossip_rounds
                && !shutdown.sleep(self.config.gossip_interval()).await
            {
                break;
            }
        }

        tracing::debug!("{} finished originating gossip ({} sends)", self.local, sends);
        sends
    }

    /// Floods a payload originated here. It is marked seen first so the copy
    /// that loops back is dropped.
    pub async fn publish(&self, payload: &str) -> usize {
        self.ledger.mark(Fingerprint::of(payload));
        self.fan_out(payload, None).await
    }

    /// Handles a gossip envelope delivered by the dispatcher.
    pub async fn receive(&self, envelope: GossipEnvelope) -> Reception {
        let fingerprint = Fingerprint::of(&envelope.payload);
        if !self.ledger.mark(fingerprint) {
            tracing::trace!("Dropping duplicate {} from {}", fingerprint, envelope.sender);
            return Reception::Duplicate;
        }

        self.log
            .record(format!("Gossip {} (from {})", envelope.payload, envelope.sender))
            .await;

        let forwarded = self.fan_out(&envelope.payload, Some(&envelope.sender)).await;
        Reception::Accepted { forwarded }
    }

    /// Sends `payload`, annotated with our address, to every peer but
    /// `exclude`. Each send runs on its own task and failures are dropped;
    /// dead targets are the failure detector's business.
    async fn fan_out(&self, payload: &str, exclude: Option<&Endpoint>) -> usize {
        let line = GossipEnvelope::new(payload, self.local.clone()).encode();
        let targets: Vec<Endpoint> = self
            .view
            .snapshot()
            .await
            .into_iter()
            .filter(|peer| Some(peer) != exclude)
            .collect();

        for target in &targets {
            let target = target.clone();
            let line = line.clone();
            tokio::spawn(async move {
                if let Err(e) = transport::notify(&target, &line).await {
                    tracing::debug!("Gossip to {} failed: {}", target, e);
                }
            });
        }

        targets.len()
    }
}
