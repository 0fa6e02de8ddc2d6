use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use super::bootstrap::{self, BootstrapOutcome};
use super::dispatcher::Dispatcher;
use super::gossip::Gossip;
use super::ledger::{self, MessageLedger};
use super::liveness::{DetectorExit, FailureDetector};
use super::view::PeerView;
use crate::config::{NodeConfig, SeedSet};
use crate::event_log::{EventLog, EventSink};
use crate::protocol::Endpoint;
use crate::shutdown::Shutdown;
use crate::transport;

/// A gossiping peer: listener, shared state and every background loop.
pub struct PeerNode {
    pub endpoint: Endpoint,
    pub seeds: SeedSet,
    pub config: NodeConfig,
    pub view: Arc<PeerView>,
    pub ledger: Arc<MessageLedger>,
    pub gossip: Arc<Gossip>,
    log: EventLog,
    dispatcher: Arc<Dispatcher>,
    listener: TcpListener,
}

impl PeerNode {
    /// Binds the listening socket. Port `0` picks a free port; `endpoint`
    /// then carries the port actually bound.
    pub async fn new(
        endpoint: Endpoint,
        seeds: SeedSet,
        config: NodeConfig,
        sink: Arc<EventSink>,
    ) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(endpoint.addr()).await?;
        let endpoint = Endpoint::new(endpoint.host, listener.local_addr()?.port());

        let log = EventLog::new(endpoint.clone(), sink);
        let view = Arc::new(PeerView::new(config.max_peers));
        let ledger = Arc::new(MessageLedger::new());
        let gossip = Arc::new(Gossip::new(
            endpoint.clone(),
            view.clone(),
            ledger.clone(),
            log.clone(),
            config.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(endpoint.clone(), gossip.clone()));

        info!("Peer listening on {}", endpoint);

        Ok(Arc::new(Self {
            endpoint,
            seeds,
            config,
            view,
            ledger,
            gossip,
            log,
            dispatcher,
            listener,
        }))
    }

    /// Bootstraps, then runs until `shutdown` fires and every loop has
    /// wound down. Only a bootstrap fault is returned as an error.
    pub async fn run(self: Arc<Self>, shutdown: Shutdown) -> Result<()> {
        // Serve probes and gossip while bootstrap is still running.
        let accept = tokio::spawn(self.clone().accept_loop(shutdown.clone()));

        let outcome = match bootstrap::bootstrap(&self.endpoint, &self.seeds, &self.view).await {
            Ok(outcome) => outcome,
            Err(e) => {
                accept.abort();
                return Err(e);
            }
        };

        let mut tasks = vec![accept];
        self.start_background(&outcome, &mut tasks, &shutdown);

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("{}: background task failed: {}", self.endpoint, e);
            }
        }

        info!("Peer {} stopped", self.endpoint);
        Ok(())
    }

    fn start_background(
        self: &Arc<Self>,
        outcome: &BootstrapOutcome,
        tasks: &mut Vec<JoinHandle<()>>,
        shutdown: &Shutdown,
    ) {
        let gossip = self.gossip.clone();
        let gossip_shutdown = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            gossip.originate(gossip_shutdown).await;
        }));

        // Unreachable candidates are monitored too, so their seeds learn
        // they are gone, even though we never gossip to them.
        for target in outcome.peers.iter().chain(&outcome.unreachable) {
            let detector = self.failure_detector(target.clone());
            let detector_shutdown = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                let target = detector.target().clone();
                if detector.run(detector_shutdown).await == DetectorExit::Reported {
                    tracing::info!("Stopped monitoring {}", target);
                }
            }));
        }

        if let Some(retention) = self.config.ledger_retention() {
            tasks.push(tokio::spawn(ledger::run_eviction(
                self.ledger.clone(),
                retention,
                self.config.ledger_sweep_interval(),
                shutdown.clone(),
            )));
        }
    }

    pub fn failure_detector(&self, target: Endpoint) -> FailureDetector {
        FailureDetector::new(
            self.endpoint.clone(),
            target,
            self.seeds.clone(),
            self.view.clone(),
            self.log.clone(),
            self.config.clone(),
        )
    }

    async fn accept_loop(self: Arc<Self>, mut shutdown: Shutdown) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, src)) => {
                        let dispatcher = self.dispatcher.clone();
                        tokio::spawn(async move {
                            if let Err(e) = dispatcher.handle_connection(stream).await {
                                tracing::warn!("Dropping connection from {}: {}", src, e);
                            }
                        });
                    }
                    Err(e) => {
                        let resume = transport::back_off_after_accept_error(
                            &self.endpoint,
                            &e,
                            &mut shutdown,
                        )
                        .await;
                        if !resume {
                            break;
                        }
                    }
                },
                _ = shutdown.triggered() => break,
            }
        }

        tracing::debug!("{} stopped accepting connections", self.endpoint);
    }
}
