use anyhow::Result;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::info;

use super::table::SeedMembershipTable;
use crate::event_log::{EventLog, EventSink};
use crate::protocol::messages::encode_peer_list;
use crate::protocol::{DeadNodeReport, Endpoint, SeedRequest};
use crate::shutdown::Shutdown;
use crate::transport;

/// One rendezvous registry listening on its own endpoint.
pub struct SeedRegistry {
    pub endpoint: Endpoint,
    pub table: SeedMembershipTable,
    listener: TcpListener,
    log: EventLog,
}

impl SeedRegistry {
    /// Binds the registry. Port `0` picks a free port; `endpoint` then
    /// carries the port actually bound.
    pub async fn new(endpoint: Endpoint, sink: Arc<EventSink>) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(endpoint.addr()).await?;
        let endpoint = Endpoint::new(endpoint.host, listener.local_addr()?.port());

        info!("Seed registry listening on {}", endpoint);

        Ok(Arc::new(Self {
            log: EventLog::new(endpoint.clone(), sink),
            endpoint,
            table: SeedMembershipTable::new(),
            listener,
        }))
    }

    /// Accepts connections until shutdown; each one is served on its own task.
    pub async fn run(self: Arc<Self>, mut shutdown: Shutdown) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, src)) => {
                        let registry = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = registry.handle_connection(stream).await {
                                tracing::warn!(
                                    "Seed {}: connection from {} failed: {}",
                                    registry.endpoint,
                                    src,
                                    e
                                );
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

        info!("Seed registry {} stopped", self.endpoint);
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let request =
            transport::read_message_within(&mut stream, transport::INBOUND_READ_TIMEOUT).await?;

        match SeedRequest::parse(&request) {
            Ok(SeedRequest::Register(peer)) => self.register_peer(&mut stream, peer).await?,
            Ok(SeedRequest::DeadNode(report)) => self.report_dead_node(report).await,
            Err(e) => {
                tracing::warn!(
                    "Seed {}: invalid message received ({}): {:?}",
                    self.endpoint,
                    e,
                    request
                );
            }
        }

        Ok(())
    }

    /// Answers with the members known *before* `peer` joins, then records it.
    ///
    /// The reply is written before the append, so two peers registering at the
    /// same time may or may not learn about each other.
    pub async fn register_peer(&self, stream: &mut TcpStream, peer: Endpoint) -> Result<()> {
        let known = self.table.snapshot_for(&peer).await;
        transport::send(stream, &encode_peer_list(&known)).await?;

        if self.table.append(peer.clone()).await {
            self.log.record(format!("Peer Addition: {}", peer)).await;
        } else {
            tracing::debug!("Seed {}: {} registered again", self.endpoint, peer);
        }

        Ok(())
    }

    /// Drops the reported node if this seed still lists it.
    pub async fn report_dead_node(&self, report: DeadNodeReport) {
        if self.table.remove(&report.dead).await {
            self.log
                .record(format!(
                    "Dead Node {} reported by {}",
                    report.dead, report.reporter
                ))
                .await;
        } else {
            self.log
                .record(format!(
                    "Dead Node {} reported by {} (not registered, ignored)",
                    report.dead, report.reporter
                ))
                .await;
        }
    }
}
