use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpStream;

use super::gossip::{Gossip, Reception};
use crate::protocol::{Endpoint, LivenessRequest, PeerMessage};
use crate::transport;

/// Entry point for every inbound peer connection.
///
/// Reads the whole request, then routes liveness probes to the stateless
/// responder and everything else to gossip reception.
pub struct Dispatcher {
    local: Endpoint,
    gossip: Arc<Gossip>,
}

impl Dispatcher {
    pub fn new(local: Endpoint, gossip: Arc<Gossip>) -> Self {
        Self { local, gossip }
    }

    pub async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let request =
            transport::read_message_within(&mut stream, transport::INBOUND_READ_TIMEOUT).await?;

        // Bootstrap checks reachability by connecting and hanging up.
        if request.trim().is_empty() {
            tracing::trace!("Empty connection, ignoring");
            return Ok(());
        }

        match PeerMessage::parse(&request)? {
            PeerMessage::Liveness(probe) => self.answer_probe(&mut stream, &probe).await?,
            PeerMessage::Gossip(envelope) => {
                if let Reception::Accepted { forwarded } = self.gossip.receive(envelope).await {
                    tracing::debug!("Forwarded gossip to {} peers", forwarded);
                }
            }
        }

        Ok(())
    }

    /// Echoes the probe back with our own address, whoever sent it.
    pub async fn answer_probe(
        &self,
        stream: &mut TcpStream,
        probe: &LivenessRequest,
    ) -> Result<()> {
        let reply = probe.reply_from(self.local.clone());
        transport::send(stream, &reply.encode()).await?;
        Ok(())
    }
}
