//! Text encodings of every message exchanged between peers and seeds.
//!
//! All messages are single lines of colon (or semicolon, for gossip) delimited
//! fields, terminated by the sender half-closing its side of the connection.

use super::types::Endpoint;
use crate::error::ProtocolError;
use std::time::{SystemTime, UNIX_EPOCH};

pub const TAG_NEW_NODE: &str = "New Node";
pub const TAG_DEAD_NODE: &str = "Dead Node";
pub const TAG_LIVENESS_REQUEST: &str = "Liveness Request";
pub const TAG_LIVENESS_REPLY: &str = "Liveness Reply";

/// Current wall-clock time as Unix seconds with microsecond precision.
///
/// Used both as probe correlation value and as gossip payload prefix, so it
/// must never contain a field delimiter.
pub fn timestamp() -> String {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", elapsed.as_secs(), elapsed.subsec_micros())
}

fn fields<'a>(
    text: &'a str,
    kind: &'static str,
    expected: usize,
) -> Result<Vec<&'a str>, ProtocolError> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() != expected {
        return Err(ProtocolError::FieldCount {
            kind,
            expected,
            actual: parts.len(),
        });
    }
    if parts[0] != kind {
        return Err(ProtocolError::UnknownTag(parts[0].to_string()));
    }
    Ok(parts)
}

/// Requests understood by a seed registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedRequest {
    Register(Endpoint),
    DeadNode(DeadNodeReport),
}

impl SeedRequest {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ProtocolError::Empty);
        }

        match text.split(':').next().unwrap_or_default() {
            TAG_NEW_NODE => {
                let parts = fields(text, TAG_NEW_NODE, 3)?;
                Ok(Self::Register(Endpoint::from_parts(parts[1], parts[2])?))
            }
            TAG_DEAD_NODE => Ok(Self::DeadNode(DeadNodeReport::parse(text)?)),
            other => Err(ProtocolError::UnknownTag(other.to_string())),
        }
    }
}

/// Registration line sent by a peer to a seed.
pub fn encode_registration(endpoint: &Endpoint) -> String {
    format!("{}:{}:{}", TAG_NEW_NODE, endpoint.host, endpoint.port)
}

/// Body of a registration reply: the seed's known peers, comma separated.
pub fn encode_peer_list(peers: &[Endpoint]) -> String {
    peers
        .iter()
        .map(|peer| peer.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Splits a registration reply into its raw `host:port` entries.
///
/// Empty entries (empty reply, trailing commas) are skipped; parsing each entry
/// is left to the caller so it can merge raw strings across seeds first.
pub fn split_peer_list(reply: &str) -> impl Iterator<Item = &str> {
    reply
        .trim()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

/// `Dead Node:<deadHost>:<deadPort>:<ts>:<reporterHost>:<reporterPort>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadNodeReport {
    pub dead: Endpoint,
    pub timestamp: String,
    pub reporter: Endpoint,
}

impl DeadNodeReport {
    pub fn new(dead: Endpoint, reporter: Endpoint) -> Self {
        Self {
            dead,
            timestamp: timestamp(),
            reporter,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            TAG_DEAD_NODE,
            self.dead.host,
            self.dead.port,
            self.timestamp,
            self.reporter.host,
            self.reporter.port
        )
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let parts = fields(text, TAG_DEAD_NODE, 6)?;
        Ok(Self {
            dead: Endpoint::from_parts(parts[1], parts[2])?,
            timestamp: parts[3].to_string(),
            reporter: Endpoint::from_parts(parts[4], parts[5])?,
        })
    }
}

/// `Liveness Request:<ts>:<host>:<port>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessRequest {
    pub timestamp: String,
    pub requester: Endpoint,
}

impl LivenessRequest {
    pub fn new(requester: Endpoint) -> Self {
        Self {
            timestamp: timestamp(),
            requester,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            TAG_LIVENESS_REQUEST, self.timestamp, self.requester.host, self.requester.port
        )
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let parts = fields(text, TAG_LIVENESS_REQUEST, 4)?;
        Ok(Self {
            timestamp: parts[1].to_string(),
            requester: Endpoint::from_parts(parts[2], parts[3])?,
        })
    }

    /// The reply `replier` must send back for this probe.
    pub fn reply_from(&self, replier: Endpoint) -> LivenessReply {
        LivenessReply {
            timestamp: self.timestamp.clone(),
            requester: self.requester.clone(),
            replier,
        }
    }
}

/// `Liveness Reply:<ts>:<reqHost>:<reqPort>:<replyHost>:<replyPort>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessReply {
    pub timestamp: String,
    pub requester: Endpoint,
    pub replier: Endpoint,
}

impl LivenessReply {
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            TAG_LIVENESS_REPLY,
            self.timestamp,
            self.requester.host,
            self.requester.port,
            self.replier.host,
            self.replier.port
        )
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let parts = fields(text, TAG_LIVENESS_REPLY, 6)?;
        Ok(Self {
            timestamp: parts[1].to_string(),
            requester: Endpoint::from_parts(parts[2], parts[3])?,
            replier: Endpoint::from_parts(parts[4], parts[5])?,
        })
    }

    /// True only when all five correlation fields match the outstanding probe
    /// and the endpoint that was probed.
    pub fn answers(&self, probe: &LivenessRequest, target: &Endpoint) -> bool {
        self.timestamp == probe.timestamp
            && self.requester == probe.requester
            && &self.replier == target
    }
}

/// `<payload>;<senderHost>;<senderPort>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipEnvelope {
    pub payload: String,
    pub sender: Endpoint,
}

impl GossipEnvelope {
    pub fn new(payload: impl Into<String>, sender: Endpoint) -> Self {
        Self {
            payload: payload.into(),
            sender,
        }
    }

    pub fn encode(&self) -> String {
        format!("{};{};{}", self.payload, self.sender.host, self.sender.port)
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut parts = text.trim().rsplitn(3, ';');
        let port = parts.next().ok_or(ProtocolError::MissingSender)?;
        let host = parts.next().ok_or(ProtocolError::MissingSender)?;
        let payload = parts.next().ok_or(ProtocolError::MissingSender)?;

        Ok(Self {
            payload: payload.to_string(),
            sender: Endpoint::from_parts(host, port)?,
        })
    }
}

/// Inbound peer-to-peer traffic, classified by its leading tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    Liveness(LivenessRequest),
    Gossip(GossipEnvelope),
}

impl PeerMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ProtocolError::Empty);
        }

        if text.split(':').next() == Some(TAG_LIVENESS_REQUEST) {
            LivenessRequest::parse(text).map(Self::Liveness)
        } else {
            GossipEnvelope::parse(text).map(Self::Gossip)
        }
    }
}
