//! Wire Protocol Module
//!
//! Defines the node identity type and the text messages exchanged between
//! peers and seeds. Every message travels over its own TCP connection and ends
//! when the sender half-closes (see [`crate::transport`]).
//!
//! ## Messages
//! - **Seed traffic**: `New Node` registrations (answered with a comma separated
//!   peer list) and `Dead Node` reports.
//! - **Liveness**: `Liveness Request` probes answered by `Liveness Reply`.
//! - **Gossip**: `payload;senderHost;senderPort` envelopes.

pub mod messages;
pub mod types;

pub use messages::{
    DeadNodeReport, GossipEnvelope, LivenessReply, LivenessRequest, PeerMessage, SeedRequest,
};
pub use types::Endpoint;
