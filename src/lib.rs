//! Seed-Assisted Gossip Membership Library
//!
//! Unstructured peer-to-peer group membership. Nodes find each other through a
//! handful of well-known seed registries, keep a small bounded view of peers,
//! flood application messages by gossip, and cooperatively detect and report
//! dead peers. Nothing tracks global membership; every node works from
//! pairwise probes and hearsay.
//!
//! ## Modules
//! - **`protocol`**: `Endpoint` identity and the text wire messages.
//! - **`transport`**: one-connection-per-message framing over TCP.
//! - **`seed`**: the rendezvous registry and its membership table.
//! - **`peer`**: bootstrap, gossip, failure detection and inbound dispatch.
//! - **`config`**: seed list loading and protocol timings.
//! - **`event_log`**: append-only protocol event log, injected per node.
//! - **`shutdown`**: cooperative cancellation for long-running loops.

pub mod config;
pub mod error;
pub mod event_log;
pub mod peer;
pub mod protocol;
pub mod seed;
pub mod shutdown;
pub mod transport;
