//! Peer Module
//!
//! Everything a gossiping node runs after it binds its listener.
//!
//! ## Lifecycle
//! 1. **Bootstrap** (`bootstrap`): register with a quorum of seeds, connect-probe
//!    the returned candidates, keep at most `max_peers` of them.
//! 2. **Gossip** (`gossip`): originate this node's messages and flood received
//!    ones, deduplicated through the `ledger`.
//! 3. **Failure detection** (`liveness`): one probing loop per monitored peer,
//!    reporting dead peers to every seed.
//! 4. **Dispatch** (`dispatcher`): serve liveness probes and gossip arriving on
//!    the listener for the node's whole lifetime.
//!
//! `node` ties these together and handles shutdown.

pub mod bootstrap;
pub mod dispatcher;
pub mod gossip;
pub mod ledger;
pub mod liveness;
pub mod node;
pub mod view;

pub use node::PeerNode;
