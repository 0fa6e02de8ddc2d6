//! Seed Registry Module
//!
//! Well-known rendezvous points. A joining peer registers with a quorum of
//! seeds and receives each seed's current member list as bootstrap
//! candidates; peers later report dead nodes back so seeds stop handing them
//! out.
//!
//! ## Behaviour
//! - **Registration**: reply with the table *before* appending the newcomer,
//!   so a peer never sees itself in its own bootstrap list.
//! - **Dead-node reports**: idempotent removal; unknown nodes are ignored.
//! - **Independence**: seeds never replicate or gossip their tables.

pub mod service;
pub mod table;

pub use service::SeedRegistry;
pub use table::SeedMembershipTable;

#[cfg(test)]
mod tests;
