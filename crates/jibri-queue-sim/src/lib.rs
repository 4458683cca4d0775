//! Deterministic simulation for jibri-queue clients.
//!
//! In-memory implementations of the pieces a real deployment gets from the
//! XMPP server, for reproducible testing without a network.
//!
//! - [`SimConnection`]: [`jibri_queue_client::Connection`] with scripted
//!   replies, held requests, and stanza injection
//! - [`SimQueueService`]: the remote queue, producing `info` and `token`
//!   pushes from a seeded RNG
//! - [`scenario`]: one client joined, served, and torn down end to end

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod connection;
pub mod scenario;
mod service;

pub use connection::{Reply, SimConnection};
pub use scenario::{ScenarioConfig, ScenarioError, ScenarioReport};
pub use service::{Member, SimQueueService};
