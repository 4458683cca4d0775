//! Client
//!
//! Async driver for [`jibri_queue_core::QueueSession`]. Binds a session to a
//! stanza [`Connection`], awaits join/leave requests, acknowledges pushes, and
//! republishes typed events to subscribers.
//!
//! # Architecture
//!
//! The session decides; this crate executes. [`QueueClient::join`] feeds
//! `Join` into the session, sends the resulting request through the
//! connection, and feeds the outcome back. Inbound pushes arrive through the
//! [`StanzaHandler`] registered at construction and run synchronously.
//!
//! # Components
//!
//! - [`QueueClient`]: one queue membership for one room
//! - [`Connection`] / [`StanzaHandler`]: transport seam
//! - [`EventBus`]: synchronous observer registry for [`QueueEvent`]s
//! - [`ClientIdAllocator`]: instance numbering, injected or process-wide

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod bus;
mod client;
mod connection;
mod ids;

pub use bus::{EventBus, SubscriptionId};
pub use client::QueueClient;
pub use connection::{Connection, Disposition, HandlerRef, StanzaHandler};
pub use ids::{ClientId, ClientIdAllocator};
pub use jibri_queue_core::{
    Jid, LeavePolicy, MetricsSnapshot, QueueConfig, QueueError, QueueEvent, QueueEventKind,
    TransportError,
};
