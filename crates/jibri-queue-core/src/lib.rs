//! Core
//!
//! Action-based state machine for membership in a remote jibri queue. The
//! queue service hands out scarce recording/dialing slots first come, first
//! served; a client joins on behalf of a conference room, receives position and
//! wait-time pushes, and finally an authorization token.
//!
//! # Architecture
//!
//! [`QueueSession`] is Sans-IO. It receives inputs ([`QueueInput`]), updates
//! membership and metrics, and returns actions ([`QueueAction`]) for the caller
//! to execute: requests to send, acknowledgments to send, events to publish.
//! Completing a request is itself an input, so the caller owns all waiting.
//!
//! # Components
//!
//! - [`QueueSession`]: membership state machine and push classification
//! - [`MetricsSnapshot`]: last known position / estimated time left
//! - [`QueueEvent`]: what subscribers observe
//! - [`QueueConfig`]: behavior knobs ([`LeavePolicy`])

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod error;
mod event;
mod metrics;
mod session;

pub use config::{LeavePolicy, QueueConfig};
pub use error::{Operation, QueueError, TransportError};
pub use event::{QueueAction, QueueEvent, QueueEventKind, QueueInput};
pub use jibri_queue_proto::{Jid, Stanza};
pub use metrics::MetricsSnapshot;
pub use session::{Membership, QueueSession};
