//! Stanza model and wire contract for the jibri-queue protocol.
//!
//! The transport that carries stanzas (connection, XML parsing, serialization)
//! lives outside this workspace. This crate only describes the structured
//! values that cross that boundary:
//!
//! - [`Jid`]: opaque entity address with bare/full comparison
//! - [`Element`]: a parsed payload element (name, namespace, attributes,
//!   children, text)
//! - [`Stanza`]: one request, result, or error message
//! - [`HandlerFilter`]: the match rules a handler registers with
//! - [`queue`]: builders and parsers for the `jibri-queue` payload
//!
//! # Invariants
//!
//! Every acknowledgment built by [`queue::ack`] or [`queue::error_ack`] carries
//! the correlation id of the stanza it answers.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod element;
mod errors;
mod filter;
mod jid;
pub mod queue;
mod stanza;

pub use element::Element;
pub use errors::{ProtocolError, Result};
pub use filter::HandlerFilter;
pub use jid::Jid;
pub use stanza::{Condition, Stanza, StanzaKind, StanzaType, NS_STANZAS};
