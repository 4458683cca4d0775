//! Stanza connection seam.
//!
//! The client never touches sockets or XML. Whatever carries stanzas (a real
//! XMPP connection, or the in-memory one in `jibri-queue-sim`) implements
//! [`Connection`]; the client registers a [`StanzaHandler`] with it and sends
//! requests and acknowledgments through it.

use std::{fmt, future::Future, sync::Arc};

use jibri_queue_core::TransportError;
use jibri_queue_proto::{HandlerFilter, Stanza};

/// Handle returned by [`Connection::add_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerRef(u64);

impl HandlerRef {
    /// Wrap a transport-assigned registration number.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Transport-assigned registration number.
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// What a handler did with a delivered stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Stanza was consumed; no other handler should see it
    Handled,
    /// Stanza was dropped; the transport may offer it elsewhere
    Ignored,
}

/// Receiver of inbound stanzas matching a [`HandlerFilter`].
///
/// Invoked at most once per stanza and never concurrently with itself for the
/// same registration.
pub trait StanzaHandler: Send + Sync {
    /// Process one inbound stanza synchronously.
    fn handle(&self, stanza: &Stanza) -> Disposition;
}

/// Stanza transport consumed by the queue client.
///
/// # Invariants
///
/// - `add_handler` takes effect before it returns: a matching stanza delivered
///   afterwards reaches the handler.
/// - After `delete_handler` returns `Ok`, the handler is never invoked again.
/// - The future from `send_request` settles exactly once: `Ok` with the result
///   stanza, or `Err` for an error stanza or a delivery failure. It may never
///   settle if the transport has no timeout.
pub trait Connection: Send + Sync + 'static {
    /// Register a handler for stanzas matching `filter`.
    fn add_handler(&self, filter: HandlerFilter, handler: Arc<dyn StanzaHandler>) -> HandlerRef;

    /// Remove a registration.
    ///
    /// # Errors
    ///
    /// - `TransportError::UnknownHandler` if the registration is not known
    fn delete_handler(&self, handle: HandlerRef) -> Result<(), TransportError>;

    /// Send a correlated request and wait for its answer.
    ///
    /// The transport assigns the correlation id if the stanza has none.
    fn send_request(
        &self,
        stanza: Stanza,
    ) -> impl Future<Output = Result<Stanza, TransportError>> + Send;

    /// Fire-and-forget send.
    fn send(&self, stanza: Stanza) -> Result<(), TransportError>;
}
