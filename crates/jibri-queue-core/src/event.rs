//! Session inputs, actions, and published events.

use jibri_queue_proto::Stanza;

use crate::{MetricsSnapshot, Operation, TransportError};

/// Inputs the caller feeds into the session.
///
/// The caller is responsible for:
/// - Forwarding application intents (join, leave, dispose)
/// - Sending the requests the session produces and feeding back their outcome
/// - Delivering inbound stanzas that matched the registered handler
#[derive(Debug, Clone)]
pub enum QueueInput {
    /// Application wants to enter the queue.
    Join,

    /// Application wants to leave the queue.
    Leave,

    /// The join request settled.
    JoinCompleted(Result<(), TransportError>),

    /// The leave request settled.
    LeaveCompleted(Result<(), TransportError>),

    /// Transport delivered a stanza to the registered handler.
    StanzaReceived(Stanza),

    /// Application tore the client down.
    Dispose,
}

/// Kind of [`QueueEvent`], used to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueEventKind {
    /// Position or wait estimate changed
    Metrics,
    /// Authorization token received
    Token,
}

/// Event published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// At least one metric changed; carries the full current snapshot.
    Metrics(MetricsSnapshot),

    /// Token pushed by the service. Repeated tokens are published again.
    Token(String),
}

impl QueueEvent {
    /// Kind of this event.
    pub fn kind(&self) -> QueueEventKind {
        match self {
            Self::Metrics(_) => QueueEventKind::Metrics,
            Self::Token(_) => QueueEventKind::Token,
        }
    }
}

/// Actions the session produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueAction {
    /// Send a correlated request and feed the outcome back as
    /// [`QueueInput::JoinCompleted`] / [`QueueInput::LeaveCompleted`].
    SendRequest {
        /// Which request this is
        operation: Operation,
        /// Request stanza (correlation id assigned by the transport)
        stanza: Stanza,
    },

    /// Fire-and-forget send of an acknowledgment.
    SendAck(Stanza),

    /// Publish an event to subscribers.
    Emit(QueueEvent),

    /// Drop the inbound handler registration and all subscribers.
    Unregister,

    /// Log message for debugging.
    Log {
        /// Log message.
        message: String,
    },
}

impl QueueAction {
    /// True for [`QueueAction::SendAck`].
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::SendAck(_))
    }
}
