//! Error types for queue membership.
//!
//! Two layers: [`TransportError`] is what the connection reports for a request
//! (remote refusal, delivery failure), [`QueueError`] is what callers of
//! `join`/`leave` see. Transport errors pass through unchanged inside
//! [`QueueError::Transport`].

use std::fmt;

use jibri_queue_proto::Condition;
use thiserror::Error;

/// Request kinds the client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Enter the queue
    Join,
    /// Leave the queue
    Leave,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Join => f.write_str("join"),
            Self::Leave => f.write_str("leave"),
        }
    }
}

/// Failure reported by the transport for a correlated request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Remote answered with an error stanza
    #[error("remote error: {condition}{}", text_suffix(.text))]
    Remote {
        /// Defined error condition
        condition: Condition,
        /// Optional human-readable text
        text: Option<String>,
    },

    /// Stanza could not be delivered
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Connection went away before an answer arrived
    #[error("connection closed")]
    Disconnected,

    /// Handler registration is not (or no longer) known
    #[error("unknown handler registration {0}")]
    UnknownHandler(u64),
}

fn text_suffix(text: &Option<String>) -> String {
    text.as_deref().map(|t| format!(" ({t})")).unwrap_or_default()
}

/// Errors returned by queue operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// `join` while already joined
    #[error("already joined")]
    AlreadyJoined,

    /// `leave` while not joined
    #[error("nothing to leave")]
    NotJoined,

    /// Same request kind already outstanding
    #[error("{operation} request already in flight")]
    RequestPending {
        /// Outstanding request kind
        operation: Operation,
    },

    /// Client was disposed
    #[error("queue client disposed")]
    Disposed,

    /// Request failed in transport or was refused by the remote
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl QueueError {
    /// Returns true if the call was rejected locally without touching the
    /// network.
    ///
    /// Precondition failures never reach the remote; only
    /// [`QueueError::Transport`] does.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, Self::Transport(_))
    }
}
