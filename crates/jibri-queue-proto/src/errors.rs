//! Protocol error types.

use thiserror::Error;

/// Result alias for stanza model operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while building or inspecting stanzas.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Address string was empty or had an empty local/domain part.
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress {
        /// The rejected address
        address: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Error stanza without a recognizable condition element.
    #[error("error stanza {id:?} carries no condition")]
    MissingCondition {
        /// Correlation id of the offending stanza
        id: Option<String>,
    },
}
