//! Stanza envelope.
//!
//! A [`Stanza`] is the unit the transport sends and delivers. Only the fields
//! the queue protocol inspects are modeled: kind, type, correlation id,
//! addressing, and the payload elements.

use std::fmt;

use crate::{
    Element, Jid,
    errors::{ProtocolError, Result},
};

/// Namespace of stanza error conditions.
pub const NS_STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";

/// Top-level stanza kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StanzaKind {
    /// Request/response exchange
    Iq,
    /// One-way message
    Message,
    /// Presence broadcast
    Presence,
}

/// Request/response type of an `iq` stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StanzaType {
    /// Read request
    Get,
    /// Write request
    Set,
    /// Successful response
    Result,
    /// Failed response
    Error,
}

impl StanzaType {
    /// Wire name of the type attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Result => "result",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for StanzaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Defined stanza error condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    /// `service-unavailable`
    ServiceUnavailable,
    /// `bad-request`
    BadRequest,
    /// `item-not-found`
    ItemNotFound,
    /// `not-allowed`
    NotAllowed,
    /// `internal-server-error`
    InternalServerError,
    /// Any other condition name
    Other(String),
}

impl Condition {
    /// Element name of the condition.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ServiceUnavailable => "service-unavailable",
            Self::BadRequest => "bad-request",
            Self::ItemNotFound => "item-not-found",
            Self::NotAllowed => "not-allowed",
            Self::InternalServerError => "internal-server-error",
            Self::Other(name) => name,
        }
    }

    /// Map an element name to a condition.
    pub fn from_name(name: &str) -> Self {
        match name {
            "service-unavailable" => Self::ServiceUnavailable,
            "bad-request" => Self::BadRequest,
            "item-not-found" => Self::ItemNotFound,
            "not-allowed" => Self::NotAllowed,
            "internal-server-error" => Self::InternalServerError,
            other => Self::Other(other.to_string()),
        }
    }

    /// Error `type` attribute conventionally paired with the condition.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BadRequest => "modify",
            Self::InternalServerError => "wait",
            _ => "cancel",
        }
    }

    /// `<error>` element carrying this condition.
    pub fn to_element(&self) -> Element {
        Element::new("error")
            .with_attr("type", self.error_type())
            .with_child(Element::new(self.as_str()).with_namespace(NS_STANZAS))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One protocol stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stanza {
    kind: StanzaKind,
    stanza_type: StanzaType,
    id: Option<String>,
    from: Option<Jid>,
    to: Option<Jid>,
    payload: Vec<Element>,
}

impl Stanza {
    /// Create an `iq` stanza of the given type with no addressing.
    pub fn iq(stanza_type: StanzaType) -> Self {
        Self {
            kind: StanzaKind::Iq,
            stanza_type,
            id: None,
            from: None,
            to: None,
            payload: Vec::new(),
        }
    }

    /// Set the correlation id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the sender.
    #[must_use]
    pub fn with_from(mut self, from: Jid) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the recipient.
    #[must_use]
    pub fn with_to(mut self, to: Jid) -> Self {
        self.to = Some(to);
        self
    }

    /// Append a payload element.
    #[must_use]
    pub fn with_payload(mut self, element: Element) -> Self {
        self.payload.push(element);
        self
    }

    /// Assign a correlation id in place (transport use).
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Stanza kind.
    pub fn kind(&self) -> StanzaKind {
        self.kind
    }

    /// Stanza type.
    pub fn stanza_type(&self) -> StanzaType {
        self.stanza_type
    }

    /// Correlation id. `None` if unassigned.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Sender. `None` if the transport did not stamp one.
    pub fn from(&self) -> Option<&Jid> {
        self.from.as_ref()
    }

    /// Recipient.
    pub fn to(&self) -> Option<&Jid> {
        self.to.as_ref()
    }

    /// All payload elements in document order.
    pub fn payload(&self) -> &[Element] {
        &self.payload
    }

    /// First payload element with the given name and namespace.
    pub fn find(&self, name: &str, namespace: &str) -> Option<&Element> {
        self.payload.iter().find(|e| e.is(name, namespace))
    }

    /// True if any payload element declares the namespace.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.payload.iter().any(|e| e.namespace() == Some(namespace))
    }

    /// Condition carried by an error stanza.
    pub fn error_condition(&self) -> Result<Condition> {
        self.payload
            .iter()
            .filter(|e| e.name() == "error")
            .flat_map(Element::children)
            .find(|c| c.namespace() == Some(NS_STANZAS) && c.name() != "text")
            .map(|c| Condition::from_name(c.name()))
            .ok_or_else(|| ProtocolError::MissingCondition { id: self.id.clone() })
    }

    /// Human-readable `<text>` of an error stanza, if present.
    pub fn error_text(&self) -> Option<&str> {
        self.payload
            .iter()
            .filter(|e| e.name() == "error")
            .flat_map(Element::children)
            .find(|c| c.is("text", NS_STANZAS))
            .map(Element::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_condition_is_extracted() {
        let stanza = Stanza::iq(StanzaType::Error)
            .with_id("abc")
            .with_payload(Condition::NotAllowed.to_element());

        assert_eq!(stanza.error_condition(), Ok(Condition::NotAllowed));
        assert_eq!(stanza.error_text(), None);
    }

    #[test]
    fn error_text_is_not_a_condition() {
        let error = Element::new("error")
            .with_attr("type", "cancel")
            .with_child(Element::new("text").with_namespace(NS_STANZAS).with_text("queue full"))
            .with_child(Element::new("resource-constraint").with_namespace(NS_STANZAS));
        let stanza = Stanza::iq(StanzaType::Error).with_payload(error);

        assert_eq!(stanza.error_condition(), Ok(Condition::Other("resource-constraint".into())));
        assert_eq!(stanza.error_text(), Some("queue full"));
    }

    #[test]
    fn missing_condition_reported() {
        let stanza = Stanza::iq(StanzaType::Error).with_id("x");
        assert_eq!(
            stanza.error_condition(),
            Err(ProtocolError::MissingCondition { id: Some("x".into()) })
        );
    }

    #[test]
    fn service_unavailable_element_shape() {
        let el = Condition::ServiceUnavailable.to_element();
        assert_eq!(el.name(), "error");
        assert_eq!(el.attr("type"), Some("cancel"));
        assert!(el.child("service-unavailable", NS_STANZAS).is_some());
    }
}
