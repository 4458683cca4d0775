//! The `jibri-queue` payload.
//!
//! Requests from the client and pushes from the queue service are `iq set`
//! stanzas carrying one `<jibri-queue/>` element. Its `action` attribute
//! selects the meaning:
//!
//! ```text
//! client -> queue   <jibri-queue action="join" room="room@conference"/>
//! client -> queue   <jibri-queue action="leave"/>
//! queue  -> client  <jibri-queue action="info"><position>3</position><time>120</time></jibri-queue>
//! queue  -> client  <jibri-queue action="token" value="..."/>
//! ```
//!
//! Pushes are answered with an `iq result` (or `iq error` for actions the
//! client does not understand) carrying the push's correlation id.

use crate::{Condition, Element, Jid, Stanza, StanzaType};

/// Namespace of the queue payload element.
pub const NS_JIBRI_QUEUE: &str = "http://jitsi.org/protocol/jibri-queue";

/// Local name of the queue payload element.
pub const ELEMENT: &str = "jibri-queue";

/// Child element carrying the queue position of an `info` push.
pub const POSITION: &str = "position";

/// Child element carrying the estimated time left of an `info` push.
pub const TIME: &str = "time";

/// Value of the `action` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Client asks to enter the queue
    Join,
    /// Client asks to leave the queue
    Leave,
    /// Service reports position / wait estimate
    Info,
    /// Service hands out the authorization token
    Token,
}

impl Action {
    /// Wire value of the attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Info => "info",
            Self::Token => "token",
        }
    }
}

/// One field of an `info` push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoField {
    /// Queue position (string-encoded ordinal)
    Position(String),
    /// Estimated time left (string-encoded duration)
    Time(String),
}

impl InfoField {
    fn to_element(&self) -> Element {
        match self {
            Self::Position(value) => Element::new(POSITION).with_text(value.clone()),
            Self::Time(value) => Element::new(TIME).with_text(value.clone()),
        }
    }
}

/// Classified inbound queue payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueUpdate {
    /// `action="info"`: fields in document order, unknown children dropped
    Info(Vec<InfoField>),
    /// `action="token"`: the `value` attribute, empty when absent
    Token(String),
    /// Any other action, or none
    Unknown(Option<String>),
}

impl QueueUpdate {
    /// Classify a `<jibri-queue/>` element by its `action` attribute.
    pub fn parse(payload: &Element) -> Self {
        match payload.attr("action") {
            Some("info") => Self::Info(
                payload
                    .children()
                    .iter()
                    .filter_map(|child| match child.name() {
                        POSITION => Some(InfoField::Position(child.text().to_string())),
                        TIME => Some(InfoField::Time(child.text().to_string())),
                        _ => None,
                    })
                    .collect(),
            ),
            Some("token") => Self::Token(payload.attr("value").unwrap_or_default().to_string()),
            other => Self::Unknown(other.map(str::to_string)),
        }
    }
}

/// The `<jibri-queue/>` element of a stanza, if present.
pub fn payload(stanza: &Stanza) -> Option<&Element> {
    stanza.find(ELEMENT, NS_JIBRI_QUEUE)
}

fn element(action: Action) -> Element {
    Element::new(ELEMENT).with_namespace(NS_JIBRI_QUEUE).with_attr("action", action.as_str())
}

/// Join request for `room`, addressed to `queue`.
pub fn join_request(queue: &Jid, room: &Jid) -> Stanza {
    Stanza::iq(StanzaType::Set)
        .with_to(queue.clone())
        .with_payload(element(Action::Join).with_attr("room", room.as_str()))
}

/// Leave request addressed to `queue`.
pub fn leave_request(queue: &Jid) -> Stanza {
    Stanza::iq(StanzaType::Set).with_to(queue.clone()).with_payload(element(Action::Leave))
}

/// `info` push from the queue service.
pub fn info_push(id: &str, from: &Jid, to: &Jid, fields: &[InfoField]) -> Stanza {
    let payload =
        fields.iter().fold(element(Action::Info), |el, field| el.with_child(field.to_element()));

    Stanza::iq(StanzaType::Set)
        .with_id(id)
        .with_from(from.clone())
        .with_to(to.clone())
        .with_payload(payload)
}

/// `token` push from the queue service.
pub fn token_push(id: &str, from: &Jid, to: &Jid, value: &str) -> Stanza {
    Stanza::iq(StanzaType::Set)
        .with_id(id)
        .with_from(from.clone())
        .with_to(to.clone())
        .with_payload(element(Action::Token).with_attr("value", value))
}

/// Push with an arbitrary `action` attribute.
pub fn raw_push(id: &str, from: &Jid, to: &Jid, action: &str) -> Stanza {
    Stanza::iq(StanzaType::Set)
        .with_id(id)
        .with_from(from.clone())
        .with_to(to.clone())
        .with_payload(
            Element::new(ELEMENT).with_namespace(NS_JIBRI_QUEUE).with_attr("action", action),
        )
}

fn reply(inbound: &Stanza, stanza_type: StanzaType) -> Stanza {
    let mut ack = Stanza::iq(stanza_type);
    if let Some(to) = inbound.from() {
        ack = ack.with_to(to.clone());
    }
    if let Some(id) = inbound.id() {
        ack = ack.with_id(id);
    }
    ack
}

/// Success acknowledgment for `inbound`.
pub fn ack(inbound: &Stanza) -> Stanza {
    reply(inbound, StanzaType::Result)
}

/// Error acknowledgment for `inbound` carrying `condition`.
pub fn error_ack(inbound: &Stanza, condition: &Condition) -> Stanza {
    reply(inbound, StanzaType::Error).with_payload(condition.to_element())
}
