//! Inbound handler match rules.

use crate::{Jid, Stanza, StanzaKind, StanzaType};

/// What a registered handler wants delivered.
///
/// Every `Some` field must match for a stanza to be delivered. Sender matching
/// compares bare addresses when `match_bare_from` is set, full addresses
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFilter {
    /// Namespace of a payload element.
    pub namespace: Option<String>,
    /// Stanza kind.
    pub kind: Option<StanzaKind>,
    /// Stanza type.
    pub stanza_type: Option<StanzaType>,
    /// Sender address.
    pub from: Option<Jid>,
    /// Compare `from` on bare addresses.
    pub match_bare_from: bool,
}

impl HandlerFilter {
    /// Filter that matches every stanza.
    pub fn any() -> Self {
        Self { namespace: None, kind: None, stanza_type: None, from: None, match_bare_from: false }
    }

    /// Requests (`iq type=set`) in `namespace` from `from`'s bare address.
    pub fn requests_from(namespace: impl Into<String>, from: Jid) -> Self {
        Self {
            namespace: Some(namespace.into()),
            kind: Some(StanzaKind::Iq),
            stanza_type: Some(StanzaType::Set),
            from: Some(from),
            match_bare_from: true,
        }
    }

    /// True if the stanza satisfies every constraint.
    pub fn matches(&self, stanza: &Stanza) -> bool {
        if let Some(ns) = &self.namespace
            && !stanza.has_namespace(ns)
        {
            return false;
        }

        if self.kind.is_some_and(|kind| kind != stanza.kind()) {
            return false;
        }

        if self.stanza_type.is_some_and(|ty| ty != stanza.stanza_type()) {
            return false;
        }

        match (&self.from, stanza.from()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(expected), Some(actual)) if self.match_bare_from => expected.bare_eq(actual),
            (Some(expected), Some(actual)) => expected == actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Element;

    const NS: &str = "http://example.com/ns";

    fn push(from: &str) -> Stanza {
        Stanza::iq(StanzaType::Set)
            .with_from(from.parse().unwrap())
            .with_payload(Element::new("q").with_namespace(NS))
    }

    #[test]
    fn bare_match_accepts_any_resource() {
        let filter = HandlerFilter::requests_from(NS, "svc@example.com".parse().unwrap());
        assert!(filter.matches(&push("svc@example.com")));
        assert!(filter.matches(&push("svc@example.com/worker-1")));
        assert!(!filter.matches(&push("other@example.com")));
    }

    #[test]
    fn full_match_requires_identical_sender() {
        let mut filter = HandlerFilter::requests_from(NS, "svc@example.com/a".parse().unwrap());
        filter.match_bare_from = false;
        assert!(filter.matches(&push("svc@example.com/a")));
        assert!(!filter.matches(&push("svc@example.com/b")));
    }

    #[test]
    fn type_and_namespace_constrain() {
        let filter = HandlerFilter::requests_from(NS, "svc@example.com".parse().unwrap());

        let result = Stanza::iq(StanzaType::Result)
            .with_from("svc@example.com".parse().unwrap())
            .with_payload(Element::new("q").with_namespace(NS));
        assert!(!filter.matches(&result));

        let foreign = Stanza::iq(StanzaType::Set)
            .with_from("svc@example.com".parse().unwrap())
            .with_payload(Element::new("q").with_namespace("urn:other"));
        assert!(!filter.matches(&foreign));

        let unsigned = Stanza::iq(StanzaType::Set).with_payload(Element::new("q").with_namespace(NS));
        assert!(!filter.matches(&unsigned));
    }

    #[test]
    fn any_matches_everything() {
        assert!(HandlerFilter::any().matches(&Stanza::iq(StanzaType::Get)));
    }
}
