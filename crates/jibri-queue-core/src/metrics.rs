//! Queue metrics snapshot.

use jibri_queue_proto::queue::InfoField;

/// Last known queue metrics.
///
/// Both values are kept exactly as the service sent them. A field is `None`
/// until the first push that carries it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Position in the queue (string-encoded ordinal)
    pub position: Option<String>,
    /// Estimated time left (string-encoded duration)
    pub estimated_time_left: Option<String>,
}

impl MetricsSnapshot {
    /// Store one pushed field. Returns true if the stored value changed.
    pub fn apply(&mut self, field: &InfoField) -> bool {
        let (slot, value) = match field {
            InfoField::Position(value) => (&mut self.position, value),
            InfoField::Time(value) => (&mut self.estimated_time_left, value),
        };

        if slot.as_deref() == Some(value.as_str()) {
            return false;
        }

        *slot = Some(value.clone());
        true
    }

    /// Store fields in order (last one wins). Returns true if any changed.
    pub fn apply_all<'a>(&mut self, fields: impl IntoIterator<Item = &'a InfoField>) -> bool {
        fields.into_iter().fold(false, |changed, field| self.apply(field) | changed)
    }

    /// True if no field has been received yet.
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.estimated_time_left.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(v: &str) -> InfoField {
        InfoField::Position(v.into())
    }

    fn time(v: &str) -> InfoField {
        InfoField::Time(v.into())
    }

    #[test]
    fn first_value_is_a_change() {
        let mut metrics = MetricsSnapshot::default();
        assert!(metrics.is_empty());
        assert!(metrics.apply(&position("5")));
        assert_eq!(metrics.position.as_deref(), Some("5"));
        assert!(!metrics.is_empty());
    }

    #[test]
    fn same_value_is_not_a_change() {
        let mut metrics = MetricsSnapshot::default();
        metrics.apply(&position("5"));
        assert!(!metrics.apply(&position("5")));
    }

    #[test]
    fn empty_text_differs_from_absent() {
        let mut metrics = MetricsSnapshot::default();
        assert!(metrics.apply(&time("")));
        assert_eq!(metrics.estimated_time_left.as_deref(), Some(""));
    }

    #[test]
    fn last_repeated_field_wins() {
        let mut metrics = MetricsSnapshot::default();
        let changed = metrics.apply_all(&[position("4"), time("90"), position("2")]);
        assert!(changed);
        assert_eq!(metrics.position.as_deref(), Some("2"));
        assert_eq!(metrics.estimated_time_left.as_deref(), Some("90"));
    }

    #[test]
    fn unchanged_fields_do_not_mask_a_change() {
        let mut metrics = MetricsSnapshot::default();
        metrics.apply(&position("5"));
        assert!(metrics.apply_all(&[position("5"), time("30")]));
        assert!(!metrics.apply_all(&[position("5"), time("30")]));
    }
}
