//! Change events published by the triple store.
//!
//! Every committed write emits one event per affected row. Incrementally
//! maintained views consume this feed instead of polling the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{prefix_of, Triple};

/// Unique identifier for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// A single committed change to the triple store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: EventId,
    /// Commit time of the change.
    pub timestamp: DateTime<Utc>,
    pub change: ChangeKind,
}

impl ChangeEvent {
    pub fn new(change: ChangeKind) -> Self {
        Self {
            id: EventId::new(),
            timestamp: Utc::now(),
            change,
        }
    }

    pub fn subject_id(&self) -> &str {
        match &self.change {
            ChangeKind::Upserted { triple } | ChangeKind::Deleted { triple } => &triple.subject_id,
            ChangeKind::Touched { subject_id, .. } => subject_id,
        }
    }

    pub fn predicate(&self) -> &str {
        match &self.change {
            ChangeKind::Upserted { triple } | ChangeKind::Deleted { triple } => &triple.predicate,
            ChangeKind::Touched { predicate, .. } => predicate,
        }
    }

    /// The object value carried by the event, if any.
    ///
    /// For deletions this is the value that was removed, which is the only
    /// way to recover a link that no longer exists in the store.
    pub fn object_value(&self) -> Option<&str> {
        match &self.change {
            ChangeKind::Upserted { triple } | ChangeKind::Deleted { triple } => {
                Some(&triple.object_value)
            }
            ChangeKind::Touched { .. } => None,
        }
    }

    pub fn subject_prefix(&self) -> &str {
        prefix_of(self.subject_id())
    }
}

/// The kind of change, tagged by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "change_type")]
pub enum ChangeKind {
    /// A triple was inserted or its value replaced.
    Upserted { triple: Triple },
    /// A triple's `updated_at` was re-stamped without changing its value.
    Touched {
        subject_id: String,
        predicate: String,
        updated_at: DateTime<Utc>,
    },
    /// A triple was removed.
    Deleted { triple: Triple },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjectType, TripleInput};

    #[test]
    fn event_serialization_roundtrip() {
        let triple = Triple::from_input(
            TripleInput::new("order:FM-1", "order_status", "CREATED", ObjectType::String),
            Utc::now(),
        );
        let event = ChangeEvent::new(ChangeKind::Upserted { triple });

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, deserialized.id);
        assert!(json.contains("\"change_type\":\"Upserted\""));
    }

    #[test]
    fn accessors_cover_touch_events() {
        let event = ChangeEvent::new(ChangeKind::Touched {
            subject_id: "order:FM-1".to_string(),
            predicate: "order_status".to_string(),
            updated_at: Utc::now(),
        });
        assert_eq!(event.subject_prefix(), "order");
        assert_eq!(event.predicate(), "order_status");
        assert!(event.object_value().is_none());
    }
}
