//! Change events
//!
//! An [`Event`] records one mutation (or component application) aimed at a
//! consuming component. Events for the same destination and type are merged
//! before dispatch so that a burst of inserts becomes one unit of work.
//!
//! The event uuid doubles as the id of the job created from it.

use crate::error::{ConfluxError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use uuid::Uuid;

/// Kind of mutation an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Documents were inserted
    Insert,
    /// Documents were deleted
    Delete,
    /// Documents were updated
    Update,
    /// A component was applied; carries no ids
    Apply,
}

impl EventType {
    /// Lowercase name used in logs and serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Insert => "insert",
            EventType::Delete => "delete",
            EventType::Update => "update",
            EventType::Apply => "apply",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of a component: its type id (`listener`, `vector_index`...) and identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentRef {
    /// Component type id
    pub type_id: String,
    /// Component identifier
    pub identifier: String,
}

impl ComponentRef {
    /// Create a component address
    pub fn new(type_id: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            identifier: identifier.into(),
        }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_id, self.identifier)
    }
}

/// Fresh 32-character lowercase hex uuid.
pub fn new_uuid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Immutable mutation record.
///
/// `Apply` events never carry ids; every other type always does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Mutation kind
    pub event_type: EventType,
    /// Consuming component
    pub dest: ComponentRef,
    /// Affected document ids, in order. `None` for `Apply`.
    pub ids: Option<Vec<String>>,
    /// Unique id, reused as the job id
    pub uuid: String,
}

impl Event {
    /// Event over a set of document ids.
    pub fn new(event_type: EventType, dest: ComponentRef, ids: Vec<String>) -> Self {
        Self {
            event_type,
            dest,
            ids: Some(ids),
            uuid: new_uuid(),
        }
    }

    /// `Apply` event for a component.
    pub fn apply(dest: ComponentRef) -> Self {
        Self {
            event_type: EventType::Apply,
            dest,
            ids: None,
            uuid: new_uuid(),
        }
    }

    /// Ids as a slice; empty for `Apply`.
    pub fn ids(&self) -> &[String] {
        self.ids.as_deref().unwrap_or(&[])
    }

    /// Combine two events of the same type and destination.
    ///
    /// `Apply` merges return `self` unchanged. Other types concatenate ids
    /// (order kept, duplicates kept) under a fresh uuid.
    pub fn merge(&self, other: &Event) -> Result<Event> {
        if self.event_type != other.event_type {
            return Err(ConfluxError::IncompatibleEvents(format!(
                "cannot merge {} with {}",
                self.event_type, other.event_type
            )));
        }

        if self.event_type == EventType::Apply {
            if self.ids.is_some() || other.ids.is_some() {
                return Err(ConfluxError::IncompatibleEvents(
                    "apply events must not carry ids".to_string(),
                ));
            }
            return Ok(self.clone());
        }

        let (Some(left), Some(right)) = (&self.ids, &other.ids) else {
            return Err(ConfluxError::IncompatibleEvents(format!(
                "{} events must carry ids",
                self.event_type
            )));
        };

        if self.dest != other.dest {
            return Err(ConfluxError::IncompatibleEvents(format!(
                "destinations differ: {} vs {}",
                self.dest, other.dest
            )));
        }

        let mut ids = Vec::with_capacity(left.len() + right.len());
        ids.extend(left.iter().cloned());
        ids.extend(right.iter().cloned());
        Ok(Event::new(self.event_type, self.dest.clone(), ids))
    }
}

impl Add for Event {
    type Output = Event;

    /// # Panics
    ///
    /// Panics when the events cannot be merged; use [`Event::merge`] to
    /// handle that case.
    fn add(self, other: Event) -> Event {
        match self.merge(&other) {
            Ok(merged) => merged,
            Err(e) => panic!("{}", e),
        }
    }
}

/// Uuids of `events`, in order.
pub fn extract_job_ids(events: &[Event]) -> Vec<String> {
    events.iter().map(|e| e.uuid.clone()).collect()
}

/// Events grouped by type, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedEvents {
    entries: Vec<(EventType, Event)>,
}

impl MergedEvents {
    /// Merged event for a type
    pub fn get(&self, event_type: EventType) -> Option<&Event> {
        self.entries
            .iter()
            .find(|(t, _)| *t == event_type)
            .map(|(_, e)| e)
    }

    /// Iterate `(type, event)` pairs in first-appearance order
    pub fn iter(&self) -> impl Iterator<Item = &(EventType, Event)> {
        self.entries.iter()
    }

    /// Number of distinct types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no events were grouped
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merged events, consuming the grouping
    pub fn into_events(self) -> Vec<Event> {
        self.entries.into_iter().map(|(_, e)| e).collect()
    }
}

/// Partition `events` by type and left-fold [`Event::merge`] over each partition.
///
/// Single-element partitions keep the original event (and uuid).
pub fn group_and_merge_by_type(events: &[Event]) -> Result<MergedEvents> {
    let mut entries: Vec<(EventType, Event)> = Vec::new();
    for event in events {
        match entries.iter_mut().find(|(t, _)| *t == event.event_type) {
            Some((_, acc)) => *acc = acc.merge(event)?,
            None => entries.push((event.event_type, event.clone())),
        }
    }
    Ok(MergedEvents { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dest() -> ComponentRef {
        ComponentRef::new("listener", "encoder")
    }

    fn ids(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_uuid_is_32_lowercase_hex() {
        let e = Event::new(EventType::Insert, dest(), ids(&["1"]));
        assert_eq!(e.uuid.len(), 32);
        assert!(e
            .uuid
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_merge_concatenates_ids_with_fresh_uuid() {
        let a = Event::new(EventType::Insert, dest(), ids(&["1", "2"]));
        let b = Event::new(EventType::Insert, dest(), ids(&["2", "3"]));
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.ids(), ids(&["1", "2", "2", "3"]).as_slice());
        assert_ne!(merged.uuid, a.uuid);
        assert_ne!(merged.uuid, b.uuid);
        assert_eq!(merged.dest, a.dest);
    }

    #[test]
    fn test_merge_apply_returns_left() {
        let a = Event::apply(dest());
        let b = Event::apply(dest());
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged, a);
    }

    #[test]
    fn test_merge_rejects_different_types() {
        let a = Event::new(EventType::Insert, dest(), ids(&["1"]));
        let b = Event::new(EventType::Delete, dest(), ids(&["1"]));
        assert!(matches!(
            a.merge(&b),
            Err(ConfluxError::IncompatibleEvents(_))
        ));
    }

    #[test]
    fn test_merge_rejects_different_destinations() {
        let a = Event::new(EventType::Insert, dest(), ids(&["1"]));
        let b = Event::new(
            EventType::Insert,
            ComponentRef::new("vector_index", "idx"),
            ids(&["1"]),
        );
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_merge_rejects_missing_ids() {
        let a = Event::new(EventType::Update, dest(), ids(&["1"]));
        let mut b = Event::new(EventType::Update, dest(), ids(&["2"]));
        b.ids = None;
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_add_operator_merges() {
        let a = Event::new(EventType::Insert, dest(), ids(&["1"]));
        let b = Event::new(EventType::Insert, dest(), ids(&["2"]));
        assert_eq!((a + b).ids(), ids(&["1", "2"]).as_slice());
    }

    #[test]
    #[should_panic(expected = "incompatible events")]
    fn test_add_operator_panics_on_incompatible() {
        let a = Event::new(EventType::Insert, dest(), ids(&["1"]));
        let b = Event::new(EventType::Delete, dest(), ids(&["1"]));
        let _ = a + b;
    }

    #[test]
    fn test_extract_job_ids_preserves_order() {
        let events = vec![
            Event::new(EventType::Insert, dest(), ids(&["1"])),
            Event::apply(dest()),
            Event::new(EventType::Delete, dest(), ids(&["2"])),
        ];
        let job_ids = extract_job_ids(&events);
        assert_eq!(
            job_ids,
            events.iter().map(|e| e.uuid.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_group_and_merge_by_type() {
        let delete = Event::new(EventType::Delete, dest(), ids(&["3"]));
        let events = vec![
            Event::new(EventType::Insert, dest(), ids(&["1"])),
            Event::new(EventType::Insert, dest(), ids(&["2"])),
            delete.clone(),
        ];
        let grouped = group_and_merge_by_type(&events).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(
            grouped.get(EventType::Insert).unwrap().ids(),
            ids(&["1", "2"]).as_slice()
        );
        // Singleton partitions are returned unmodified.
        assert_eq!(grouped.get(EventType::Delete).unwrap(), &delete);
        let order: Vec<_> = grouped.iter().map(|(t, _)| *t).collect();
        assert_eq!(order, vec![EventType::Insert, EventType::Delete]);
    }

    #[test]
    fn test_group_and_merge_empty() {
        assert!(group_and_merge_by_type(&[]).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_merge_preserves_every_id(
            left in proptest::collection::vec("[a-z0-9]{1,6}", 0..8),
            right in proptest::collection::vec("[a-z0-9]{1,6}", 0..8),
        ) {
            let a = Event::new(EventType::Update, dest(), left.clone());
            let b = Event::new(EventType::Update, dest(), right.clone());
            let merged = a.merge(&b).unwrap();
            let mut expected = left;
            expected.extend(right);
            prop_assert_eq!(merged.ids(), expected.as_slice());
        }
    }
}
