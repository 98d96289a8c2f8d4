//! Event queue
//!
//! Mutations publish events addressed to consuming components. The queue
//! buffers them per destination until drained; draining merges each
//! destination's events by type so that downstream work is batched.

use crate::error::Result;
use conflux_core::{group_and_merge_by_type, ComponentRef, Event, MergedEvents};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Merged events for one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch {
    /// Consuming component
    pub dest: ComponentRef,
    /// Events grouped and merged by type
    pub events: MergedEvents,
}

/// Buffer of published events, grouped by destination in first-publish order.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: Mutex<Vec<(ComponentRef, Vec<Event>)>>,
}

impl EventQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `events`; returns how many were queued.
    pub fn publish(&self, events: Vec<Event>) -> usize {
        let count = events.len();
        if count == 0 {
            return 0;
        }
        let mut pending = self.pending.lock();
        for event in events {
            match pending.iter_mut().find(|(dest, _)| *dest == event.dest) {
                Some((_, queue)) => queue.push(event),
                None => pending.push((event.dest.clone(), vec![event])),
            }
        }
        info!(count, destinations = pending.len(), "Published events");
        count
    }

    /// Number of buffered events
    pub fn len(&self) -> usize {
        self.pending.lock().iter().map(|(_, q)| q.len()).sum()
    }

    /// True when nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every buffered event, merged per destination and type.
    ///
    /// On a merge error the buffer is already emptied; the events are lost.
    pub fn drain(&self) -> Result<Vec<EventBatch>> {
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut batches = Vec::with_capacity(pending.len());
        for (dest, events) in pending {
            let merged = group_and_merge_by_type(&events)?;
            debug!(
                dest = %dest,
                events = events.len(),
                merged = merged.len(),
                "Merged events for destination"
            );
            batches.push(EventBatch {
                dest,
                events: merged,
            });
        }
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_core::EventType;

    fn insert(dest: &ComponentRef, id: &str) -> Event {
        Event::new(EventType::Insert, dest.clone(), vec![id.to_string()])
    }

    #[test]
    fn test_publish_and_drain_merges_per_destination() {
        let queue = EventQueue::new();
        let listener = ComponentRef::new("listener", "enc");
        let index = ComponentRef::new("vector_index", "idx");

        queue.publish(vec![
            insert(&listener, "1"),
            insert(&index, "1"),
            insert(&listener, "2"),
            Event::new(EventType::Delete, listener.clone(), vec!["3".into()]),
        ]);
        assert_eq!(queue.len(), 4);

        let batches = queue.drain().unwrap();
        assert!(queue.is_empty());
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].dest, listener);
        assert_eq!(
            batches[0].events.get(EventType::Insert).unwrap().ids(),
            &["1".to_string(), "2".to_string()]
        );
        assert_eq!(batches[0].events.len(), 2);
        assert_eq!(batches[1].dest, index);
    }

    #[test]
    fn test_publish_empty_is_noop() {
        let queue = EventQueue::new();
        assert_eq!(queue.publish(vec![]), 0);
        assert!(queue.drain().unwrap().is_empty());
    }
}
