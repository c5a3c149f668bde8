use std::collections::VecDeque;

use crate::types::event::RealtimeEvent;

/// How many events a subscriber keeps.
pub const EVENT_BUFFER_CAPACITY: usize = 50;

/// Bounded, insertion-ordered event history. When full, pushing evicts the
/// oldest entry. No deduplication.
#[derive(Clone, Debug)]
pub struct EventBuffer {
    events: VecDeque<RealtimeEvent>,
    capacity: usize,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::with_capacity(EVENT_BUFFER_CAPACITY)
    }
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capacity of zero is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: RealtimeEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Newest event, if any.
    pub fn latest(&self) -> Option<&RealtimeEvent> {
        self.events.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &RealtimeEvent> + ExactSizeIterator {
        self.events.iter()
    }

    pub fn to_vec(&self) -> Vec<RealtimeEvent> {
        self.events.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn numbered(n: usize) -> RealtimeEvent {
        RealtimeEvent::notification(n.to_string(), None)
    }

    fn message_of(event: &RealtimeEvent) -> String {
        match event {
            RealtimeEvent::Notification { data, .. } => data.message.clone().unwrap_or_default(),
            other => other.event_type().to_string(),
        }
    }

    #[test]
    fn new_buffer_is_empty() {
        let buffer = EventBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), EVENT_BUFFER_CAPACITY);
        assert!(buffer.latest().is_none());
    }

    #[test]
    fn fifty_first_event_evicts_the_oldest() {
        let mut buffer = EventBuffer::new();
        for n in 0..51 {
            buffer.push(numbered(n));
        }

        assert_eq!(buffer.len(), 50);
        let messages: Vec<String> = buffer.iter().map(message_of).collect();
        let expected: Vec<String> = (1..51).map(|n| n.to_string()).collect();
        assert_eq!(messages, expected);
        assert_eq!(message_of(buffer.latest().unwrap()), "50");
    }

    #[test]
    fn duplicates_are_kept() {
        let mut buffer = EventBuffer::new();
        let event = numbered(1);
        buffer.push(event.clone());
        buffer.push(event);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let mut buffer = EventBuffer::with_capacity(0);
        buffer.push(numbered(1));
        buffer.push(numbered(2));
        assert_eq!(buffer.len(), 1);
        assert_eq!(message_of(buffer.latest().unwrap()), "2");
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity_and_keeps_newest_in_order(count in 0usize..200) {
            let mut buffer = EventBuffer::new();
            for n in 0..count {
                buffer.push(numbered(n));
            }

            prop_assert!(buffer.len() <= EVENT_BUFFER_CAPACITY);
            prop_assert_eq!(buffer.len(), count.min(EVENT_BUFFER_CAPACITY));

            let start = count.saturating_sub(EVENT_BUFFER_CAPACITY);
            let messages: Vec<String> = buffer.iter().map(message_of).collect();
            let expected: Vec<String> = (start..count).map(|n| n.to_string()).collect();
            prop_assert_eq!(messages, expected);
        }
    }
}
