//! Buffered state-change events
//!
//! Bounded, sequenced ring of per-element change events. Modelled on legacy buffered input
//! semantics: a buffer of capacity `n` holds at most `n - 1` events, evicts its oldest event when
//! full, and remembers that it overflowed until events are popped.

use serde::Serialize;
use std::collections::VecDeque;
use std::ops::Index;
use std::sync::atomic::{AtomicU32, Ordering};

use super::types::{Axis, Button, ElementIdentifier, PovState};

/// Largest capacity a buffer accepts, sized so that stored events take at most 1 MiB.
pub const EVENT_BUFFER_CAPACITY_MAX: usize = (1024 * 1024) / 16;

/// Sequence numbers are shared by every buffer so events from different controllers still order.
static NEXT_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Element that changed and its new value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventData {
    Axis { axis: Axis, value: i32 },
    Button { button: Button, pressed: bool },
    Pov { direction: PovState },
}

impl EventData {
    /// Element the event refers to.
    pub fn element(&self) -> ElementIdentifier {
        match self {
            EventData::Axis { axis, .. } => ElementIdentifier::Axis(*axis),
            EventData::Button { button, .. } => ElementIdentifier::Button(*button),
            EventData::Pov { .. } => ElementIdentifier::Pov,
        }
    }
}

/// One buffered event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateChangeEvent {
    pub data: EventData,
    /// Milliseconds timestamp supplied when the event was appended
    pub timestamp: u32,
    /// Chronological sequence number
    pub sequence: u32,
}

/// Ring buffer of state-change events
///
/// Not synchronized; owners guard it with their own lock.
#[derive(Debug, Default)]
pub struct StateChangeEventBuffer {
    events: VecDeque<StateChangeEvent>,
    capacity: usize,
    overflowed: bool,
}

impl StateChangeEventBuffer {
    /// Disabled buffer with capacity 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, evicting the oldest one if the buffer is full.
    ///
    /// Does nothing while the buffer is disabled.
    pub fn append_event(&mut self, data: EventData, timestamp: u32) {
        if !self.is_enabled() {
            return;
        }

        let event = StateChangeEvent {
            data,
            timestamp,
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        };

        let limit = self.usable_capacity();
        if self.events.len() >= limit {
            self.overflowed = true;
            if limit == 0 {
                return;
            }
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events currently stored.
    pub fn count(&self) -> usize {
        self.events.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity != 0
    }

    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Event by index, oldest first.
    pub fn get(&self, index: usize) -> Option<&StateChangeEvent> {
        self.events.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateChangeEvent> {
        self.events.iter()
    }

    /// Discard up to `count` of the oldest events and clear the overflow condition.
    pub fn pop_oldest_events(&mut self, count: usize) {
        let count = count.min(self.events.len());
        self.events.drain(..count);
        self.overflowed = false;
    }

    /// Change the capacity.
    ///
    /// A capacity of 0 disables the buffer and discards its contents. Capacities above
    /// [`EVENT_BUFFER_CAPACITY_MAX`] are clamped. Shrinking below the stored event count discards
    /// the oldest events and flags an overflow.
    pub fn set_capacity(&mut self, capacity: usize) {
        let capacity = capacity.min(EVENT_BUFFER_CAPACITY_MAX);
        self.capacity = capacity;

        if capacity == 0 {
            self.events.clear();
            self.events.shrink_to_fit();
            self.overflowed = false;
            return;
        }

        let limit = self.usable_capacity();
        if self.events.len() > limit {
            let excess = self.events.len() - limit;
            self.events.drain(..excess);
            self.overflowed = true;
        }
    }

    /// One slot always stays free.
    fn usable_capacity(&self) -> usize {
        self.capacity.saturating_sub(1)
    }
}

impl Index<usize> for StateChangeEventBuffer {
    type Output = StateChangeEvent;

    /// Unchecked in the sense that the caller must respect [`StateChangeEventBuffer::count`].
    fn index(&self, index: usize) -> &StateChangeEvent {
        &self.events[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button_event(index: usize) -> EventData {
        EventData::Button {
            button: Button::new(index).unwrap(),
            pressed: true,
        }
    }

    #[test]
    fn test_disabled_by_default() {
        let mut buffer = StateChangeEventBuffer::new();
        assert!(!buffer.is_enabled());

        buffer.append_event(button_event(0), 10);
        assert_eq!(buffer.count(), 0);
        assert!(!buffer.is_overflowed());
    }

    #[test]
    fn test_append_keeps_one_slot_free() {
        let mut buffer = StateChangeEventBuffer::new();
        buffer.set_capacity(4);

        for i in 0..3 {
            buffer.append_event(button_event(i), i as u32);
        }
        assert_eq!(buffer.count(), 3);
        assert!(!buffer.is_overflowed());

        buffer.append_event(button_event(3), 3);
        assert_eq!(buffer.count(), 3);
        assert!(buffer.is_overflowed());

        // Oldest event was the one evicted
        assert_eq!(buffer[0].data, button_event(1));
        assert_eq!(buffer[2].data, button_event(3));
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let mut buffer = StateChangeEventBuffer::new();
        buffer.set_capacity(16);
        for i in 0..10 {
            buffer.append_event(button_event(i), 0);
        }

        let sequences: Vec<u32> = buffer.iter().map(|event| event.sequence).collect();
        assert!(sequences.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_pop_clears_overflow() {
        let mut buffer = StateChangeEventBuffer::new();
        buffer.set_capacity(3);
        for i in 0..5 {
            buffer.append_event(button_event(i), 0);
        }
        assert!(buffer.is_overflowed());

        buffer.pop_oldest_events(1);
        assert_eq!(buffer.count(), 1);
        assert!(!buffer.is_overflowed());
        assert_eq!(buffer[0].data, button_event(4));

        // Popping more than stored is bounded
        buffer.pop_oldest_events(100);
        assert_eq!(buffer.count(), 0);
    }

    #[test]
    fn test_shrinking_capacity_overflows() {
        let mut buffer = StateChangeEventBuffer::new();
        buffer.set_capacity(10);
        for i in 0..8 {
            buffer.append_event(button_event(i), 0);
        }

        buffer.set_capacity(5);
        assert_eq!(buffer.count(), 4);
        assert!(buffer.is_overflowed());
        assert_eq!(buffer[0].data, button_event(4));

        // Growing never discards anything
        buffer.set_capacity(100);
        assert_eq!(buffer.count(), 4);
    }

    #[test]
    fn test_zero_capacity_disables_and_clears() {
        let mut buffer = StateChangeEventBuffer::new();
        buffer.set_capacity(10);
        buffer.append_event(button_event(0), 0);

        buffer.set_capacity(0);
        assert!(!buffer.is_enabled());
        assert_eq!(buffer.count(), 0);

        buffer.append_event(button_event(1), 0);
        assert_eq!(buffer.count(), 0);
    }

    #[test]
    fn test_capacity_is_clamped() {
        let mut buffer = StateChangeEventBuffer::new();
        buffer.set_capacity(usize::MAX);
        assert_eq!(buffer.capacity(), EVENT_BUFFER_CAPACITY_MAX);
    }

    #[test]
    fn test_capacity_one_stores_nothing() {
        let mut buffer = StateChangeEventBuffer::new();
        buffer.set_capacity(1);
        buffer.append_event(button_event(0), 0);

        assert_eq!(buffer.count(), 0);
        assert!(buffer.is_overflowed());
        assert!(buffer.get(0).is_none());
    }

    #[test]
    fn test_event_element() {
        let data = EventData::Axis {
            axis: Axis::RotY,
            value: 5,
        };
        assert_eq!(data.element(), ElementIdentifier::Axis(Axis::RotY));
        assert_eq!(
            EventData::Pov {
                direction: PovState::CENTERED
            }
            .element(),
            ElementIdentifier::Pov
        );
    }
}
