//! MIDI events pending delivery to the wrapped plug-in.
//!
//! Host event calls push short MIDI messages into a [`MidiEventQueue`]; the
//! render pipeline drains the whole queue into one delivery call per block
//! and clears it before the next cycle. The queue never grows past its
//! capacity, so pushing never allocates.

/// Maximum MIDI events accepted per render cycle.
pub const MAX_MIDI_EVENTS: usize = 1024;

/// A short MIDI message scheduled at a frame offset within the next block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MidiEvent {
    /// Frame offset into the next rendered block.
    pub delta_frames: u32,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiEvent {
    pub const fn new(delta_frames: u32, status: u8, data1: u8, data2: u8) -> Self {
        Self {
            delta_frames,
            status,
            data1,
            data2,
        }
    }

    /// The three raw message bytes.
    #[inline]
    pub const fn bytes(&self) -> [u8; 3] {
        [self.status, self.data1, self.data2]
    }
}

/// Bounded, ordered queue of pending MIDI events.
pub struct MidiEventQueue {
    events: Vec<MidiEvent>,
    capacity: usize,
}

impl MidiEventQueue {
    /// Create a new queue with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Clear the queue without deallocating.
    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Append an event if there's capacity.
    ///
    /// Returns `false` when the queue is full; the event is dropped.
    #[inline]
    pub fn push(&mut self, event: MidiEvent) -> bool {
        if self.events.len() < self.capacity {
            self.events.push(event);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[MidiEvent] {
        &self.events
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }
}

impl Default for MidiEventQueue {
    fn default() -> Self {
        Self::with_capacity(MAX_MIDI_EVENTS)
    }
}
