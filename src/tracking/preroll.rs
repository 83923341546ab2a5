use std::collections::VecDeque;

use bytes::Bytes;

/// Rolling window of the most recent raw frames seen while Idle.
pub struct PreRollBuffer {
    frames: VecDeque<Bytes>,
    capacity: usize,
}

impl PreRollBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes a frame, evicting the oldest one once full.
    pub fn append(&mut self, frame: Bytes) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Takes every buffered frame, oldest first, leaving the buffer empty.
    pub fn drain_in_order(&mut self) -> Vec<Bytes> {
        self.frames.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
