use std::collections::VecDeque;

/// Bounded FIFO buffer. Adding to a full buffer evicts the oldest element.
#[derive(Clone, Debug, PartialEq)]
pub struct RingBuffer<T> {
    max_buffer_len: usize,
    buffer: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(max_buffer_len: usize) -> Self {
        assert!(max_buffer_len > 0);
        Self {
            max_buffer_len,
            buffer: VecDeque::with_capacity(max_buffer_len),
        }
    }

    pub fn capacity(&self) -> usize { self.max_buffer_len }

    pub fn len(&self) -> usize { self.buffer.len() }

    pub fn is_empty(&self) -> bool { self.buffer.is_empty() }

    pub fn add(&mut self, element: T) {
        if self.buffer.len() == self.max_buffer_len {
            self.buffer.pop_front();
        }
        self.buffer.push_back(element);
    }

    /// oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> { self.buffer.iter() }
}
