//! Fixed-capacity circular buffer.
//!
//! Memory stays bounded by the capacity no matter how long the video is.

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    /// Next slot to overwrite once the buffer is full.
    write_index: usize,
}

impl<T: Copy> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            write_index: 0,
        }
    }

    pub fn push(&mut self, value: T) {
        if self.data.len() < self.capacity {
            self.data.push(value);
        } else {
            self.data[self.write_index] = value;
        }
        self.write_index = (self.write_index + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let split = if self.is_full() { self.write_index } else { 0 };
        self.data[split..].iter().chain(self.data[..split].iter())
    }

    pub fn latest(&self) -> Option<&T> {
        if self.data.is_empty() {
            return None;
        }
        let idx = (self.write_index + self.capacity - 1) % self.capacity;
        self.data.get(idx)
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.write_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_newest_values_in_order() {
        let mut ring = RingBuffer::new(3);
        for v in 1..=5 {
            ring.push(v);
        }
        assert!(ring.is_full());
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(ring.latest(), Some(&5));
    }

    #[test]
    fn partial_buffer_iterates_from_start() {
        let mut ring = RingBuffer::new(4);
        ring.push(10);
        ring.push(20);
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![10, 20]);
        assert_eq!(ring.latest(), Some(&20));

        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.latest(), None);
    }
}
