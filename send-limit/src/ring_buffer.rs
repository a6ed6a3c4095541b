use std::num::NonZeroUsize;

/// A fixed capacity circular buffer.
///
/// Holds at most `capacity` items. Once full, every insertion overwrites
/// the logically oldest item, which is always the slot under the write cursor.
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Next slot to write, once the buffer has wrapped.
    cursor: usize,
    full: bool,
}

impl<T: Copy> RingBuffer<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.get()),
            capacity: capacity.get(),
            cursor: 0,
            full: false,
        }
    }

    /// Insert an item, overwriting the oldest one if the buffer is full.
    pub fn insert(&mut self, item: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.cursor] = item;
        }

        self.cursor = (self.cursor + 1) % self.capacity;
        if self.cursor == 0 {
            self.full = true;
        }
    }

    /// The oldest item in the buffer.
    ///
    /// Until the buffer has been filled this is the first item ever inserted.
    /// Afterwards it is the item the next insertion will overwrite. Returns
    /// `None` only if nothing has been inserted yet.
    pub fn oldest(&self) -> Option<T> {
        if self.full {
            self.slots.get(self.cursor).copied()
        } else {
            self.slots.first().copied()
        }
    }

    /// True once `capacity` items have been inserted. Never reverts.
    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(capacity: usize) -> RingBuffer<u32> {
        RingBuffer::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn it_reports_the_oldest_item() {
        let mut rb = buffer(4);
        assert_eq!(rb.oldest(), None);

        let mut oldest = vec![];
        for i in 1..=8 {
            rb.insert(i);
            oldest.push(rb.oldest().unwrap());
        }
        assert_eq!(oldest, vec![1, 1, 1, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn it_overwrites_items_once_wrapped() {
        let n = 4;
        let mut rb = buffer(n as usize);

        for i in 0..1000 {
            rb.insert(i);

            let expected = if i < n { 0 } else { i - n + 1 };
            assert_eq!(rb.oldest(), Some(expected), "after inserting {i}");
        }
        assert_eq!(rb.len(), n as usize);
    }

    #[test]
    fn it_becomes_full_after_capacity_inserts() {
        let mut rb = buffer(4);

        let mut full = vec![];
        for i in 1..=8 {
            rb.insert(i);
            full.push(rb.is_full());
        }
        assert_eq!(
            full,
            vec![false, false, false, true, true, true, true, true]
        );
    }

    #[test]
    fn test_single_slot_buffer() {
        let mut rb = buffer(1);
        assert!(rb.is_empty());

        rb.insert(7);
        assert!(rb.is_full());
        assert_eq!(rb.oldest(), Some(7));

        rb.insert(8);
        assert_eq!(rb.oldest(), Some(8));
        assert_eq!(rb.len(), 1);
        assert_eq!(rb.capacity(), 1);
    }
}
