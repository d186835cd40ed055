use core::mem;

use super::Slice;

/// A bounded circular first-in first-out queue.
///
/// The capacity is fixed by the storage handed to [`new`] and is never
/// resized afterwards. Pushing into a full ring is rejected instead of
/// overwriting the oldest element, which is the behaviour the protocol
/// relies on for back-pressure.
///
/// Elements are moved in and out by value. Popping replaces the slot with
/// the element's default value, so the ring never holds references into
/// vacated slots.
///
/// [`new`]: #method.new
#[derive(Debug)]
pub struct Ring<'a, T> {
    storage: Slice<'a, T>,
    head: usize,
    count: usize,
}

/// Returned by [`Ring::push`] when no free slot is left.
///
/// The rejected element is handed back to the caller.
///
/// [`Ring::push`]: struct.Ring.html#method.push
#[derive(Debug, PartialEq, Eq)]
pub struct Full<T>(
    /// The element that did not fit.
    pub T,
);

impl<'a, T> Ring<'a, T> {
    /// Create a ring over the given storage, initially empty.
    pub fn new<C>(storage: C) -> Self
        where C: Into<Slice<'a, T>>,
    {
        Ring {
            storage: storage.into(),
            head: 0,
            count: 0,
        }
    }

    /// The maximum number of elements the ring can hold.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The number of elements currently queued.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if no element is queued.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Check if no free slot is left.
    pub fn is_full(&self) -> bool {
        self.count == self.storage.len()
    }

    /// A reference to the oldest queued element, without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.count == 0 {
            return None;
        }
        Some(&self.storage[self.head])
    }

    fn wrap(&self, base: usize, add: usize) -> usize {
        let len = self.storage.len();
        debug_assert!(len > 0 && base < len && add <= len);
        (base + add) % len
    }
}

impl<'a, T: Default> Ring<'a, T> {
    /// Append an element at the back.
    ///
    /// On success returns the remaining free capacity. A full ring rejects
    /// the element and leaves the queued contents untouched.
    pub fn push(&mut self, element: T) -> Result<usize, Full<T>> {
        if self.is_full() {
            return Err(Full(element));
        }
        let tail = self.wrap(self.head, self.count);
        self.storage[tail] = element;
        self.count += 1;
        Ok(self.capacity() - self.count)
    }

    /// Remove and return the oldest element.
    pub fn pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let element = mem::take(&mut self.storage[self.head]);
        self.head = self.wrap(self.head, 1);
        self.count -= 1;
        Some(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut ring = Ring::new(vec![0u32; 4]);
        for el in 1..=4 {
            ring.push(el).unwrap();
        }
        assert!(ring.is_full());
        assert_eq!(ring.peek(), Some(&1));
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), Some(2));
        ring.push(5).unwrap();
        ring.push(6).unwrap();
        assert_eq!(ring.pop(), Some(3));
        assert_eq!(ring.pop(), Some(4));
        assert_eq!(ring.pop(), Some(5));
        assert_eq!(ring.pop(), Some(6));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn full_rejects_without_clobbering() {
        let mut ring = Ring::new(vec![0u32; 2]);
        assert_eq!(ring.push(1), Ok(1));
        assert_eq!(ring.push(2), Ok(0));
        assert_eq!(ring.push(3), Err(Full(3)));
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), Some(2));
    }

    #[test]
    fn len_never_exceeds_capacity() {
        let mut ring = Ring::new(vec![0u32; 3]);
        for el in 0..10 {
            let _ = ring.push(el);
            assert!(ring.len() <= ring.capacity());
        }
    }

    #[test]
    fn zero_capacity_always_full() {
        let mut ring = Ring::<u32>::new(Slice::empty());
        assert!(ring.is_full());
        assert_eq!(ring.push(7), Err(Full(7)));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn borrowed_storage() {
        let mut slots = [0u8; 2];
        let mut ring = Ring::new(&mut slots[..]);
        ring.push(0xaa).unwrap();
        assert_eq!(ring.pop(), Some(0xaa));
    }
}
