//! Core fixed-capacity ring buffer.
//!
//! This module provides the circular storage used by [`crate::sync::queue`].
//! It performs no synchronization of its own: the blocking queue serializes
//! all access by holding it behind a mutex.

use std::collections::TryReserveError;

/// Fixed-length circular buffer over owned slots.
///
/// `head` is the next slot to pop, `tail` the next slot to push. A separate
/// occupancy count distinguishes the full and empty states, so every slot is
/// usable and `head == tail` is ambiguous only to the indices, not to the
/// buffer.
pub(crate) struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> Ring<T> {
    /// Allocates a ring with `capacity` empty slots.
    ///
    /// # Errors
    ///
    /// Returns the allocator's report if the slot storage cannot be reserved.
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        slots.resize_with(capacity, || None);
        Ok(Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            tail: 0,
            len: 0,
        })
    }

    /// Advances a cursor to the next slot index, wrapping to 0 at capacity.
    ///
    /// This is equivalent to `(cursor + 1) % capacity` but avoids the division
    /// instruction, using a comparison and conditional move instead.
    #[inline]
    fn bump_cursor(&self, cursor: usize) -> usize {
        let next = cursor + 1;
        if next == self.slots.len() { 0 } else { next }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Writes `item` into the tail slot and advances the tail cursor.
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if the ring is full, allowing retry.
    #[inline]
    pub(crate) fn push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        // The slot at `tail` is vacant: `len < capacity` and exactly `len`
        // slots starting at `head` are occupied.
        debug_assert!(self.slots[self.tail].is_none());
        self.slots[self.tail] = Some(item);
        self.tail = self.bump_cursor(self.tail);
        self.len += 1;
        Ok(())
    }

    /// Takes the item out of the head slot and advances the head cursor.
    ///
    /// Returns `None` if the ring is empty. A non-empty ring always yields the
    /// oldest still-present item.
    #[inline]
    pub(crate) fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.head].take();
        debug_assert!(item.is_some());
        self.head = self.bump_cursor(self.head);
        self.len -= 1;
        item
    }
}
