//! # descring
//!
//! A fixed-capacity circular buffer of buffer descriptors, as shared between a
//! host driver and a device's firmware.
//!
//! The ring is indexed by two counters: `head` is the next slot to write and
//! `tail` is the next slot to read, both modulo the capacity `N`. One slot is
//! always kept empty, so that the ring is empty iff `head == tail` and full iff
//! `(head + 1) % N == tail`. A ring of capacity `N` therefore holds at most
//! `N - 1` descriptors.
//!
//! ## Ownership
//!
//! [`DescriptorRing::push`] moves a buffer into the ring, and
//! [`DescriptorRing::pop`] moves it back out to the consumer. A rejected push
//! hands the buffer back in [`Full`], so the caller decides whether to retry,
//! requeue or drop it.
//!
//! ## Locking
//!
//! The ring is *not* internally synchronized. Both operations take `&mut self`,
//! so sharing a ring between tasks requires wrapping it in a lock; the
//! producer and consumer of one ring agree on that lock, and the ring never
//! needs to know about it.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::boxed::Box;
use core::fmt;

/// A single ring slot.
pub struct Descriptor<T> {
    valid: bool,
    len: u32,
    buf: Option<T>,
}

/// A fixed-capacity, single-producer/single-consumer descriptor ring.
pub struct DescriptorRing<T> {
    desc: Box<[Descriptor<T>]>,
    head: usize,
    tail: usize,
}

/// Returned by [`DescriptorRing::push`] when the ring is full.
///
/// Carries the rejected buffer back to the caller; the ring is unchanged.
#[derive(Debug, Eq, PartialEq)]
pub struct Full<T>(pub T);

/// Returned by [`DescriptorRing::pop`] when there is nothing to read.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct Empty;

// === impl Descriptor ===

impl<T> Descriptor<T> {
    fn empty() -> Self {
        Self {
            valid: false,
            len: 0,
            buf: None,
        }
    }

    /// Is this slot currently owned by the ring (pushed, not yet popped)?
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The length recorded by the most recent push into this slot.
    pub fn length(&self) -> u32 {
        self.len
    }

    /// A shared reference to the buffer held by this slot, if it is valid.
    pub fn buf(&self) -> Option<&T> {
        if self.valid {
            self.buf.as_ref()
        } else {
            None
        }
    }
}

impl<T> fmt::Debug for Descriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("valid", &self.valid)
            .field("len", &self.len)
            .finish()
    }
}

// === impl DescriptorRing ===

impl<T> DescriptorRing<T> {
    /// Creates an empty ring with `capacity` slots (`capacity - 1` usable).
    ///
    /// The capacity must be at least 2, or this will panic.
    #[track_caller]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 1, "Capacity must be larger than 1!");
        let desc = (0..capacity).map(|_| Descriptor::empty()).collect();
        Self {
            desc,
            head: 0,
            tail: 0,
        }
    }

    /// Stores `buf` at `head` and advances `head`.
    ///
    /// If the ring is full, nothing changes and `buf` is handed back in
    /// [`Full`].
    pub fn push(&mut self, buf: T, len: u32) -> Result<(), Full<T>> {
        let next = self.wrap(self.head + 1);
        if next == self.tail {
            return Err(Full(buf));
        }

        let slot = &mut self.desc[self.head];
        slot.buf = Some(buf);
        slot.len = len;
        slot.valid = true;
        self.head = next;
        Ok(())
    }

    /// Takes the buffer at `tail` and advances `tail`.
    ///
    /// Returns [`Empty`] without changing anything if `head == tail`, or if the
    /// slot at `tail` has not been marked valid.
    pub fn pop(&mut self) -> Result<(T, u32), Empty> {
        if self.tail == self.head {
            return Err(Empty);
        }

        let slot = &mut self.desc[self.tail];
        if !slot.valid {
            return Err(Empty);
        }

        let buf = slot.buf.take().ok_or(Empty)?;
        slot.valid = false;
        let len = slot.len;
        self.tail = self.wrap(self.tail + 1);
        Ok((buf, len))
    }

    /// A shared reference to the buffer that the next [`pop`](Self::pop)
    /// would return.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.desc[self.tail].buf()
    }

    /// Iterates over the occupied slots' buffers, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len()).filter_map(move |i| self.desc[self.wrap(self.tail + i)].buf())
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.wrap(self.head + 1) == self.tail
    }

    /// Number of descriptors currently held.
    pub fn len(&self) -> usize {
        (self.head + self.capacity() - self.tail) % self.capacity()
    }

    /// Number of slots, including the one that is always left empty.
    pub fn capacity(&self) -> usize {
        self.desc.len()
    }

    /// Maximum number of descriptors the ring can hold at once.
    pub fn usable(&self) -> usize {
        self.capacity() - 1
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    /// The raw slot at `idx`, for inspecting ring state.
    ///
    /// # Panics
    ///
    /// If `idx >= self.capacity()`.
    #[track_caller]
    pub fn descriptor(&self, idx: usize) -> &Descriptor<T> {
        &self.desc[idx]
    }

    #[inline]
    fn wrap(&self, idx: usize) -> usize {
        idx % self.capacity()
    }
}

impl<T> fmt::Debug for DescriptorRing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorRing")
            .field("capacity", &self.capacity())
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("len", &self.len())
            .finish()
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("descriptor ring full")
    }
}

impl fmt::Display for Empty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("descriptor ring empty")
    }
}
