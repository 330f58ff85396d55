//! Packet buffer accounting.
//!
//! Every packet in flight lives in a [`PooledPacket`], which returns its slot
//! to the pool when dropped. The pool has a fixed capacity; running out is
//! the simulation's equivalent of a failed allocation and is fatal.

use crate::{packet::Packet, SimError};
use core::{
    fmt,
    ops::Deref,
    sync::atomic::{AtomicUsize, Ordering},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct PacketPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    capacity: usize,
    outstanding: AtomicUsize,
    high_water: AtomicUsize,
}

/// A packet holding one slot of its [`PacketPool`].
pub struct PooledPacket {
    packet: Packet,
    pool: Arc<PoolInner>,
}

impl PacketPool {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                capacity,
                outstanding: AtomicUsize::new(0),
                high_water: AtomicUsize::new(0),
            }),
        }
    }

    /// Claim a slot for `packet`.
    pub fn alloc(&self, packet: Packet) -> Result<PooledPacket, SimError> {
        let capacity = self.inner.capacity;
        let prev = self
            .inner
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| SimError::OutOfPackets { capacity })?;
        self.inner.high_water.fetch_max(prev + 1, Ordering::AcqRel);

        Ok(PooledPacket {
            packet,
            pool: self.inner.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Packets currently allocated and not yet freed.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// The most packets ever outstanding at once.
    pub fn high_water(&self) -> usize {
        self.inner.high_water.load(Ordering::Acquire)
    }
}

impl fmt::Debug for PacketPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketPool")
            .field("capacity", &self.capacity())
            .field("outstanding", &self.outstanding())
            .field("high_water", &self.high_water())
            .finish()
    }
}

// === impl PooledPacket ===

impl Deref for PooledPacket {
    type Target = Packet;

    fn deref(&self) -> &Packet {
        &self.packet
    }
}

impl Drop for PooledPacket {
    fn drop(&mut self) {
        self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for PooledPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.packet, f)
    }
}
