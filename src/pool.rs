//! Rotating pool of preallocated frame buffers.
//!
//! The delivery path claims the next slot round-robin and repacks into it,
//! so steady-state capture performs no per-frame allocation. Pool size is
//! the only backpressure mechanism: a consumer must finish with slot *k*
//! before the producer wraps back to it (with the default 2 slots, the
//! next-but-one frame). Synchronous sinks only ever hold a borrow of the
//! slot, which makes the wrap-around window unreachable for them; sinks
//! that copy bytes out late inherit the documented race window.

use zeroize::Zeroize;

use crate::error::PoolError;
use crate::repack::required_len;

/// Default number of rotating buffers.
pub const DEFAULT_POOL_SLOTS: usize = 2;

/// A claimed pool slot, valid until the pool wraps back to it.
#[derive(Debug)]
pub struct PoolSlot<'a> {
    pub index: usize,
    pub bytes: &'a mut [u8],
}

pub struct FramePool {
    slots: Vec<Vec<u8>>,
    slot_capacity: usize,
    next: usize,
}

impl FramePool {
    /// An unsized pool. Acquiring from it fails until [`FramePool::sized`]
    /// replaces it; sizing happens during session start.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            slot_capacity: 0,
            next: 0,
        }
    }

    /// Allocate `slot_count` buffers sized for `width`×`height` planar
    /// frames (luma plus two half-resolution chroma planes).
    pub fn sized(width: u32, height: u32, slot_count: usize) -> Self {
        let slot_capacity = required_len(width, height);
        let slots = (0..slot_count.max(1))
            .map(|_| vec![0u8; slot_capacity])
            .collect();
        Self {
            slots,
            slot_capacity,
            next: 0,
        }
    }

    /// Claim the next buffer round-robin, advancing the rotation index.
    /// There is no blocking wait; the caller owns the slot until it is
    /// claimed again after a full rotation.
    pub fn acquire_next_slot(&mut self) -> Result<PoolSlot<'_>, PoolError> {
        if self.slots.is_empty() {
            return Err(PoolError::NotSized);
        }
        let index = self.next;
        self.next = (self.next + 1) % self.slots.len();
        Ok(PoolSlot {
            index,
            bytes: self.slots[index].as_mut_slice(),
        })
    }

    pub fn is_sized(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }
}

impl Default for FramePool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FramePool {
    fn drop(&mut self) {
        // Stale frame contents do not outlive the session.
        for slot in &mut self.slots {
            slot.zeroize();
        }
    }
}
