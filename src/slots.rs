//! Per-participant result slots.
//!
//! # Ownership
//!
//! Slot `i` is written by participant `i` only, exactly once per run. The
//! harness reads slots only after [`Rendezvous::wait_all_departed`]
//! returns, which orders every write before every read. Slot stores are
//! therefore `Relaxed`; the rendezvous counter carries the synchronization.
//!
//! # Layout
//!
//! Slots are `CachePadded` so concurrent writers never share a line. Each
//! slot stores the `f64` bit pattern in an `AtomicU64`; an unwritten slot
//! holds a sentinel NaN pattern that no finite measurement can produce.
//!
//! [`Rendezvous::wait_all_departed`]: crate::rendezvous::Rendezvous::wait_all_departed

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Bit pattern marking an unwritten slot (a quiet NaN with a payload).
const EMPTY: u64 = 0x7ff8_dead_beef_0000;

/// Fixed-size array of single-writer `f64` result slots.
#[derive(Debug)]
pub struct ResultSlots {
    slots: Box<[CachePadded<AtomicU64>]>,
}

impl ResultSlots {
    /// Creates `len` empty slots.
    pub fn new(len: usize) -> Self {
        let slots = (0..len)
            .map(|_| CachePadded::new(AtomicU64::new(EMPTY)))
            .collect();
        Self { slots }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Publishes participant `idx`'s result.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= len()`.
    #[inline]
    pub fn store(&self, idx: usize, value: f64) {
        self.slots[idx].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Reads slot `idx`; `None` if it was never written.
    #[inline]
    pub fn load(&self, idx: usize) -> Option<f64> {
        let bits = self.slots[idx].load(Ordering::Relaxed);
        (bits != EMPTY).then(|| f64::from_bits(bits))
    }

    /// Snapshot of every slot, in participant order.
    pub fn snapshot(&self) -> Vec<Option<f64>> {
        (0..self.len()).map(|i| self.load(i)).collect()
    }

    /// Sum of all written slots.
    pub fn sum(&self) -> f64 {
        (0..self.len()).filter_map(|i| self.load(i)).sum()
    }
}
