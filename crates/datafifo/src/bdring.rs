//! The buffer-descriptor ring: a fixed-size, power-of-two array of 32-bit
//! slots, each carrying a one-bit "used" ownership flag over 31 payload bits.
//!
//! `BdRing` borrows its storage rather than owning it: it is just a pointer
//! and a count over memory someone else allocated. The storage backing a
//! `BdRing` is always a slice of a [`crate::region::SharedFifo`]'s ring.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::invariants::debug_assert_used_transition;

/// Bit 31 of a slot: set iff the slot's payload is live and unread.
const USED_BIT: u32 = 1 << 31;

/// Mask of the 31 payload bits (everything but the used bit).
const PAYLOAD_MASK: u32 = !USED_BIT;

/// A borrowed view over a power-of-two array of descriptor slots.
///
/// The 32-bit slot read/write is presumed single-copy-atomic; `BdRing` backs
/// this with a real `AtomicU32` so the guarantee holds on every target Rust
/// supports, not only on platforms where a plain `u32` load/store happens to
/// be atomic. Payload bits are written with `Relaxed` ordering; the used-bit
/// transition is the one synchronization point and uses `Release` (publish)
/// and `Acquire` (observe).
#[derive(Clone, Copy)]
pub struct BdRing<'a> {
    slots: &'a [AtomicU32],
    mask: usize,
}

impl<'a> BdRing<'a> {
    /// Wraps an existing slice of slots. `slots.len()` must be a power of
    /// two; this is guaranteed by [`crate::config::FifoLayout`] at
    /// construction time, so it is only debug-checked here.
    #[must_use]
    pub fn new(slots: &'a [AtomicU32]) -> Self {
        debug_assert!(
            slots.len().is_power_of_two(),
            "descriptor ring length must be a power of two"
        );
        Self {
            slots,
            mask: slots.len() - 1,
        }
    }

    /// Number of slots in the ring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Index mask (`N - 1`) used for wrap arithmetic.
    #[must_use]
    pub fn mask(&self) -> usize {
        self.mask
    }

    /// `(i + 1) & mask`.
    #[must_use]
    pub fn next(&self, i: usize) -> usize {
        (i + 1) & self.mask
    }

    /// Zeroes every slot (used bit cleared, payload zero). Used when a region
    /// is first created, and by the test harness's scenario reset.
    pub fn clear(&self) {
        for slot in self.slots {
            slot.store(0, Ordering::Relaxed);
        }
    }

    /// Returns whether the slot at `i` currently carries live payload.
    #[must_use]
    pub fn is_used(&self, i: usize) -> bool {
        self.slots[i & self.mask].load(Ordering::Acquire) & USED_BIT != 0
    }

    /// Reads the slot at `i`, returning `(payload, used)`.
    ///
    /// The load is `Acquire`: if `used` comes back `true`, every byte the
    /// payload refers to (in the accompanying data area) is guaranteed
    /// visible, because the writer's `put` stores the payload before
    /// publishing the used bit.
    #[must_use]
    pub fn get(&self, i: usize) -> (u32, bool) {
        let word = self.slots[i & self.mask].load(Ordering::Acquire);
        (word & PAYLOAD_MASK, word & USED_BIT != 0)
    }

    /// Publishes `payload` at slot `i` with the used bit set, in one store.
    ///
    /// `payload` must not have bit 31 set; callers pack 31 bits of payload
    /// (for FIFO descriptors: a 16-bit offset/4 and a 12-bit size).
    pub fn put(&self, i: usize, payload: u32) {
        debug_assert!(
            payload & USED_BIT == 0,
            "payload must not set the reserved used bit"
        );
        debug_assert_used_transition!(self.is_used(i), false);
        self.slots[i & self.mask].store(payload | USED_BIT, Ordering::Release);
    }

    /// Clears the used bit (and payload) at slot `i`, releasing the slot
    /// back to the writer.
    pub fn clear_slot(&self, i: usize) {
        debug_assert_used_transition!(self.is_used(i), true);
        self.slots[i & self.mask].store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_slots(n: usize) -> Vec<AtomicU32> {
        (0..n).map(|_| AtomicU32::new(0)).collect()
    }

    #[test]
    fn put_then_get_round_trips_payload_and_used_bit() {
        let slots = make_slots(8);
        let ring = BdRing::new(&slots);

        assert!(!ring.is_used(3));
        ring.put(3, 0x1234);
        assert!(ring.is_used(3));
        let (payload, used) = ring.get(3);
        assert_eq!(payload, 0x1234);
        assert!(used);

        ring.clear_slot(3);
        assert!(!ring.is_used(3));
        let (payload, used) = ring.get(3);
        assert_eq!(payload, 0);
        assert!(!used);
    }

    #[test]
    fn next_wraps_modulo_len() {
        let slots = make_slots(4);
        let ring = BdRing::new(&slots);
        assert_eq!(ring.next(0), 1);
        assert_eq!(ring.next(3), 0);
    }

    #[test]
    fn clear_resets_every_slot() {
        let slots = make_slots(4);
        let ring = BdRing::new(&slots);
        for i in 0..4 {
            ring.put(i, i as u32);
        }
        ring.clear();
        for i in 0..4 {
            assert!(!ring.is_used(i));
        }
    }

    #[test]
    #[should_panic(expected = "reserved used bit")]
    fn put_rejects_payload_with_used_bit_set() {
        let slots = make_slots(4);
        let ring = BdRing::new(&slots);
        ring.put(0, USED_BIT);
    }
}
