//! The read side of a FIFO: owns the read cursor and descriptor consumption,
//! including batch coalescing.
//!
//! Unlike a claim-then-free split (a separate "mark consumed" step ahead of
//! "release to the writer"), this reader collapses both into a single
//! cursor: [`FifoReader::pop`] both clears a descriptor's used bit and
//! advances the cursor in one step.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::invariants::{debug_assert_batch_offsets_increasing, debug_assert_cursor_step};
use crate::metrics::FifoMetrics;
use crate::region::SharedFifo;
use crate::wire::{self, STATUS_WAITING};

/// Reader handle to one FIFO. Not `Clone`; a FIFO has exactly one reader.
pub struct FifoReader {
    fifo: Arc<SharedFifo>,
    datasize: usize,

    /// Descriptor-ring index of the next slot this reader will consume.
    next_read_index: usize,

    wakeup_target: Option<Arc<dyn crate::wakeup::WakeupTarget>>,
    metrics: FifoMetrics,
}

impl FifoReader {
    /// Attaches a reader to `fifo`, with a fresh read cursor at index 0.
    #[must_use]
    pub fn new(fifo: Arc<SharedFifo>) -> Self {
        let datasize = fifo.layout().datasize() as usize;
        Self {
            fifo,
            datasize,
            next_read_index: 0,
            wakeup_target: None,
            metrics: FifoMetrics::default(),
        }
    }

    /// Installs the target woken by [`Self::wakeup_writer`].
    pub fn set_wakeup_target(&mut self, target: Arc<dyn crate::wakeup::WakeupTarget>) {
        self.wakeup_target = Some(target);
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn metrics(&self) -> FifoMetrics {
        self.metrics
    }

    /// Whether the next descriptor slot is unpublished. A FIFO can never
    /// reliably report "full" this way — only "empty" (`fifo_reader_is_empty`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.fifo.ring().is_used(self.next_read_index)
    }

    /// Returns `(pointer, size)` for the next unread record, or `None` if
    /// the FIFO is empty.
    #[must_use]
    pub fn get(&self) -> Option<(*const u8, usize)> {
        let (payload, used) = self.fifo.ring().get(self.next_read_index);
        if !used {
            return None;
        }
        let (offset_div4, size) = wire::unpack_descriptor_payload(payload);
        let ptr = unsafe { self.fifo.data_ptr().add(offset_div4 as usize * 4) };
        Some((ptr.cast_const(), size as usize))
    }

    /// Coalesces as many contiguous descriptors as fit within
    /// `batch_size_max`, returning `(pointer, batch_count, batch_size)`.
    ///
    /// Grounded on `fifo_reader_get_batch`: the first descriptor alone must
    /// fit within `batch_size_max` or the call fails outright (there is no
    /// partial batch of zero records). Subsequent descriptors are folded in
    /// only while their offset strictly increases past the first descriptor's
    /// offset (a non-increasing offset means the ring wrapped, which ends the
    /// batch) and the cumulative span from the first descriptor's offset
    /// stays within `batch_size_max`.
    #[must_use]
    pub fn get_batch(&self, batch_size_max: usize) -> Option<(*const u8, usize, usize)> {
        let ring = self.fifo.ring();
        let mut index = self.next_read_index;

        let (payload, used) = ring.get(index);
        if !used {
            return None;
        }
        let (offset_div4, size) = wire::unpack_descriptor_payload(payload);
        if size as usize > batch_size_max {
            return None;
        }

        let offset_first = offset_div4 as usize * 4;
        let mut batch_count = 1usize;
        let mut batch_size = size as usize;

        index = ring.next(index);
        loop {
            let (payload, used) = ring.get(index);
            if !used {
                break;
            }
            let (offset_div4, size) = wire::unpack_descriptor_payload(payload);
            let offset = offset_div4 as usize * 4;

            if offset <= offset_first {
                break;
            }
            debug_assert_batch_offsets_increasing!(offset_first, offset);

            let span = (offset - offset_first) + size as usize;
            if span > batch_size_max {
                break;
            }

            batch_count += 1;
            batch_size = span;
            index = ring.next(index);
        }

        let ptr = unsafe { self.fifo.data_ptr().add(offset_first) };
        Some((ptr.cast_const(), batch_count, batch_size))
    }

    /// Clears the next descriptor's used bit, releasing it back to the
    /// writer, and advances the read cursor by one slot.
    pub fn pop(&mut self) {
        let ring = self.fifo.ring();
        ring.clear_slot(self.next_read_index);
        let next = ring.next(self.next_read_index);
        debug_assert_cursor_step!(self.next_read_index, next, ring.mask());
        self.next_read_index = next;
        self.metrics.records_popped += 1;
    }

    /// Resets the entire descriptor ring and the read cursor. Test-harness
    /// only: used between scenario runs, never by the core transport itself.
    pub fn clear(&mut self) {
        self.fifo.ring().clear();
        self.next_read_index = 0;
    }

    /// Wakes the writer if it is parked waiting for free space, or
    /// unconditionally if `force` is set.
    pub fn wakeup_writer(&mut self, force: bool) {
        let writer_waiting =
            self.fifo.writer_status().load(Ordering::Acquire) & STATUS_WAITING != 0;
        if !force && !writer_waiting {
            self.metrics.wakeups_suppressed += 1;
            return;
        }
        if let Some(target) = &self.wakeup_target {
            target.wake();
            self.metrics.wakeups_delivered += 1;
            tracing::trace!(force, "woke writer");
        }
    }

    /// Sets or clears this reader's own WAITING flag, for a consumer that is
    /// about to park because the source is empty. The writer's [`Self::wakeup_writer`]
    /// counterpart — [`crate::writer::FifoWriter::wakeup_reader`] — consults
    /// this flag to decide whether a non-forced wakeup should actually fire.
    pub fn set_waiting(&mut self, waiting: bool) {
        let bits = if waiting { STATUS_WAITING } else { 0 };
        self.fifo.reader_status().store(bits, Ordering::Release);
    }

    pub(crate) fn datasize(&self) -> usize {
        self.datasize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FifoLayout;
    use crate::writer::FifoWriter;

    fn fresh_pair() -> (FifoWriter, FifoReader) {
        let fifo = SharedFifo::create(FifoLayout::default());
        (FifoWriter::new(Arc::clone(&fifo)), FifoReader::new(fifo))
    }

    #[test]
    fn fresh_reader_is_empty() {
        let (_writer, reader) = fresh_pair();
        assert!(reader.is_empty());
        assert!(reader.get().is_none());
    }

    #[test]
    fn commit_then_get_round_trips_a_record() {
        let (mut writer, mut reader) = fresh_pair();
        writer.update_reader();
        let ptr = writer.get_pointer();
        unsafe {
            std::ptr::write_bytes(ptr, 0xAB, 16);
        }
        writer.commit(ptr, 16).unwrap();
        writer.advance(16);

        assert!(!reader.is_empty());
        let (read_ptr, size) = reader.get().unwrap();
        assert_eq!(size, 16);
        assert_eq!(read_ptr, ptr.cast_const());
        reader.pop();
        assert!(reader.is_empty());
    }

    #[test]
    fn get_batch_rejects_a_first_record_larger_than_the_cap() {
        let (mut writer, reader) = fresh_pair();
        writer.update_reader();
        let ptr = writer.get_pointer();
        writer.commit(ptr, 64).unwrap();
        writer.advance(64);
        assert!(reader.get_batch(32).is_none());
    }

    #[test]
    fn get_batch_coalesces_contiguous_records() {
        let (mut writer, reader) = fresh_pair();
        for _ in 0..3 {
            writer.update_reader();
            let ptr = writer.get_pointer();
            writer.commit(ptr, 16).unwrap();
            writer.advance(16);
        }
        let (_ptr, count, size) = reader.get_batch(1024).unwrap();
        assert_eq!(count, 3);
        assert_eq!(size, 48);
    }

    #[test]
    fn get_batch_stops_when_the_ring_wraps_back_to_the_first_descriptor() {
        let fifo = SharedFifo::create(FifoLayout::new(256, 4, 16));
        let mut writer = FifoWriter::new(Arc::clone(&fifo));
        let reader = FifoReader::new(Arc::clone(&fifo));

        // Fill every one of the 4 slots: offsets 0, 16, 32, 48, all strictly
        // increasing. The ring index then wraps back to slot 0, whose offset
        // (0) is not greater than offset_first (0), ending the batch at all
        // 4 records rather than looping forever.
        for _ in 0..4 {
            writer.update_reader();
            let ptr = writer.get_pointer();
            writer.commit(ptr, 16).unwrap();
            writer.advance(16);
        }

        let (_ptr, count, size) = reader.get_batch(1024).unwrap();
        assert_eq!(count, 4);
        assert_eq!(size, 64);
    }
}
