//! The write side of a FIFO: owns the write cursor, the writer's private
//! view of free space, and descriptor publication.
//!
//! Unlike a design that splits publication into a separate "claim" step
//! (advance the write pointer and descriptor index without publishing) and a
//! "commit" step (publish a descriptor that may or may not be the one just
//! claimed) — a claim-then-commit split some implementations leave
//! unfinished — this collapses the two into one step: [`FifoWriter::commit`]
//! both publishes a descriptor and advances the descriptor cursor;
//! [`FifoWriter::advance`] only ever moves the byte write-pointer and
//! free-space bookkeeping.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::DatafifoError;
use crate::invariants::{
    debug_assert_advance_within_free, debug_assert_is_aligned, debug_assert_offset_in_bounds,
    debug_assert_size_bound,
};
use crate::metrics::FifoMetrics;
use crate::region::SharedFifo;
use crate::wire::{self, STATUS_WAITING};

/// Writer handle to one FIFO. Not `Clone`; a FIFO has exactly one writer.
pub struct FifoWriter {
    fifo: Arc<SharedFifo>,
    datasize: usize,
    align: usize,

    /// Descriptor-ring index of the next slot this writer will publish into.
    next_write_index: usize,
    /// Descriptor-ring index the writer last found the reader parked at.
    last_reader_index: usize,
    /// Byte offset of the last descriptor the writer observed the reader
    /// sitting at, or `None` before the first `update_reader` finds one
    /// (mirrors the source's `plast_read = pdata - 1` sentinel).
    last_read_ptr: Option<usize>,

    /// Free space from `write_ptr` to the reader, without wrapping.
    free_contiguous: usize,
    /// Free space from the start of the data area to the reader, available
    /// only once the writer wraps back to offset 0.
    free_after_wrap: usize,
    /// Byte offset of the next write.
    write_ptr: usize,

    wakeup_target: Option<Arc<dyn crate::wakeup::WakeupTarget>>,
    metrics: FifoMetrics,
}

impl FifoWriter {
    /// Attaches a writer to `fifo`, with fresh (empty) cursor state.
    #[must_use]
    pub fn new(fifo: Arc<SharedFifo>) -> Self {
        let datasize = fifo.layout().datasize() as usize;
        let align = fifo.layout().align() as usize;
        Self {
            fifo,
            datasize,
            align,
            next_write_index: 0,
            last_reader_index: 0,
            last_read_ptr: None,
            free_contiguous: datasize,
            free_after_wrap: 0,
            write_ptr: 0,
            wakeup_target: None,
            metrics: FifoMetrics::default(),
        }
    }

    /// Installs the target woken by [`Self::wakeup_reader`].
    pub fn set_wakeup_target(&mut self, target: Arc<dyn crate::wakeup::WakeupTarget>) {
        self.wakeup_target = Some(target);
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn metrics(&self) -> FifoMetrics {
        self.metrics
    }

    fn align_up(&self, size: usize) -> usize {
        let mask = self.align - 1;
        (size + mask) & !mask
    }

    /// Refreshes the writer's view of where the reader is, recomputing free
    /// space. Must be called before [`Self::get_free_contiguous`] or
    /// [`Self::get_free_total`] return a meaningful answer.
    ///
    /// Grounded on `fifo_writer_update_reader`/`_fifo_writer_get_reader`:
    /// scans forward from the last known reader position looking for the
    /// first still-used descriptor. If the scan reaches the writer's own
    /// cursor without finding one, the ring is either completely full or
    /// completely empty; the boundary slot's used bit (checked once more, at
    /// `next_write_index` itself) disambiguates the two, since a full ring
    /// has every slot used including the one the writer's cursor points at.
    pub fn update_reader(&mut self) {
        let ring = self.fifo.ring();
        let mut idx = self.last_reader_index;

        while idx != self.next_write_index {
            let (payload, used) = ring.get(idx);
            if used {
                self.last_reader_index = idx;
                let (offset_div4, _size) = wire::unpack_descriptor_payload(payload);
                self.apply_reader_position(offset_div4 as usize * 4);
                return;
            }
            idx = ring.next(idx);
        }

        // Reader caught up to the writer's cursor: full or empty.
        self.last_reader_index = self.next_write_index;
        let (payload, used) = ring.get(self.next_write_index);
        if used {
            let (offset_div4, _size) = wire::unpack_descriptor_payload(payload);
            self.apply_reader_position(offset_div4 as usize * 4);
        } else {
            self.free_contiguous = self.datasize;
            self.free_after_wrap = 0;
            self.write_ptr = 0;
            self.last_read_ptr = None;
        }
    }

    fn apply_reader_position(&mut self, reader_offset: usize) {
        self.last_read_ptr = Some(reader_offset);
        if reader_offset >= self.write_ptr {
            self.free_contiguous = reader_offset - self.write_ptr;
            self.free_after_wrap = 0;
        } else {
            // free_contiguous unchanged: still the space remaining before the
            // end of the data area.
            self.free_after_wrap = reader_offset;
        }
    }

    /// Returns free space in a single contiguous block of at least
    /// `min_size`, wrapping the write pointer back to the start of the data
    /// area first if doing so yields more contiguous space. Call
    /// [`Self::update_reader`] first.
    pub fn get_free_contiguous(&mut self, min_size: usize) -> usize {
        let aligned = self.align_up(min_size);
        if self.free_contiguous < aligned && self.free_after_wrap > self.free_contiguous {
            self.write_ptr = 0;
            self.free_contiguous = self.free_after_wrap;
            self.free_after_wrap = 0;
        }
        self.free_contiguous
    }

    /// Total free space, contiguous plus what would become available after
    /// wrapping. Call [`Self::update_reader`] first.
    #[must_use]
    pub fn get_free_total(&self) -> usize {
        self.free_contiguous + self.free_after_wrap
    }

    /// The current write pointer, as a raw pointer into the FIFO's data
    /// area.
    #[must_use]
    pub fn get_pointer(&self) -> *mut u8 {
        // SAFETY: `write_ptr` is always within `[0, datasize)`, maintained by
        // `advance`/`update_reader`.
        unsafe { self.fifo.data_ptr().add(self.write_ptr) }
    }

    /// Publishes a descriptor covering `size` bytes starting at `ptr`
    /// (previously obtained from [`Self::get_pointer`], possibly offset
    /// further for a multi-descriptor batch) and advances the descriptor
    /// cursor.
    ///
    /// # Errors
    ///
    /// Returns [`DatafifoError::OversizeRecord`] if `size` exceeds the
    /// 12-bit descriptor size field, or [`DatafifoError::PointerOutOfRange`]
    /// if `ptr` does not fall inside this writer's data area.
    pub fn commit(&mut self, ptr: *mut u8, size: usize) -> Result<usize, DatafifoError> {
        if size > crate::config::MAX_RECORD_SIZE {
            return Err(DatafifoError::OversizeRecord {
                size,
                max: crate::config::MAX_RECORD_SIZE,
            });
        }

        let base = self.fifo.data_ptr() as usize;
        let ptr_addr = ptr as usize;
        if ptr_addr < base {
            return Err(DatafifoError::PointerOutOfRange);
        }
        let offset = ptr_addr - base;
        if offset % 4 != 0 || offset + size > self.datasize {
            return Err(DatafifoError::PointerOutOfRange);
        }

        debug_assert_size_bound!(size, crate::config::MAX_RECORD_SIZE);
        debug_assert_offset_in_bounds!(offset, size, self.datasize);

        let payload = wire::pack_descriptor_payload((offset / 4) as u16, size as u16);
        self.fifo.ring().put(self.next_write_index, payload);
        self.next_write_index = self.fifo.ring().next(self.next_write_index);
        self.metrics.records_committed += 1;
        Ok(size)
    }

    /// Advances the byte write pointer by `size` bytes (rounded up to the
    /// alignment quantum) without touching the descriptor cursor. Used once
    /// per batch, after every descriptor in the batch has already been
    /// committed individually.
    pub fn advance(&mut self, size: usize) -> usize {
        let aligned = self.align_up(size);
        debug_assert_advance_within_free!(aligned, self.free_contiguous);
        debug_assert_is_aligned!(aligned, self.align);

        self.free_contiguous -= aligned;
        self.write_ptr += aligned;
        self.metrics.bytes_advanced += aligned as u64;
        aligned
    }

    /// Wakes the reader if it is parked waiting for data, or unconditionally
    /// if `force` is set.
    pub fn wakeup_reader(&mut self, force: bool) {
        let reader_waiting =
            self.fifo.reader_status().load(Ordering::Acquire) & STATUS_WAITING != 0;
        if !force && !reader_waiting {
            self.metrics.wakeups_suppressed += 1;
            return;
        }
        if let Some(target) = &self.wakeup_target {
            target.wake();
            self.metrics.wakeups_delivered += 1;
            tracing::trace!(force, "woke reader");
        }
    }

    /// Sets or clears this writer's own WAITING flag, for a producer that is
    /// about to park because the sink is full. The reader's [`Self::wakeup_reader`] counterpart —
    /// [`crate::reader::FifoReader::wakeup_writer`] — consults this flag to
    /// decide whether a non-forced wakeup should actually fire.
    pub fn set_waiting(&mut self, waiting: bool) {
        let bits = if waiting { STATUS_WAITING } else { 0 };
        self.fifo.writer_status().store(bits, Ordering::Release);
    }
}
