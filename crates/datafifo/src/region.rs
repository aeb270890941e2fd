//! The shared-memory region itself: header status words, descriptor ring
//! and data area, laid out contiguously.
//!
//! Real shared memory (an `mmap`'d or `shmget`'d block, in a deployment that
//! actually spans two processes) is modeled here as a plain heap allocation
//! behind an `Arc`: the safety argument rests entirely on the SPSC protocol's
//! disjoint-access discipline, not on how the bytes were obtained. A
//! [`FifoReader`](crate::reader::FifoReader) and
//! [`FifoWriter`](crate::writer::FifoWriter) each hold an `Arc<SharedFifo>`
//! and never touch each other's private cursors — only the shared used-bits
//! and status words that the protocol itself synchronizes.

use std::cell::UnsafeCell;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::bdring::BdRing;
use crate::config::FifoLayout;
use crate::wire::{self, HeaderFields};

/// One FIFO's shared-memory region: status words, descriptor ring and data
/// area, all owned jointly by a reader/writer pair via `Arc`.
///
/// `data` is an `UnsafeCell` because the writer and reader each get mutable
/// and shared byte-range access respectively to *disjoint* sub-ranges at any
/// given moment; the protocol (not the type system) guarantees the ranges
/// never overlap, the same way a raw pointer into a shared memory segment
/// relies on the producer/consumer contract rather than a language
/// guarantee.
pub struct SharedFifo {
    layout: FifoLayout,
    // Each status word is touched by a different thread (the reader sets its
    // own WAITING bit and the writer polls it, and vice versa); cache-line
    // padding keeps the two from bouncing the same line back and forth.
    reader_status: CachePadded<AtomicU32>,
    writer_status: CachePadded<AtomicU32>,
    ring: Box<[AtomicU32]>,
    data: UnsafeCell<Box<[u8]>>,
}

// SAFETY: all access to `data` is mediated by the SPSC protocol implemented
// in `reader.rs`/`writer.rs`: the writer only ever writes into the region
// between its private write cursor and the last descriptor the reader has
// popped, and the reader only ever reads a region a descriptor already
// published (and therefore the writer has stopped touching). No byte is ever
// targeted by both sides at once. `Send` is already satisfied automatically
// since every field is `Send`.
unsafe impl Sync for SharedFifo {}

impl SharedFifo {
    /// Creates a fresh, empty region: zeroed ring, zeroed status words,
    /// zeroed data area.
    #[must_use]
    pub fn create(layout: FifoLayout) -> Arc<Self> {
        let ring = (0..layout.bd_count())
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let data = vec![0u8; layout.datasize() as usize].into_boxed_slice();
        Arc::new(Self {
            layout,
            reader_status: CachePadded::new(AtomicU32::new(0)),
            writer_status: CachePadded::new(AtomicU32::new(0)),
            ring,
            data: UnsafeCell::new(data),
        })
    }

    /// Reconstructs a region by decoding a wire-format header out of
    /// `backing` and validating it, rather than trusting a caller-supplied
    /// layout: bd_count and align are read back from the header and the
    /// rest of the regions (ring offset, data offset) are recomputed from
    /// them, rather than trusted from the caller.
    ///
    /// `backing` must already hold a previously-encoded header (see
    /// [`wire::encode_header`]) followed by a descriptor ring and data area
    /// of at least the size the header claims; the ring and data content are
    /// copied in as-is, so this also serves to attach to a region that
    /// already has live descriptors and bytes in flight.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DatafifoError::InvalidLayout`] if the header is
    /// malformed, unreadable, or describes a layout `backing` is too small
    /// to hold.
    pub fn connect(backing: &[u8]) -> crate::Result<Arc<Self>> {
        let HeaderFields {
            bd_count,
            datasize,
            reader_status,
            writer_status,
            align,
        } = wire::decode_header(backing)?;

        let layout = FifoLayout::from_header(backing.len(), bd_count, datasize, align)?;

        let ring_start = layout.ring_offset();
        let ring_bytes = backing
            .get(ring_start..ring_start + bd_count as usize * 4)
            .ok_or(crate::DatafifoError::InvalidLayout {
                reason: "backing buffer too small for the descriptor ring",
            })?;
        let ring: Box<[AtomicU32]> = ring_bytes
            .chunks_exact(4)
            .map(|chunk| {
                AtomicU32::new(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let data_start = layout.data_offset();
        let data_bytes = backing
            .get(data_start..data_start + datasize as usize)
            .ok_or(crate::DatafifoError::InvalidLayout {
                reason: "backing buffer too small for the data area",
            })?;

        Ok(Arc::new(Self {
            layout,
            reader_status: CachePadded::new(AtomicU32::new(reader_status)),
            writer_status: CachePadded::new(AtomicU32::new(writer_status)),
            ring,
            data: UnsafeCell::new(data_bytes.to_vec().into_boxed_slice()),
        }))
    }

    /// Serializes the current header fields into `buf`, for a harness or
    /// test that wants to exercise [`Self::connect`] end to end.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DatafifoError::InvalidLayout`] if `buf` is shorter
    /// than the header.
    pub fn write_header(&self, buf: &mut [u8]) -> crate::Result<()> {
        wire::encode_header(
            buf,
            HeaderFields {
                bd_count: self.layout.bd_count(),
                datasize: self.layout.datasize(),
                reader_status: self.reader_status.load(std::sync::atomic::Ordering::Relaxed),
                writer_status: self.writer_status.load(std::sync::atomic::Ordering::Relaxed),
                align: self.layout.align(),
            },
        )
    }

    /// The validated layout this region was built from.
    #[must_use]
    pub fn layout(&self) -> FifoLayout {
        self.layout
    }

    /// Borrowed view over the descriptor ring.
    #[must_use]
    pub fn ring(&self) -> BdRing<'_> {
        BdRing::new(&self.ring)
    }

    /// Size of the data area, in bytes.
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.data_len_inner()
    }

    fn data_len_inner(&self) -> usize {
        // SAFETY: length is immutable for the lifetime of the region; no
        // concurrent resize ever happens.
        unsafe { (*self.data.get()).len() }
    }

    /// Raw pointer to the start of the data area. Reader and writer convert
    /// this plus a byte offset (always `< data_len()`, enforced by the
    /// cursor bookkeeping in `reader.rs`/`writer.rs`) into the slice they
    /// actually touch.
    #[must_use]
    pub fn data_ptr(&self) -> *mut u8 {
        // SAFETY: caller is responsible for respecting the disjoint-access
        // discipline described on `SharedFifo` itself.
        unsafe { (*self.data.get()).as_mut_ptr() }
    }

    pub(crate) fn reader_status(&self) -> &AtomicU32 {
        &*self.reader_status
    }

    pub(crate) fn writer_status(&self) -> &AtomicU32 {
        &*self.writer_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FifoLayout;

    #[test]
    fn create_yields_an_empty_zeroed_region() {
        let fifo = SharedFifo::create(FifoLayout::default());
        assert_eq!(fifo.data_len(), fifo.layout().datasize() as usize);
        for i in 0..fifo.layout().bd_count() as usize {
            assert!(!fifo.ring().is_used(i));
        }
    }

    #[test]
    fn connect_round_trips_a_freshly_created_region() {
        let layout = FifoLayout::default();
        let fifo = SharedFifo::create(layout);
        fifo.ring().put(0, wire::pack_descriptor_payload(0, 64));

        let mut backing = vec![0u8; layout.total_size()];
        fifo.write_header(&mut backing).unwrap();
        let ring_start = layout.ring_offset();
        for i in 0..layout.bd_count() as usize {
            let (payload, used) = fifo.ring().get(i);
            let word = if used { payload | (1 << 31) } else { 0 };
            backing[ring_start + i * 4..ring_start + i * 4 + 4]
                .copy_from_slice(&word.to_le_bytes());
        }

        let reconnected = SharedFifo::connect(&backing).unwrap();
        assert_eq!(reconnected.layout(), layout);
        assert!(reconnected.ring().is_used(0));
        let (payload, _) = reconnected.ring().get(0);
        assert_eq!(wire::unpack_descriptor_payload(payload), (0, 64));
    }

    #[test]
    fn connect_rejects_a_truncated_buffer() {
        let buf = vec![0u8; 4];
        let err = SharedFifo::connect(&buf).unwrap_err();
        assert!(matches!(err, crate::DatafifoError::InvalidLayout { .. }));
    }
}
