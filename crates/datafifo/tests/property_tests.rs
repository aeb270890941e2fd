//! Property-based tests of the FIFO transport's core invariants: no loss, no
//! duplication, in-order delivery, record boundary preservation and space
//! accounting, driven directly against `FifoWriter`/`FifoReader` with
//! randomly sized records and forced wraparound.

use std::collections::VecDeque;
use std::sync::Arc;

use datafifo::{DatafifoError, FifoLayout, FifoReader, FifoWriter, SharedFifo, MAX_RECORD_SIZE};
use proptest::prelude::*;

fn record_size() -> impl Strategy<Value = usize> {
    (1usize..64).prop_map(|n| n * 4)
}

proptest! {
    /// Every record written comes back out exactly once, in submission order,
    /// with its bytes intact — even when the ring must wrap (a small layout
    /// forces frequent wraps relative to the record sizes generated here).
    #[test]
    fn records_round_trip_in_order_preserving_bytes(
        sizes in prop::collection::vec(record_size(), 1..200)
    ) {
        let layout = FifoLayout::new(4096, 64, 16);
        let fifo = SharedFifo::create(layout);
        let mut writer = FifoWriter::new(Arc::clone(&fifo));
        let mut reader = FifoReader::new(Arc::clone(&fifo));

        let mut expected: VecDeque<Vec<u8>> = VecDeque::new();
        let mut next_byte: u8 = 0;

        for size in sizes {
            // Drain just enough to make room, simulating a consumer that
            // never falls permanently behind; this is what forces the
            // writer to wrap partway through the sequence.
            loop {
                writer.update_reader();
                if writer.get_free_contiguous(size) >= size {
                    break;
                }
                prop_assert!(!reader.is_empty());
                let (ptr, sz) = reader.get().unwrap();
                let got = unsafe { std::slice::from_raw_parts(ptr, sz) }.to_vec();
                let want = expected.pop_front().unwrap();
                prop_assert_eq!(got, want);
                reader.pop();
            }

            let ptr = writer.get_pointer();
            let mut payload = vec![0u8; size];
            for b in &mut payload {
                *b = next_byte;
                next_byte = next_byte.wrapping_add(1);
            }
            unsafe { std::ptr::copy_nonoverlapping(payload.as_ptr(), ptr, size) };
            writer.commit(ptr, size).unwrap();
            writer.advance(size);
            expected.push_back(payload);
        }

        while let Some(want) = expected.pop_front() {
            prop_assert!(!reader.is_empty());
            let (ptr, sz) = reader.get().unwrap();
            prop_assert_eq!(sz, want.len());
            let got = unsafe { std::slice::from_raw_parts(ptr, sz) }.to_vec();
            prop_assert_eq!(got, want);
            reader.pop();
        }
        prop_assert!(reader.is_empty());
    }

    /// `commit` rejects every size above the 12-bit descriptor field's
    /// range, regardless of how much free space is actually available.
    #[test]
    fn commit_rejects_every_size_above_the_descriptor_limit(
        excess in 1usize..10_000
    ) {
        let fifo = SharedFifo::create(FifoLayout::default());
        let mut writer = FifoWriter::new(fifo);
        let ptr = writer.get_pointer();
        let err = writer.commit(ptr, MAX_RECORD_SIZE + excess).unwrap_err();
        prop_assert!(matches!(
            err,
            DatafifoError::OversizeRecord { size, max } if size == MAX_RECORD_SIZE + excess && max == MAX_RECORD_SIZE
        ));
    }

    /// The writer's own free-space accounting never lets it advance past
    /// what `get_free_contiguous` most recently reported, across a run of
    /// arbitrarily sized records with no draining at all (a worst-case
    /// fill-to-capacity sequence).
    #[test]
    fn writer_never_overcommits_beyond_reported_free_space(
        sizes in prop::collection::vec(record_size(), 1..100)
    ) {
        let layout = FifoLayout::new(8192, 128, 16);
        let fifo = SharedFifo::create(layout);
        let mut writer = FifoWriter::new(fifo);

        for size in sizes {
            writer.update_reader();
            let free = writer.get_free_contiguous(size);
            if free < size {
                break;
            }
            let ptr = writer.get_pointer();
            writer.commit(ptr, size).unwrap();
            let advanced = writer.advance(size);
            prop_assert!(advanced <= free);
        }
    }
}
