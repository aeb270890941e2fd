//! Integration tests running each pipeline shape end to end at a scale
//! small enough for the ordinary test suite, plus `#[ignore]`d soak-sized
//! variants moving roughly a gibibyte of traffic.

use datafifo::{DatafifoError, FifoLayout, DEFAULT_ALIGN};
use datafifo_harness::scenario;

fn small_layout() -> FifoLayout {
    FifoLayout::new(64 * 1024, 128, DEFAULT_ALIGN)
}

fn soak_layout() -> FifoLayout {
    // datasize rounds down to a multiple of `align`; close enough to 1 GiB
    // for a soak run without needing the exact power-of-two arithmetic to
    // land evenly.
    FifoLayout::new(1 << 30, 1 << 14, DEFAULT_ALIGN)
}

#[test]
fn loopback_delivers_the_full_sequence_in_order() {
    let report = scenario::run_loopback(small_layout(), 50_000).expect("loopback scenario failed");
    assert_eq!(report.producer.records_committed, report.consumer.records_popped);
}

#[test]
fn sync_pipe_forwards_the_full_sequence() {
    let report = scenario::run_sync_pipe(small_layout(), small_layout(), 50_000)
        .expect("sync pipe scenario failed");
    assert_eq!(report.pipes.len(), 1);
    assert!(report.pipes[0].batches_dispatched > 0);
}

#[test]
fn async_pipe_forwards_the_full_sequence() {
    let report = scenario::run_async_pipe(small_layout(), small_layout(), 50_000)
        .expect("async pipe scenario failed");
    assert_eq!(report.pipes.len(), 1);
    assert!(report.pipes[0].batches_dispatched > 0);
}

#[test]
fn chained_pipes_forward_the_full_sequence_through_two_engines() {
    let report = scenario::run_chained_pipes(small_layout(), small_layout(), small_layout(), 50_000)
        .expect("chained pipe scenario failed");
    assert_eq!(report.pipes.len(), 2);
    assert!(report.pipes[0].batches_dispatched > 0);
    assert!(report.pipes[1].batches_dispatched > 0);
}

#[test]
fn tiny_record_stress_survives_many_single_value_records() {
    let report = scenario::run_tiny_record_stress(small_layout(), 20_000, 5_000)
        .expect("tiny-record stress scenario failed");
    assert!(report.consumer.records_popped > 0);
}

#[test]
fn urgent_backpressure_clamps_batches_while_the_consumer_lags() {
    let sink = FifoLayout::new(4 * 1024, 16, DEFAULT_ALIGN);
    let report = scenario::run_urgent_backpressure(small_layout(), sink, 8_000, 256)
        .expect("urgent-backpressure scenario failed");
    assert!(report.pipes[0].urgent_batches > 0);
    assert!(report.pipes[0].last_batch_span <= 2 * 1024);
}

#[test]
fn sequence_mismatch_is_detected_as_an_error() {
    // A consumer reading a record that does not extend the expected
    // sequence must surface `SequenceMismatch` rather than silently
    // accepting corrupted data. Exercised directly against a writer that
    // commits an out-of-sequence value, bypassing `Producer` (which always
    // emits a correct sequence by construction).
    use datafifo::{FifoReader, FifoWriter, SharedFifo, WakeupCounter};
    use datafifo_harness::Consumer;
    use std::sync::Arc;

    let fifo = SharedFifo::create(FifoLayout::default());
    let mut writer = FifoWriter::new(Arc::clone(&fifo));
    let reader = FifoReader::new(Arc::clone(&fifo));

    writer.update_reader();
    let ptr = writer.get_pointer();
    let bogus: u32 = 42;
    unsafe { std::ptr::write_unaligned(ptr.cast::<u32>(), bogus) };
    writer.commit(ptr, 4).unwrap();
    writer.advance(4);

    let mut consumer = Consumer::new(reader, WakeupCounter::new(), 1);
    let err = consumer.run().unwrap_err();
    assert_eq!(
        err,
        DatafifoError::SequenceMismatch {
            expected: 0,
            got: 42,
        }
    );
}

#[test]
#[ignore = "soak run: ~1 GiB of traffic per pipeline, run explicitly with --ignored"]
fn soak_loopback_moves_one_gibibyte_in_order() {
    let total_values = (soak_layout().total_size() as u64) / 4 * 4;
    let report =
        scenario::run_loopback(soak_layout(), total_values).expect("soak loopback failed");
    assert!(report.producer.records_committed > 0);
}

#[test]
#[ignore = "soak run: ~1 GiB of traffic through a chained two-engine pipeline, run explicitly with --ignored"]
fn soak_chained_pipes_move_one_gibibyte() {
    let total_values = (soak_layout().total_size() as u64) / 4 * 4;
    let report = scenario::run_chained_pipes(
        soak_layout(),
        soak_layout(),
        soak_layout(),
        total_values,
    )
    .expect("soak chained pipeline failed");
    assert_eq!(report.pipes.len(), 2);
}
