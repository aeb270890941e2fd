//! The pipe: a one-way forwarder that moves records from one FIFO's reader
//! side to another FIFO's writer side, preserving record boundaries and
//! applying urgency-dependent batch sizing.
//!
//! One transfer moves through a five-step state machine — allocated ->
//! queued-for-copy -> copied -> committed -> released — expressed here as an
//! owned [`TransferRecord`] handed to a [`TransferStrategy`], with the
//! synchronous strategy completing it inline and an asynchronous strategy
//! handing it to a [`crate::engine::CopyEngine`].

use std::sync::Arc;

use crate::config::PipeTuning;
use crate::metrics::PipeMetrics;
use crate::reader::FifoReader;
use crate::writer::FifoWriter;

/// A single in-flight batch transfer: everything [`TransferRecord::commit`]
/// needs to re-publish the batch's descriptors into the sink and release the
/// source's.
///
/// Allocated by [`Pipe::transfer`] on dispatch, owned by whichever
/// [`TransferStrategy`] is driving the copy, and consumed by `commit` exactly
/// once the bytes are in place. A plain owned allocation per transfer is
/// enough — no pool needed — since a pipe never has more than one transfer
/// in flight at a time.
struct TransferRecord {
    /// Address of the batch's first record in the source, as returned by
    /// `reader.get_batch`. Every popped record's offset within the batch is
    /// `record_ptr - src_base`, which — because source and sink addresses
    /// move in lockstep for the duration of one batch — is also its offset
    /// within the destination span (re-published at the correct
    /// sub-offset).
    src_base: usize,
    /// Address the batch was written to in the sink, as returned by
    /// `writer.get_pointer()` before dispatch.
    dst_base: usize,
    /// Total byte span of the batch, including any inter-record padding.
    span: usize,
    /// Number of descriptors making up the batch.
    count: usize,
}

impl TransferRecord {
    /// Re-publishes each of the batch's `count` descriptors into the sink at
    /// the correct sub-offset, pops the matching descriptor from the source,
    /// advances the sink's write cursor past the whole span, and fires the
    /// discretionary downstream/upstream wakeups.
    ///
    /// Must be called with the same `reader`/`writer`/`metrics` the pipe used
    /// to dispatch this record, and exactly once.
    fn commit(self, reader: &mut FifoReader, writer: &mut FifoWriter, metrics: &mut PipeMetrics) {
        for _ in 0..self.count {
            let (src_ptr, size) = reader
                .get()
                .expect("transfer record's descriptor count outran the source ring");
            let delta = src_ptr as usize - self.src_base;
            // SAFETY: `delta` was computed from a pointer `get_batch` itself
            // vouched for as lying within `[src_base, src_base + span)`; the
            // corresponding destination byte was reserved by the same
            // `get_free_contiguous(max)` call that sized this batch.
            let dst_ptr = (self.dst_base + delta) as *mut u8;
            writer
                .commit(dst_ptr, size)
                .expect("batch span was already validated against the sink's free space");
            reader.pop();
        }
        writer.advance(self.span);

        reader.wakeup_writer(false);
        writer.wakeup_reader(false);

        metrics.batches_dispatched += 1;
        metrics.bytes_moved += self.span as u64;
        metrics.last_batch_span = self.span;
    }
}

/// How a pipe actually moves bytes once a batch has been sized and located.
///
/// The default is [`SyncCopy`], which performs the copy inline on the
/// calling thread before handing the record back for immediate commit. An
/// asynchronous strategy wraps a [`crate::engine::CopyEngine`] and defers
/// `commit` to the engine's completion callback, off the pipe's own thread.
pub trait TransferStrategy: Send {
    /// Copies `span` bytes from `src` to `dst`, then calls `on_copied` once
    /// the bytes are safely in place (synchronously or asynchronously).
    ///
    /// # Safety
    ///
    /// `src`/`dst` must be valid for `span` bytes and the ranges must not be
    /// touched by anyone else until `on_copied` runs.
    unsafe fn copy(
        &self,
        dst: *mut u8,
        src: *const u8,
        span: usize,
        on_copied: Box<dyn FnOnce() + Send>,
    );
}

/// Performs the copy inline, on whichever thread calls
/// [`Pipe::transfer`], and invokes the completion before returning.
#[derive(Default)]
pub struct SyncCopy;

impl TransferStrategy for SyncCopy {
    unsafe fn copy(
        &self,
        dst: *mut u8,
        src: *const u8,
        span: usize,
        on_copied: Box<dyn FnOnce() + Send>,
    ) {
        // SAFETY: forwarded verbatim from this function's own contract.
        unsafe {
            std::ptr::copy_nonoverlapping(src, dst, span);
        }
        on_copied();
    }
}

/// Submits the copy to a shared [`crate::engine::CopyEngine`] and lets the
/// engine invoke the completion, out-of-line, once the job reaches the front
/// of the engine's strictly-ordered queue.
pub struct AsyncCopy {
    engine: Arc<crate::engine::CopyEngine>,
}

impl AsyncCopy {
    /// Wraps an existing engine. The engine is typically shared across
    /// several pipes (a chain of FIFOs forwarded through two engines, say),
    /// each submitting independently; the engine's own queue serializes
    /// their jobs.
    #[must_use]
    pub fn new(engine: Arc<crate::engine::CopyEngine>) -> Self {
        Self { engine }
    }
}

impl TransferStrategy for AsyncCopy {
    unsafe fn copy(
        &self,
        dst: *mut u8,
        src: *const u8,
        span: usize,
        on_copied: Box<dyn FnOnce() + Send>,
    ) {
        // SAFETY: forwarded verbatim from this function's own contract.
        unsafe {
            self.engine.submit(dst, src, span, move || on_copied());
        }
    }
}

/// A forwarder that drains one FIFO's reader into another FIFO's writer.
///
/// `Pipe` owns its reader and writer by value. A naive design would have it
/// *borrow* its neighbors to avoid an ownership cycle with their own wakeup
/// targets; instead, readers/writers hold `Arc<dyn WakeupTarget>` rather than
/// a direct reference to their counterpart, so a `Pipe` can safely own both
/// ends without creating a cycle, the same way a
/// [`crate::pipe_worker::PipeWorker`] safely owns its `Pipe`.
pub struct Pipe {
    reader: FifoReader,
    writer: FifoWriter,
    tuning: PipeTuning,
    strategy: Box<dyn TransferStrategy>,
    sink_total_size: usize,
    metrics: PipeMetrics,
}

impl Pipe {
    /// Builds a pipe over `reader`/`writer` with the default inline-memcpy
    /// strategy. `sink_total_size` is the sink FIFO's full region size
    /// (header + ring + data), used for the urgency threshold.
    #[must_use]
    pub fn new(reader: FifoReader, writer: FifoWriter, sink_total_size: usize) -> Self {
        Self {
            reader,
            writer,
            tuning: PipeTuning::for_fifo_size(sink_total_size),
            strategy: Box::new(SyncCopy),
            sink_total_size,
            metrics: PipeMetrics::default(),
        }
    }

    /// Replaces the transfer strategy (e.g. with [`AsyncCopy`]).
    pub fn set_strategy(&mut self, strategy: Box<dyn TransferStrategy>) {
        self.strategy = strategy;
    }

    /// Overrides the default batch-sizing tuning.
    pub fn set_tuning(&mut self, tuning: PipeTuning) {
        self.tuning = tuning;
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn metrics(&self) -> PipeMetrics {
        self.metrics
    }

    /// Mutable access to the source reader, e.g. to install a wakeup target.
    pub fn reader_mut(&mut self) -> &mut FifoReader {
        &mut self.reader
    }

    /// Mutable access to the sink writer, e.g. to install a wakeup target.
    pub fn writer_mut(&mut self) -> &mut FifoWriter {
        &mut self.writer
    }

    /// One forwarding step.
    ///
    /// Returns `0` if the source is empty, `1` if the sink cannot fit even
    /// the smallest pending record, or the batch's byte span otherwise.
    pub fn transfer(&mut self) -> usize {
        let Some((_src_ptr, min_size)) = self.reader.get() else {
            self.metrics.source_empty += 1;
            return 0;
        };

        self.writer.update_reader();
        let mut max = self.writer.get_free_contiguous(min_size);
        if max < min_size {
            self.metrics.sink_full += 1;
            return 1;
        }

        let urgent = self.writer.get_free_total()
            >= self.sink_total_size.saturating_sub(self.tuning.urgent_cap);
        if urgent {
            max = max.min(self.tuning.max_batch_size_urgent);
            self.metrics.urgent_batches += 1;
            tracing::trace!(max, "sink near-empty, clamping batch to urgent cap");
        } else {
            max = max.min(self.tuning.max_batch_size);
        }
        max = max.max(min_size);

        let Some((batch_src_ptr, count, span)) = self.reader.get_batch(max) else {
            // The first record alone exceeded `max`; nothing to dispatch
            // this step even though the source was nonempty.
            return 1;
        };
        tracing::trace!(count, span, urgent, "dispatching batch");

        let dst_ptr = self.writer.get_pointer();

        let record = TransferRecord {
            src_base: batch_src_ptr as usize,
            dst_base: dst_ptr as usize,
            span,
            count,
        };

        let reader_ptr: *mut FifoReader = &mut self.reader;
        let writer_ptr: *mut FifoWriter = &mut self.writer;
        let metrics_ptr: *mut PipeMetrics = &mut self.metrics;
        // SAFETY: `batch_src_ptr`/`dst_ptr` each point into their FIFO's data
        // area for at least `span` bytes (guaranteed by `get_batch`'s span
        // computation and the `get_free_contiguous` reservation above
        // respectively), and stay exclusively owned by this pipe until
        // `commit` runs below.
        unsafe {
            self.strategy.copy(
                dst_ptr,
                batch_src_ptr,
                span,
                Box::new(move || {
                    // SAFETY: the pipe outlives every in-flight transfer
                    // (§4.5: shutdown drains in-flight transfers first), so
                    // these raw pointers are still valid when this runs,
                    // whether inline (sync strategy) or later (async
                    // engine completion, on the engine's own thread).
                    let reader = unsafe { &mut *reader_ptr };
                    let writer = unsafe { &mut *writer_ptr };
                    let metrics = unsafe { &mut *metrics_ptr };
                    record.commit(reader, writer, metrics);
                }),
            );
        }

        span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FifoLayout;
    use crate::region::SharedFifo;
    use std::sync::Arc;

    fn pipe_over(source_layout: FifoLayout, sink_layout: FifoLayout) -> Pipe {
        let source = SharedFifo::create(source_layout);
        let sink = SharedFifo::create(sink_layout);
        let reader = FifoReader::new(source);
        let writer = FifoWriter::new(Arc::clone(&sink));
        Pipe::new(reader, writer, sink_layout.total_size())
    }

    fn write_record(writer: &mut FifoWriter, byte: u8, size: usize) {
        writer.update_reader();
        let ptr = writer.get_pointer();
        unsafe { std::ptr::write_bytes(ptr, byte, size) };
        writer.commit(ptr, size).unwrap();
        writer.advance(size);
    }

    #[test]
    fn transfer_on_empty_source_returns_zero() {
        let mut pipe = pipe_over(FifoLayout::default(), FifoLayout::default());
        assert_eq!(pipe.transfer(), 0);
    }

    #[test]
    fn transfer_moves_a_single_record_and_preserves_bytes() {
        let source = SharedFifo::create(FifoLayout::default());
        let sink = SharedFifo::create(FifoLayout::default());
        let mut source_writer = FifoWriter::new(Arc::clone(&source));
        write_record(&mut source_writer, 0xCD, 32);

        let reader = FifoReader::new(Arc::clone(&source));
        let writer = FifoWriter::new(Arc::clone(&sink));
        let mut pipe = Pipe::new(reader, writer, sink.layout().total_size());

        let span = pipe.transfer();
        assert_eq!(span, 32);
        assert_eq!(pipe.metrics().batches_dispatched, 1);
        assert_eq!(pipe.metrics().bytes_moved, 32);

        let sink_reader = FifoReader::new(Arc::clone(&sink));
        let (ptr, size) = sink_reader.get().unwrap();
        assert_eq!(size, 32);
        let bytes = unsafe { std::slice::from_raw_parts(ptr, size) };
        assert!(bytes.iter().all(|&b| b == 0xCD));
    }

    #[test]
    fn transfer_coalesces_multiple_records_into_one_batch() {
        let source = SharedFifo::create(FifoLayout::default());
        let sink = SharedFifo::create(FifoLayout::default());
        let mut source_writer = FifoWriter::new(Arc::clone(&source));
        for i in 0..4u8 {
            write_record(&mut source_writer, i, 16);
        }

        let reader = FifoReader::new(Arc::clone(&source));
        let writer = FifoWriter::new(Arc::clone(&sink));
        let mut pipe = Pipe::new(reader, writer, sink.layout().total_size());

        let span = pipe.transfer();
        assert_eq!(span, 64);

        let mut sink_reader = FifoReader::new(Arc::clone(&sink));
        for i in 0..4u8 {
            let (ptr, size) = sink_reader.get().unwrap();
            assert_eq!(size, 16);
            let bytes = unsafe { std::slice::from_raw_parts(ptr, size) };
            assert!(bytes.iter().all(|&b| b == i));
            sink_reader.pop();
        }
        assert!(sink_reader.is_empty());
    }

    #[test]
    fn transfer_returns_one_when_sink_cannot_fit_the_batch() {
        let source = SharedFifo::create(FifoLayout::default());
        // Tiny sink: header/ring dominate, leaving far less room than the
        // 32-byte record the source holds.
        let sink_layout = FifoLayout::new(256, 4, 16);
        let sink = SharedFifo::create(sink_layout);

        let mut source_writer = FifoWriter::new(Arc::clone(&source));
        write_record(&mut source_writer, 0xEE, sink_layout.datasize() as usize + 16);

        let reader = FifoReader::new(Arc::clone(&source));
        let writer = FifoWriter::new(Arc::clone(&sink));
        let mut pipe = Pipe::new(reader, writer, sink_layout.total_size());

        assert_eq!(pipe.transfer(), 1);
    }

    #[test]
    fn urgent_regime_clamps_batch_span_to_urgent_cap() {
        let source = SharedFifo::create(FifoLayout::new(1 << 20, 1024, 16));
        let sink_layout = FifoLayout::new(1 << 16, 128, 16);
        let sink = SharedFifo::create(sink_layout);

        let mut source_writer = FifoWriter::new(Arc::clone(&source));
        // Many small records so a single batch could in principle span far
        // more than the urgent cap.
        for _ in 0..600 {
            write_record(&mut source_writer, 0x11, 16);
        }

        let reader = FifoReader::new(Arc::clone(&source));
        let writer = FifoWriter::new(Arc::clone(&sink));
        let mut pipe = Pipe::new(reader, writer, sink_layout.total_size());
        // Sink starts empty: free_total == datasize == sink's full capacity,
        // which is >= total_size - urgent_cap whenever urgent_cap is small
        // relative to the header/ring overhead, putting the very first
        // transfer already into the urgent regime.
        let span = pipe.transfer();
        assert!(span <= pipe.tuning.max_batch_size_urgent);
        assert_eq!(pipe.metrics().urgent_batches, 1);
    }
}
