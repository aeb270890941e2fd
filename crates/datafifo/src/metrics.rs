//! Plain counters for the FIFO, pipe and copy engine.
//!
//! Each side (reader/writer) owns its own counters exclusively, the same way
//! it owns its private cursors, so these are bare `u64` fields rather than
//! atomics: a `Default`-derived bag of counters updated only by the thread
//! that owns the surrounding structure.

/// Counters maintained by a [`crate::writer::FifoWriter`] and
/// [`crate::reader::FifoReader`] pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct FifoMetrics {
    /// Number of descriptors successfully committed by the writer.
    pub records_committed: u64,
    /// Number of descriptors popped by the reader.
    pub records_popped: u64,
    /// Number of bytes advanced past by the writer (includes alignment padding).
    pub bytes_advanced: u64,
    /// Number of times `wakeup_reader`/`wakeup_writer` actually invoked the
    /// installed wakeup target (as opposed to being suppressed by gating).
    pub wakeups_delivered: u64,
    /// Number of times a wakeup call was suppressed because neither `force`
    /// nor the counterpart's WAITING flag was set.
    pub wakeups_suppressed: u64,
}

/// Counters maintained by a [`crate::pipe::Pipe`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PipeMetrics {
    /// Number of `transfer()` calls that found the source empty (return 0).
    pub source_empty: u64,
    /// Number of `transfer()` calls that found the sink too full (return 1).
    pub sink_full: u64,
    /// Number of batches dispatched to a transfer strategy.
    pub batches_dispatched: u64,
    /// Total bytes moved across all dispatched batches.
    pub bytes_moved: u64,
    /// Number of batches dispatched while the sink was judged urgent.
    pub urgent_batches: u64,
    /// Byte span of the most recently dispatched batch; exposed for the
    /// urgent-backpressure test scenario.
    pub last_batch_span: usize,
}

/// Counters maintained by a [`crate::engine::CopyEngine`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EngineMetrics {
    /// Number of jobs completed.
    pub jobs_completed: u64,
    /// Number of jobs dropped because they were submitted after shutdown.
    pub jobs_dropped_after_shutdown: u64,
    /// Total bytes copied across all completed jobs.
    pub bytes_copied: u64,
}
