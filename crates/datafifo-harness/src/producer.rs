//! The test producer workload: emits a monotonically increasing sequence of
//! `u32` counters into a FIFO, sized greedily against the writer's free
//! space.
//!
//! This is one of the two external collaborators the core transport
//! describes only by the minimal reader/writer contract they consume; it
//! lives in the harness crate rather than the core transport because the
//! core's non-goals explicitly exclude test-harness orchestration from the
//! transport itself.

use std::sync::Arc;

use datafifo::{FifoWriter, WakeupCounter};

/// Bytes per emitted value (one `u32` counter).
const VALUE_SIZE: usize = 4;

/// Drives a [`FifoWriter`], emitting `target` consecutive `u32` values
/// starting at 0.
pub struct Producer {
    writer: FifoWriter,
    own_wakeups: Arc<WakeupCounter>,
    next_value: u32,
    target: u64,
    emitted: u64,
    /// Number of leading records forced to a single `u32` each, before
    /// greedy sizing resumes.
    tiny_record_prefix: u64,
}

impl Producer {
    /// Builds a producer over `writer` that will emit `target` values.
    /// `own_wakeups` is the counter the producer parks on when the sink is
    /// full; install it as the wakeup target of whatever reader sits
    /// downstream of `writer` (directly, or via a pipe worker) before
    /// calling [`Self::run`].
    #[must_use]
    pub fn new(writer: FifoWriter, own_wakeups: Arc<WakeupCounter>, target: u64) -> Self {
        Self {
            writer,
            own_wakeups,
            next_value: 0,
            target,
            emitted: 0,
            tiny_record_prefix: 0,
        }
    }

    /// Forces the first `n` records to carry exactly one `u32` value each,
    /// exercising the reader's batch-coalescing path against many small
    /// records before greedy sizing resumes.
    #[must_use]
    pub fn with_tiny_record_prefix(mut self, n: u64) -> Self {
        self.tiny_record_prefix = n;
        self
    }

    /// Runs until `target` values have been committed, parking on
    /// `own_wakeups` whenever the sink has no room for even one value.
    pub fn run(&mut self) {
        while self.emitted < self.target {
            self.writer.update_reader();

            let desired_values = if self.emitted < self.tiny_record_prefix {
                1
            } else {
                // Greedy: as many values as fit in one aligned, in-bounds
                // record, capped by the remaining target and the 12-bit
                // descriptor size field.
                let remaining = self.target - self.emitted;
                remaining.min((datafifo::MAX_RECORD_SIZE / VALUE_SIZE) as u64)
            };
            let desired_bytes = desired_values as usize * VALUE_SIZE;

            let free = self.writer.get_free_contiguous(VALUE_SIZE);
            if free < VALUE_SIZE {
                self.writer.set_waiting(true);
                self.own_wakeups.wait();
                self.writer.set_waiting(false);
                continue;
            }

            let record_bytes = desired_bytes.min(free) & !(VALUE_SIZE - 1);
            let record_bytes = record_bytes.max(VALUE_SIZE);
            let values_in_record = (record_bytes / VALUE_SIZE) as u64;

            let ptr = self.writer.get_pointer();
            for i in 0..values_in_record {
                let value = self.next_value.wrapping_add(i as u32);
                // SAFETY: `ptr` was handed out by `get_pointer`; the
                // reservation below (`get_free_contiguous`) guarantees at
                // least `record_bytes` writable bytes starting there, and no
                // one else touches this range until `commit`/`advance`.
                unsafe {
                    std::ptr::write_unaligned(
                        ptr.add(i as usize * VALUE_SIZE).cast::<u32>(),
                        value,
                    );
                }
            }

            self.writer
                .commit(ptr, record_bytes)
                .expect("record_bytes was bounded by free space and MAX_RECORD_SIZE above");
            self.writer.advance(record_bytes);

            self.next_value = self.next_value.wrapping_add(values_in_record as u32);
            self.emitted += values_in_record;
            self.writer.wakeup_reader(false);
        }

        self.writer.wakeup_reader(true);
    }

    /// Counters accumulated by the underlying writer.
    #[must_use]
    pub fn metrics(&self) -> datafifo::FifoMetrics {
        self.writer.metrics()
    }
}
