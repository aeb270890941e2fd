//! The test consumer workload: verifies the monotonically increasing `u32`
//! sequence a [`crate::producer::Producer`] (or a pipeline terminating in one)
//! emits.

use std::sync::Arc;
use std::time::Duration;

use datafifo::{DatafifoError, FifoReader, WakeupCounter};

const VALUE_SIZE: usize = 4;

/// Drives a [`FifoReader`], verifying `target` consecutive `u32` values
/// starting at 0.
pub struct Consumer {
    reader: FifoReader,
    own_wakeups: Arc<WakeupCounter>,
    next_expected: u32,
    target: u64,
    consumed: u64,
    /// If set, the consumer sleeps briefly every `backpressure_every`
    /// records, exercising the urgent-batch regime of an upstream pipe.
    backpressure_every: Option<u64>,
}

impl Consumer {
    /// Builds a consumer over `reader` that will verify `target` values.
    /// `own_wakeups` is the counter the consumer parks on when the source is
    /// empty; install it as the wakeup target of whatever writer sits
    /// upstream of `reader` before calling [`Self::run`].
    #[must_use]
    pub fn new(reader: FifoReader, own_wakeups: Arc<WakeupCounter>, target: u64) -> Self {
        Self {
            reader,
            own_wakeups,
            next_expected: 0,
            target,
            consumed: 0,
            backpressure_every: None,
        }
    }

    /// Sleeps 1ms every `n` records consumed, modelling a slow downstream
    /// consumer that forces an upstream pipe into its urgent batch regime.
    #[must_use]
    pub fn with_backpressure(mut self, n: u64) -> Self {
        self.backpressure_every = Some(n);
        self
    }

    /// Runs until `target` values have been verified, parking on
    /// `own_wakeups` whenever the source has nothing published.
    ///
    /// # Errors
    ///
    /// Returns [`DatafifoError::SequenceMismatch`] the first time a popped
    /// value does not extend the expected sequence.
    pub fn run(&mut self) -> Result<(), DatafifoError> {
        while self.consumed < self.target {
            if self.reader.is_empty() {
                self.reader.set_waiting(true);
                self.own_wakeups.wait();
                self.reader.set_waiting(false);
                continue;
            }

            let (ptr, size) = self.reader.get().expect("just checked non-empty above");
            debug_assert_eq!(size % VALUE_SIZE, 0, "records are always whole u32 counts");
            let count = size / VALUE_SIZE;

            for i in 0..count {
                // SAFETY: `get` returned a record of `size` readable bytes at
                // `ptr`; the writer never touches it again until `pop` below.
                let value = unsafe { std::ptr::read_unaligned(ptr.add(i * VALUE_SIZE).cast::<u32>()) };
                if value != self.next_expected {
                    return Err(DatafifoError::SequenceMismatch {
                        expected: self.next_expected,
                        got: value,
                    });
                }
                self.next_expected = self.next_expected.wrapping_add(1);
            }

            self.reader.pop();
            self.consumed += count as u64;
            self.reader.wakeup_writer(false);

            if let Some(every) = self.backpressure_every {
                if self.consumed % every == 0 {
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }

        self.reader.wakeup_writer(true);
        Ok(())
    }

    /// Counters accumulated by the underlying reader.
    #[must_use]
    pub fn metrics(&self) -> datafifo::FifoMetrics {
        self.reader.metrics()
    }
}
