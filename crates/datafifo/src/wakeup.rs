//! The wakeup-target abstraction: an object-safe stand-in for a raw
//! function-pointer-plus-argument callback.
//!
//! A reader or writer holds an optional `Arc<dyn WakeupTarget>` for its
//! counterpart rather than a function pointer, so a pipe can wire itself as
//! the wakeup target of both its upstream writer and its downstream reader
//! without owning either — it only borrows them for the lifetime of the
//! pipe.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Something that can be woken up, optionally unconditionally (`force`).
///
/// `force` mirrors the source's `force` parameter to `wakeup_reader`/
/// `wakeup_writer`: callers pass `true` for end-of-stream notifications and
/// `false` for intermediate ones, leaving the gating decision (WAITING flag
/// or not) to the status-flag check that precedes the call.
pub trait WakeupTarget: Send + Sync {
    /// Deliver a wakeup.
    fn wake(&self);
}

/// A coalescing wakeup counter: the target installed on a
/// [`crate::pipe_worker::PipeWorker`]'s upstream writer and downstream
/// reader.
///
/// Each wakeup increments a counter and notifies one waiter; the waiting
/// side blocks until the counter is nonzero, then consumes one credit. This
/// coalesces
/// bursts of wakeups delivered while the worker is busy draining the pipe,
/// while guaranteeing that a wakeup delivered after the worker checks and
/// before it parks is never lost.
#[derive(Default)]
pub struct WakeupCounter {
    state: Mutex<usize>,
    cv: Condvar,
    // Separate atomic so `wake()` (called from reader/writer threads that
    // must never block) does not need the mutex just to check liveness.
    delivered: AtomicUsize,
}

impl WakeupCounter {
    /// Creates a fresh, unparked counter.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(0),
            cv: Condvar::new(),
            delivered: AtomicUsize::new(0),
        })
    }

    /// Blocks until at least one wakeup credit is available, then consumes
    /// one.
    pub fn wait(&self) {
        let mut count = self.state.lock().unwrap();
        while *count == 0 {
            count = self.cv.wait(count).unwrap();
        }
        *count -= 1;
    }

    /// Total number of wakeups ever delivered; used by tests to observe
    /// wakeup liveness without racing the condvar directly.
    pub fn delivered_count(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl WakeupTarget for WakeupCounter {
    fn wake(&self) {
        let mut count = self.state.lock().unwrap();
        *count += 1;
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.cv.notify_one();
    }
}
