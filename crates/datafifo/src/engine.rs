//! Asynchronous bulk-copy worker: a background thread draining a strict
//! FIFO queue of copy jobs.
//!
//! A worker thread drains a mutex-guarded queue, woken by a condition
//! variable. `submit` appends and notifies; the worker loop blocks until the
//! queue is nonempty or the engine is shutting down, copies, invokes the
//! job's completion callback, and moves on. Shutdown sets an exit flag under
//! the lock, wakes the worker, and joins it; any job submitted after
//! shutdown has begun is silently dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::metrics::EngineMetrics;

/// A raw `(dst, src, size)` copy plus a completion callback, run on the
/// engine's worker thread. `dst`/`src` point into shared-memory regions the
/// caller guarantees are exclusively owned for the duration of the copy —
/// the same disjoint-access discipline documented on
/// [`crate::region::SharedFifo`].
struct Job {
    dst: *mut u8,
    src: *const u8,
    size: usize,
    completion: Box<dyn FnOnce() + Send>,
}

// SAFETY: a `Job`'s raw pointers are only ever dereferenced once, by the
// engine's single worker thread, after being handed off across the queue's
// mutex (which provides the necessary synchronization); no two jobs ever
// alias a byte range at the same time because the pipe that submits them
// waits for a job to complete before dispatching an overlapping one.
unsafe impl Send for Job {}

enum QueueEntry {
    Job(Job),
    Shutdown,
}

struct Shared {
    queue: Mutex<VecDeque<QueueEntry>>,
    cv: Condvar,
}

/// A background thread that performs `memcpy`-style bulk copies in strict
/// submission order, decoupling a pipe's descriptor-ring bookkeeping from the
/// actual byte movement.
pub struct CopyEngine {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    metrics: Arc<Mutex<EngineMetrics>>,
}

impl CopyEngine {
    /// Spawns the worker thread.
    #[must_use]
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
        });
        let metrics = Arc::new(Mutex::new(EngineMetrics::default()));

        let worker_shared = Arc::clone(&shared);
        let worker_metrics = Arc::clone(&metrics);
        let worker = std::thread::Builder::new()
            .name("datafifo-copy-engine".into())
            .spawn(move || Self::mainloop(&worker_shared, &worker_metrics))
            .expect("failed to spawn copy engine thread");

        Self {
            shared,
            worker: Some(worker),
            metrics,
        }
    }

    fn mainloop(shared: &Arc<Shared>, metrics: &Arc<Mutex<EngineMetrics>>) {
        loop {
            let entry = {
                let mut queue = shared.queue.lock().unwrap();
                while queue.is_empty() {
                    queue = shared.cv.wait(queue).unwrap();
                }
                queue.pop_front().unwrap()
            };

            match entry {
                QueueEntry::Shutdown => break,
                QueueEntry::Job(job) => {
                    // SAFETY: see the `unsafe impl Send for Job` justification above.
                    unsafe {
                        std::ptr::copy_nonoverlapping(job.src, job.dst, job.size);
                    }
                    let mut m = metrics.lock().unwrap();
                    m.jobs_completed += 1;
                    m.bytes_copied += job.size as u64;
                    drop(m);
                    tracing::trace!(size = job.size, "copy job completed");
                    (job.completion)();
                }
            }
        }
    }

    /// Enqueues a copy job. Silently dropped (not queued, completion never
    /// called) if the engine is shutting down.
    ///
    /// # Safety
    ///
    /// `dst` and `src` must remain valid, and the `[src, src+size)` and
    /// `[dst, dst+size)` ranges must not be written to by anyone else, until
    /// `completion` runs.
    pub unsafe fn submit(
        &self,
        dst: *mut u8,
        src: *const u8,
        size: usize,
        completion: impl FnOnce() + Send + 'static,
    ) {
        let mut queue = self.shared.queue.lock().unwrap();
        // Once a Shutdown entry is queued no further job may be accepted:
        // the worker could already be past it by the time we'd enqueue.
        if queue.iter().any(|e| matches!(e, QueueEntry::Shutdown)) {
            let mut m = self.metrics.lock().unwrap();
            m.jobs_dropped_after_shutdown += 1;
            return;
        }
        queue.push_back(QueueEntry::Job(Job {
            dst,
            src,
            size,
            completion: Box::new(completion),
        }));
        self.shared.cv.notify_one();
    }

    /// Snapshot of the engine's counters.
    #[must_use]
    pub fn metrics(&self) -> EngineMetrics {
        *self.metrics.lock().unwrap()
    }
}

impl Default for CopyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CopyEngine {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.push_back(QueueEntry::Shutdown);
            self.shared.cv.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
