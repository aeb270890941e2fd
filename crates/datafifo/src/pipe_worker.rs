//! The thread that drives one [`crate::pipe::Pipe`] on wakeup counts:
//! `while (!exit) { while (transfer() > 1); wait(); }`.
//!
//! The worker's [`crate::wakeup::WakeupCounter`] is installed as the wakeup
//! target of both the pipe's upstream writer (so publishing new data drives
//! the pipe) and its downstream reader (so freeing space drives the pipe).

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::pipe::Pipe;
use crate::wakeup::WakeupCounter;

/// Owns a [`Pipe`] and a background thread draining it on wakeup.
pub struct PipeWorker {
    wakeups: Arc<WakeupCounter>,
    handle: Option<JoinHandle<Pipe>>,
    exit: Arc<std::sync::atomic::AtomicBool>,
}

impl PipeWorker {
    /// Spawns the worker thread and returns both the worker handle and the
    /// [`WakeupCounter`] to install on the pipe's upstream writer and
    /// downstream reader before traffic starts flowing (the caller does this
    /// rather than `PipeWorker` itself, since installing a wakeup target is
    /// the writer's/reader's own API and the pipe borrows neither by
    /// reference once spawned — it moves onto the worker thread).
    #[must_use]
    pub fn spawn(mut pipe: Pipe) -> (Self, Arc<WakeupCounter>) {
        let wakeups = WakeupCounter::new();
        let exit = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let worker_wakeups = Arc::clone(&wakeups);
        let worker_exit = Arc::clone(&exit);
        let handle = std::thread::Builder::new()
            .name("datafifo-pipe-worker".into())
            .spawn(move || {
                loop {
                    while pipe.transfer() > 1 {}
                    if worker_exit.load(std::sync::atomic::Ordering::Acquire) {
                        break;
                    }
                    tracing::trace!("pipe worker parking for wakeup");
                    worker_wakeups.wait();
                    if worker_exit.load(std::sync::atomic::Ordering::Acquire) {
                        break;
                    }
                }
                tracing::debug!(
                    batches = pipe.metrics().batches_dispatched,
                    "pipe worker exiting"
                );
                pipe
            })
            .expect("failed to spawn pipe worker thread");

        (
            Self {
                wakeups: Arc::clone(&wakeups),
                handle: Some(handle),
                exit,
            },
            wakeups,
        )
    }

    /// The wakeup counter installed on this worker's pipe's neighbors; also
    /// returned by [`Self::spawn`], kept here for convenience.
    #[must_use]
    pub fn wakeups(&self) -> Arc<WakeupCounter> {
        Arc::clone(&self.wakeups)
    }

    /// Orderly shutdown: sets the exit flag, force-wakes
    /// the worker so it observes it promptly, and joins the thread, handing
    /// back the drained `Pipe` so its final metrics can be inspected.
    #[must_use]
    pub fn join(mut self) -> Pipe {
        self.exit.store(true, std::sync::atomic::Ordering::Release);
        self.wakeups.wake();
        self.handle
            .take()
            .expect("join called more than once")
            .join()
            .expect("pipe worker thread panicked")
    }
}

impl Drop for PipeWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.exit.store(true, std::sync::atomic::Ordering::Release);
            self.wakeups.wake();
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FifoLayout;
    use crate::reader::FifoReader;
    use crate::region::SharedFifo;
    use crate::writer::FifoWriter;
    use std::time::Duration;

    #[test]
    fn worker_drains_a_pending_record_after_being_woken() {
        let source = SharedFifo::create(FifoLayout::default());
        let sink = SharedFifo::create(FifoLayout::default());

        let mut source_writer = FifoWriter::new(Arc::clone(&source));
        source_writer.update_reader();
        let ptr = source_writer.get_pointer();
        unsafe { std::ptr::write_bytes(ptr, 0x42, 8) };
        source_writer.commit(ptr, 8).unwrap();
        source_writer.advance(8);

        let reader = FifoReader::new(Arc::clone(&source));
        let writer = FifoWriter::new(Arc::clone(&sink));
        let pipe = Pipe::new(reader, writer, sink.layout().total_size());

        let (worker, wakeups) = PipeWorker::spawn(pipe);
        wakeups.wake();

        std::thread::sleep(Duration::from_millis(50));
        let sink_reader = FifoReader::new(Arc::clone(&sink));
        assert!(!sink_reader.is_empty());

        let pipe = worker.join();
        assert_eq!(pipe.metrics().batches_dispatched, 1);
    }

    #[test]
    fn join_stops_the_worker_promptly_even_when_idle() {
        let source = SharedFifo::create(FifoLayout::default());
        let sink = SharedFifo::create(FifoLayout::default());
        let reader = FifoReader::new(Arc::clone(&source));
        let writer = FifoWriter::new(Arc::clone(&sink));
        let pipe = Pipe::new(reader, writer, sink.layout().total_size());

        let (worker, _wakeups) = PipeWorker::spawn(pipe);
        worker.join();
    }
}
