//! Concrete pipeline shapes wiring producers, consumers, FIFOs, pipes and
//! copy engines together.
//!
//! Each function here spawns exactly the threads its shape needs, wires the
//! wakeup targets so the whole pipeline is fully event-driven (no busy
//! polling anywhere), runs it to completion, and hands back a [`Report`] the
//! caller can assert against. None of this lives in the transport crate
//! itself: it is harness wiring, wholly separate from the library.

use std::sync::{Arc, Mutex};
use std::thread;

use datafifo::{
    AsyncCopy, CopyEngine, DatafifoError, FifoLayout, FifoMetrics, FifoReader, FifoWriter, Pipe,
    PipeMetrics, PipeWorker, SharedFifo, SyncCopy, WakeupTarget,
};

use crate::consumer::Consumer;
use crate::producer::Producer;

/// Summary of one scenario run, for test assertions.
#[derive(Debug, Default)]
pub struct Report {
    pub producer: FifoMetrics,
    pub consumer: FifoMetrics,
    pub pipes: Vec<PipeMetrics>,
}

/// Producer writes straight into the FIFO the consumer reads, no pipe in
/// between.
pub fn run_loopback(layout: FifoLayout, target: u64) -> Result<Report, DatafifoError> {
    let fifo = SharedFifo::create(layout);
    let mut writer = FifoWriter::new(Arc::clone(&fifo));
    let mut reader = FifoReader::new(fifo);

    let producer_wakeups = datafifo::WakeupCounter::new();
    let consumer_wakeups = datafifo::WakeupCounter::new();
    writer.set_wakeup_target(as_target(Arc::clone(&consumer_wakeups)));
    reader.set_wakeup_target(as_target(Arc::clone(&producer_wakeups)));

    let producer_handle = thread::Builder::new()
        .name("harness-producer".into())
        .spawn(move || {
            let mut producer = Producer::new(writer, producer_wakeups, target);
            producer.run();
            producer.metrics()
        })
        .expect("failed to spawn producer thread");

    let mut consumer = Consumer::new(reader, consumer_wakeups, target);
    let result = consumer.run();
    let producer_metrics = producer_handle.join().expect("producer thread panicked");
    result?;

    Ok(Report {
        producer: producer_metrics,
        consumer: consumer.metrics(),
        pipes: Vec::new(),
    })
}

/// Like [`run_loopback`], but forces every one of the first
/// `tiny_record_prefix` records down to a single `u32`: tiny-record stress.
pub fn run_tiny_record_stress(
    layout: FifoLayout,
    target: u64,
    tiny_record_prefix: u64,
) -> Result<Report, DatafifoError> {
    let fifo = SharedFifo::create(layout);
    let mut writer = FifoWriter::new(Arc::clone(&fifo));
    let mut reader = FifoReader::new(fifo);

    let producer_wakeups = datafifo::WakeupCounter::new();
    let consumer_wakeups = datafifo::WakeupCounter::new();
    writer.set_wakeup_target(as_target(Arc::clone(&consumer_wakeups)));
    reader.set_wakeup_target(as_target(Arc::clone(&producer_wakeups)));

    let producer_handle = thread::Builder::new()
        .name("harness-producer".into())
        .spawn(move || {
            let mut producer = Producer::new(writer, producer_wakeups, target)
                .with_tiny_record_prefix(tiny_record_prefix);
            producer.run();
            producer.metrics()
        })
        .expect("failed to spawn producer thread");

    let mut consumer = Consumer::new(reader, consumer_wakeups, target);
    let result = consumer.run();
    let producer_metrics = producer_handle.join().expect("producer thread panicked");
    result?;

    Ok(Report {
        producer: producer_metrics,
        consumer: consumer.metrics(),
        pipes: Vec::new(),
    })
}

enum Strategy {
    Sync,
    Async,
}

/// Producer -> FIFO A -> pipe -> FIFO B -> consumer, with the pipe driven by
/// a [`PipeWorker`] on its own thread.
fn run_single_pipe(
    source_layout: FifoLayout,
    sink_layout: FifoLayout,
    target: u64,
    strategy: Strategy,
) -> Result<Report, DatafifoError> {
    let source = SharedFifo::create(source_layout);
    let sink = SharedFifo::create(sink_layout);

    let mut producer_writer = FifoWriter::new(Arc::clone(&source));
    let mut consumer_reader = FifoReader::new(Arc::clone(&sink));

    let producer_wakeups = datafifo::WakeupCounter::new();
    let consumer_wakeups = datafifo::WakeupCounter::new();

    let mut pipe = Pipe::new(
        FifoReader::new(Arc::clone(&source)),
        FifoWriter::new(Arc::clone(&sink)),
        sink_layout.total_size(),
    );
    match strategy {
        Strategy::Sync => pipe.set_strategy(Box::new(SyncCopy)),
        Strategy::Async => {
            let engine = Arc::new(CopyEngine::new());
            pipe.set_strategy(Box::new(AsyncCopy::new(engine)));
        }
    }
    pipe.reader_mut().set_wakeup_target(as_target(Arc::clone(&producer_wakeups)));
    pipe.writer_mut().set_wakeup_target(as_target(Arc::clone(&consumer_wakeups)));

    let (worker, worker_wakeups) = PipeWorker::spawn(pipe);
    producer_writer.set_wakeup_target(as_target(Arc::clone(&worker_wakeups)));
    consumer_reader.set_wakeup_target(as_target(Arc::clone(&worker_wakeups)));

    let producer_handle = thread::Builder::new()
        .name("harness-producer".into())
        .spawn(move || {
            let mut producer = Producer::new(producer_writer, producer_wakeups, target);
            producer.run();
            producer.metrics()
        })
        .expect("failed to spawn producer thread");

    let mut consumer = Consumer::new(consumer_reader, consumer_wakeups, target);
    let result = consumer.run();
    let producer_metrics = producer_handle.join().expect("producer thread panicked");
    let pipe = worker.join();
    result?;

    Ok(Report {
        producer: producer_metrics,
        consumer: consumer.metrics(),
        pipes: vec![pipe.metrics()],
    })
}

/// A single pipe copying inline on its worker thread.
pub fn run_sync_pipe(
    source_layout: FifoLayout,
    sink_layout: FifoLayout,
    target: u64,
) -> Result<Report, DatafifoError> {
    run_single_pipe(source_layout, sink_layout, target, Strategy::Sync)
}

/// A single pipe deferring its copies to a [`CopyEngine`].
pub fn run_async_pipe(
    source_layout: FifoLayout,
    sink_layout: FifoLayout,
    target: u64,
) -> Result<Report, DatafifoError> {
    run_single_pipe(source_layout, sink_layout, target, Strategy::Async)
}

/// Producer -> FIFO A -> pipe 1 (engine 1) -> FIFO B -> pipe 2 (engine 2) ->
/// FIFO C -> consumer: a two-engine chained pipeline.
pub fn run_chained_pipes(
    layout_a: FifoLayout,
    layout_b: FifoLayout,
    layout_c: FifoLayout,
    target: u64,
) -> Result<Report, DatafifoError> {
    let fifo_a = SharedFifo::create(layout_a);
    let fifo_b = SharedFifo::create(layout_b);
    let fifo_c = SharedFifo::create(layout_c);

    let mut producer_writer = FifoWriter::new(Arc::clone(&fifo_a));
    let mut consumer_reader = FifoReader::new(Arc::clone(&fifo_c));

    let producer_wakeups = datafifo::WakeupCounter::new();
    let consumer_wakeups = datafifo::WakeupCounter::new();

    let engine1 = Arc::new(CopyEngine::new());
    let engine2 = Arc::new(CopyEngine::new());

    let mut pipe1 = Pipe::new(
        FifoReader::new(Arc::clone(&fifo_a)),
        FifoWriter::new(Arc::clone(&fifo_b)),
        layout_b.total_size(),
    );
    pipe1.set_strategy(Box::new(AsyncCopy::new(Arc::clone(&engine1))));

    let mut pipe2 = Pipe::new(
        FifoReader::new(Arc::clone(&fifo_b)),
        FifoWriter::new(Arc::clone(&fifo_c)),
        layout_c.total_size(),
    );
    pipe2.set_strategy(Box::new(AsyncCopy::new(Arc::clone(&engine2))));

    pipe1.reader_mut().set_wakeup_target(as_target(Arc::clone(&producer_wakeups)));
    pipe2.writer_mut().set_wakeup_target(as_target(Arc::clone(&consumer_wakeups)));

    // FIFO B sits between the two pipe workers, each of which needs the
    // other's wakeup counter as its target — but that counter only exists
    // once `PipeWorker::spawn` returns, and spawning moves the `Pipe` (and
    // therefore its reader/writer) out of reach. `DeferredWakeupTarget`
    // breaks the cycle: each pipe is wired to a stand-in up front, and the
    // real counter is installed into it right after the other pipe spawns.
    let pipe1_to_pipe2 = DeferredWakeupTarget::new();
    let pipe2_to_pipe1 = DeferredWakeupTarget::new();
    pipe1
        .writer_mut()
        .set_wakeup_target(Arc::clone(&pipe1_to_pipe2) as Arc<dyn WakeupTarget>);
    pipe2
        .reader_mut()
        .set_wakeup_target(Arc::clone(&pipe2_to_pipe1) as Arc<dyn WakeupTarget>);

    let (worker1, worker1_wakeups) = PipeWorker::spawn(pipe1);
    pipe2_to_pipe1.install(as_target(Arc::clone(&worker1_wakeups)));
    let (worker2, worker2_wakeups) = PipeWorker::spawn(pipe2);
    pipe1_to_pipe2.install(as_target(Arc::clone(&worker2_wakeups)));

    producer_writer.set_wakeup_target(as_target(Arc::clone(&worker1_wakeups)));
    consumer_reader.set_wakeup_target(as_target(Arc::clone(&worker2_wakeups)));

    let producer_handle = thread::Builder::new()
        .name("harness-producer".into())
        .spawn(move || {
            let mut producer = Producer::new(producer_writer, producer_wakeups, target);
            producer.run();
            producer.metrics()
        })
        .expect("failed to spawn producer thread");

    let mut consumer = Consumer::new(consumer_reader, consumer_wakeups, target);
    let result = consumer.run();
    let producer_metrics = producer_handle.join().expect("producer thread panicked");
    let pipe1 = worker1.join();
    let pipe2 = worker2.join();
    result?;

    Ok(Report {
        producer: producer_metrics,
        consumer: consumer.metrics(),
        pipes: vec![pipe1.metrics(), pipe2.metrics()],
    })
}

/// Producer -> FIFO A -> pipe -> small FIFO B -> a consumer that sleeps
/// periodically, forcing the pipe into its urgent batch regime.
pub fn run_urgent_backpressure(
    source_layout: FifoLayout,
    sink_layout: FifoLayout,
    target: u64,
    backpressure_every: u64,
) -> Result<Report, DatafifoError> {
    let source = SharedFifo::create(source_layout);
    let sink = SharedFifo::create(sink_layout);

    let mut producer_writer = FifoWriter::new(Arc::clone(&source));
    let mut consumer_reader = FifoReader::new(Arc::clone(&sink));

    let producer_wakeups = datafifo::WakeupCounter::new();
    let consumer_wakeups = datafifo::WakeupCounter::new();

    let mut pipe = Pipe::new(
        FifoReader::new(Arc::clone(&source)),
        FifoWriter::new(Arc::clone(&sink)),
        sink_layout.total_size(),
    );
    pipe.reader_mut().set_wakeup_target(as_target(Arc::clone(&producer_wakeups)));
    pipe.writer_mut().set_wakeup_target(as_target(Arc::clone(&consumer_wakeups)));

    let (worker, worker_wakeups) = PipeWorker::spawn(pipe);
    producer_writer.set_wakeup_target(as_target(Arc::clone(&worker_wakeups)));
    consumer_reader.set_wakeup_target(as_target(Arc::clone(&worker_wakeups)));

    let producer_handle = thread::Builder::new()
        .name("harness-producer".into())
        .spawn(move || {
            let mut producer = Producer::new(producer_writer, producer_wakeups, target);
            producer.run();
            producer.metrics()
        })
        .expect("failed to spawn producer thread");

    let mut consumer =
        Consumer::new(consumer_reader, consumer_wakeups, target).with_backpressure(backpressure_every);
    let result = consumer.run();
    let producer_metrics = producer_handle.join().expect("producer thread panicked");
    let pipe = worker.join();
    result?;

    Ok(Report {
        producer: producer_metrics,
        consumer: consumer.metrics(),
        pipes: vec![pipe.metrics()],
    })
}

fn as_target(counter: Arc<datafifo::WakeupCounter>) -> Arc<dyn WakeupTarget> {
    counter
}

enum DeferredState {
    /// Wakeups that arrived before [`DeferredWakeupTarget::install`] was
    /// called, counted rather than dropped.
    Pending(usize),
    Installed(Arc<dyn WakeupTarget>),
}

/// A [`WakeupTarget`] whose real destination is not known yet. Wakeups
/// delivered before [`Self::install`] runs are counted and replayed onto the
/// installed target rather than lost, so there is no race between a pipe
/// worker starting to forward traffic and its neighbor's wakeup counter
/// becoming available.
struct DeferredWakeupTarget {
    state: Mutex<DeferredState>,
}

impl DeferredWakeupTarget {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(DeferredState::Pending(0)),
        })
    }

    fn install(&self, target: Arc<dyn WakeupTarget>) {
        let mut state = self.state.lock().unwrap();
        if let DeferredState::Pending(count) = *state {
            for _ in 0..count {
                target.wake();
            }
        }
        *state = DeferredState::Installed(target);
    }
}

impl WakeupTarget for DeferredWakeupTarget {
    fn wake(&self) {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            DeferredState::Installed(target) => target.wake(),
            DeferredState::Pending(count) => *count += 1,
        }
    }
}
