//! Runnable harness binary: wires up each pipeline shape in turn and reports
//! progress through `tracing`. Takes no arguments; runs a fixed sequence of
//! configured pipelines to completion, logging milestones as it goes.

use datafifo::{DEFAULT_ALIGN, DEFAULT_BD_COUNT, DEFAULT_FIFO_SIZE};
use datafifo::FifoLayout;
use datafifo_harness::scenario;

fn default_layout() -> FifoLayout {
    FifoLayout::new(DEFAULT_FIFO_SIZE, DEFAULT_BD_COUNT, DEFAULT_ALIGN)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    const RECORD_COUNT: u64 = 1_000_000;

    tracing::info!(records = RECORD_COUNT, "running single-FIFO loopback");
    let report = scenario::run_loopback(default_layout(), RECORD_COUNT)
        .expect("loopback scenario failed");
    tracing::info!(?report.producer, ?report.consumer, "loopback complete");

    tracing::info!(records = RECORD_COUNT, "running sync-strategy pipe");
    let report = scenario::run_sync_pipe(default_layout(), default_layout(), RECORD_COUNT)
        .expect("sync pipe scenario failed");
    tracing::info!(pipe = ?report.pipes[0], "sync pipe complete");

    tracing::info!(records = RECORD_COUNT, "running async-engine pipe");
    let report = scenario::run_async_pipe(default_layout(), default_layout(), RECORD_COUNT)
        .expect("async pipe scenario failed");
    tracing::info!(pipe = ?report.pipes[0], "async pipe complete");

    tracing::info!(records = RECORD_COUNT, "running two-engine chained pipeline");
    let report = scenario::run_chained_pipes(
        default_layout(),
        default_layout(),
        default_layout(),
        RECORD_COUNT,
    )
    .expect("chained pipe scenario failed");
    tracing::info!(pipes = ?report.pipes, "chained pipeline complete");

    const TINY_PREFIX: u64 = 10_000;
    tracing::info!(records = RECORD_COUNT, prefix = TINY_PREFIX, "running tiny-record stress");
    scenario::run_tiny_record_stress(default_layout(), RECORD_COUNT, TINY_PREFIX)
        .expect("tiny-record stress scenario failed");
    tracing::info!("tiny-record stress complete");

    tracing::info!(records = RECORD_COUNT, "running urgent-backpressure scenario");
    let small_sink = FifoLayout::new(4 * 1024, 16, DEFAULT_ALIGN);
    let report = scenario::run_urgent_backpressure(default_layout(), small_sink, RECORD_COUNT, 1024)
        .expect("urgent-backpressure scenario failed");
    tracing::info!(
        urgent_batches = report.pipes[0].urgent_batches,
        "urgent-backpressure complete"
    );

    tracing::info!("harness finished");
}
