//! datafifo - a lock-free, wait-free shared-memory SPSC byte-stream transport
//!
//! A single-producer/single-consumer transport for variable-sized records
//! over a shared-memory region, plus the pipeline primitives (pipe, copy
//! engine, pipe worker) that chain several such channels into a DMA-style
//! unidirectional data path — conceptually modeling an asymmetric
//! multiprocessor where a host and an offload processor exchange data
//! through a linked chain of channels and copy engines.
//!
//! # Layout
//!
//! A [`SharedFifo`](region::SharedFifo) packs a header, a power-of-two
//! [`BdRing`](bdring::BdRing) of 32-bit descriptor slots, and a data area into
//! one contiguous byte region. [`FifoWriter`] and [`FifoReader`] hold private,
//! never-shared cursors into that region and synchronize only through each
//! descriptor slot's single-bit publication protocol — no locks, no other
//! atomics beyond the descriptor word itself.
//!
//! # Pipelines
//!
//! A [`Pipe`] connects one FIFO's reader to another FIFO's writer, coalescing
//! contiguous records into urgency-sized batches and moving them either
//! inline ([`pipe::SyncCopy`]) or through a [`CopyEngine`]
//! ([`pipe::AsyncCopy`]). A [`PipeWorker`] owns a pipe and drives it from a
//! background thread on a coalescing wakeup counter, so a whole chain of
//! FIFOs and pipes runs without busy-spinning.
//!
//! # Example
//!
//! ```
//! use datafifo::{FifoLayout, FifoReader, FifoWriter, SharedFifo};
//!
//! let fifo = SharedFifo::create(FifoLayout::default());
//! let mut writer = FifoWriter::new(std::sync::Arc::clone(&fifo));
//! let mut reader = FifoReader::new(fifo);
//!
//! writer.update_reader();
//! let ptr = writer.get_pointer();
//! unsafe { std::ptr::write_bytes(ptr, 0xAB, 16) };
//! writer.commit(ptr, 16).unwrap();
//! writer.advance(16);
//!
//! let (read_ptr, size) = reader.get().unwrap();
//! assert_eq!(size, 16);
//! assert_eq!(read_ptr, ptr.cast_const());
//! reader.pop();
//! assert!(reader.is_empty());
//! ```

mod bdring;
mod config;
mod engine;
mod error;
mod invariants;
mod metrics;
mod pipe;
mod pipe_worker;
mod reader;
mod region;
mod wakeup;
mod wire;
mod writer;

pub use bdring::BdRing;
pub use config::{
    FifoLayout, PipeTuning, DEFAULT_ALIGN, DEFAULT_BD_COUNT, DEFAULT_FIFO_SIZE,
    DEFAULT_URGENT_CAP, MAX_RECORD_SIZE, MIN_ALIGN,
};
pub use engine::CopyEngine;
pub use error::{DatafifoError, Result};
pub use metrics::{EngineMetrics, FifoMetrics, PipeMetrics};
pub use pipe::{AsyncCopy, Pipe, SyncCopy, TransferStrategy};
pub use pipe_worker::PipeWorker;
pub use reader::FifoReader;
pub use region::SharedFifo;
pub use wakeup::{WakeupCounter, WakeupTarget};
pub use writer::FifoWriter;
