//! Producer/consumer workloads and pipeline-wiring helpers exercising
//! `datafifo` end to end.
//!
//! This crate is the harness, not the transport: it wires real threads
//! around `datafifo`'s types rather than adding to the transport itself.

pub mod consumer;
pub mod producer;
pub mod scenario;

pub use consumer::Consumer;
pub use producer::Producer;
