//! Error types for the FIFO transport, its pipes and its copy engines.
//!
//! A small `thiserror`-derived enum covering the in-band error kinds.
//! Misconfiguration that can be checked before any shared memory is touched
//! (bad `bd_count`, sub-minimum alignment) is rejected by `assert!` inside
//! `FifoLayout::new` instead, since it is a programmer error rather than a
//! runtime condition.

use thiserror::Error;

/// Errors surfaced by the FIFO transport's in-band operations.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DatafifoError {
    /// `FifoWriter::commit` was asked to publish a record larger than the
    /// 12-bit size field can hold.
    #[error("record size {size} exceeds the maximum of {max} bytes")]
    OversizeRecord {
        /// The size that was rejected.
        size: usize,
        /// The maximum representable size (4095).
        max: usize,
    },

    /// `FifoWriter::commit` was given a pointer that does not fall inside the
    /// data area it owns.
    #[error("write pointer is outside the data area")]
    PointerOutOfRange,

    /// A shared-memory buffer is too small to hold the layout it claims to
    /// describe, or its header fields fail validation on connect.
    #[error("invalid FIFO layout: {reason}")]
    InvalidLayout {
        /// Human-readable description of what failed validation.
        reason: &'static str,
    },

    /// The test consumer observed a sequence value other than the one it
    /// expected next. Test-only; never produced by the core transport.
    #[error("sequence mismatch: expected {expected}, got {got}")]
    SequenceMismatch {
        /// The value the consumer expected to see next.
        expected: u32,
        /// The value it actually read.
        got: u32,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DatafifoError>;
