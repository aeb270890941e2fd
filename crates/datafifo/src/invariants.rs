//! Debug assertion macros for the descriptor-ring and FIFO invariants.
//!
//! These macros provide runtime checks for invariants the transport's
//! correctness depends on. They are only active in debug builds
//! (`#[cfg(debug_assertions)]`), so there is zero overhead in release builds.
//!
//! Used by the descriptor ring, the FIFO reader and the FIFO writer.

// =============================================================================
// INV-BD-01: Record Size Bound
// =============================================================================

/// Assert that a descriptor's size never exceeds the 12-bit size field.
///
/// **Invariant**: every committed descriptor's size is ≤ 4095 bytes.
///
/// Used in: `BdRing::put`, `FifoWriter::commit`
macro_rules! debug_assert_size_bound {
    ($size:expr, $max:expr) => {
        debug_assert!(
            $size <= $max,
            "INV-BD-01 violated: record size {} exceeds maximum {}",
            $size,
            $max
        )
    };
}

// =============================================================================
// INV-BD-02: Offset In Bounds
// =============================================================================

/// Assert that a descriptor's byte range lies entirely inside the data area.
///
/// **Invariant**: `offset + size <= datasize` for every committed descriptor.
///
/// Used in: `FifoWriter::commit`
macro_rules! debug_assert_offset_in_bounds {
    ($offset:expr, $size:expr, $datasize:expr) => {
        debug_assert!(
            ($offset as u64) + ($size as u64) <= ($datasize as u64),
            "INV-BD-02 violated: descriptor [{}, {}) falls outside data area of size {}",
            $offset,
            $offset as u64 + $size as u64,
            $datasize
        )
    };
}

// =============================================================================
// INV-FIFO-01: Cursor Monotonicity Modulo N
// =============================================================================

/// Assert that a descriptor-ring cursor advances by exactly one slot, modulo N.
///
/// **Invariant**: the reader's and writer's next-index cursors each advance
/// monotonically modulo the ring's slot count.
///
/// Used in: `FifoReader::pop`, `FifoWriter::commit`
macro_rules! debug_assert_cursor_step {
    ($old:expr, $new:expr, $mask:expr) => {
        debug_assert!(
            $new == ($old + 1) & $mask,
            "INV-FIFO-01 violated: cursor stepped from {} to {} (mask {})",
            $old,
            $new,
            $mask
        )
    };
}

// =============================================================================
// INV-FIFO-02: Used-Bit Alternation
// =============================================================================

/// Assert that a used-bit transition is the legal alternation (0->1 or 1->0).
///
/// **Invariant**: for every slot, observed used-bit values alternate 0,1,0,1,...
///
/// Used in: `BdRing::put` (expects 0->1), `BdRing::clear_slot` (expects 1->0)
macro_rules! debug_assert_used_transition {
    ($was_used:expr, $expected:expr) => {
        debug_assert!(
            $was_used == $expected,
            "INV-FIFO-02 violated: expected used bit {} before transition, found {}",
            $expected,
            $was_used
        )
    };
}

// =============================================================================
// INV-FIFO-03: Space Accounting
// =============================================================================

/// Assert that advancing the write cursor never overruns the free region
/// computed by the most recent `update_reader`/`get_free_contiguous` pair.
///
/// **Invariant**: the writer never overwrites a range for which any
/// descriptor's used bit is still 1 (space-accounting property).
///
/// Used in: `FifoWriter::advance`
macro_rules! debug_assert_advance_within_free {
    ($aligned_size:expr, $free_contiguous:expr) => {
        debug_assert!(
            $aligned_size <= $free_contiguous,
            "INV-FIFO-03 violated: advancing {} bytes exceeds free_contiguous {}",
            $aligned_size,
            $free_contiguous
        )
    };
}

// =============================================================================
// INV-FIFO-04: Batch Span Ordering
// =============================================================================

/// Assert that successive descriptor offsets within a batch strictly increase.
///
/// **Invariant**: `get_batch` only coalesces descriptors with strictly
/// increasing offsets; a non-increasing offset marks a ring wrap and stops
/// the batch.
///
/// Used in: `FifoReader::get_batch`
macro_rules! debug_assert_batch_offsets_increasing {
    ($prev_offset:expr, $offset:expr) => {
        debug_assert!(
            $offset > $prev_offset,
            "INV-FIFO-04 violated: batch offset {} did not increase past {}",
            $offset,
            $prev_offset
        )
    };
}

// =============================================================================
// INV-ALIGN-01: Alignment Quantum
// =============================================================================

/// Assert that a byte count or pointer delta is a multiple of the alignment
/// quantum.
///
/// **Invariant**: every committed write pointer and every `advance()` size is
/// `align`-aligned.
///
/// Used in: `FifoWriter::advance`, `FifoLayout::new`
macro_rules! debug_assert_is_aligned {
    ($value:expr, $align:expr) => {
        debug_assert!(
            $value % $align == 0,
            "INV-ALIGN-01 violated: {} is not a multiple of alignment quantum {}",
            $value,
            $align
        )
    };
}

pub(crate) use debug_assert_advance_within_free;
pub(crate) use debug_assert_batch_offsets_increasing;
pub(crate) use debug_assert_cursor_step;
pub(crate) use debug_assert_is_aligned;
pub(crate) use debug_assert_offset_in_bounds;
pub(crate) use debug_assert_size_bound;
pub(crate) use debug_assert_used_transition;
