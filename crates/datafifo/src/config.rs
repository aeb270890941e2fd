//! Validated configuration surface for FIFO layout and pipe tuning.
//!
//! Collects the deployment constants that would otherwise be scattered bare
//! constants: ring size, descriptor count, alignment quantum, urgent batch
//! cap and maximum batch size. Validation happens once, at construction,
//! with `assert!` inside a `const fn`.

/// Minimum alignment quantum allowed by the wire format: every committed
/// pointer must be at least 4-byte aligned so the offset field (stored as
/// byte-offset / 4) round-trips exactly.
pub const MIN_ALIGN: u32 = 4;

/// Largest size representable in a descriptor's 12-bit size field.
pub const MAX_RECORD_SIZE: usize = 4095;

/// Default total size of one FIFO's shared-memory region (header + ring + data).
pub const DEFAULT_FIFO_SIZE: usize = 64 * 1024;

/// Default descriptor-ring slot count.
pub const DEFAULT_BD_COUNT: u16 = 128;

/// Default alignment quantum.
pub const DEFAULT_ALIGN: u32 = 16;

/// Default cap on a pipe's batch span once the sink is judged urgent.
pub const DEFAULT_URGENT_CAP: usize = 2 * 1024;

/// The on-disk/in-memory header layout, always 16 bytes: `u16 bd_count, u16
/// datasize, u32 reader_status, u32 writer_status, u32 align`.
pub const HEADER_SIZE: usize = 16;

/// Validated byte layout of one FIFO's shared-memory region.
///
/// `H` (header size rounded up to `align`) and `R` (descriptor-ring size
/// rounded up to `align`) are computed once here and reused by every
/// component that needs to locate the ring or the data area inside the
/// backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoLayout {
    bd_count: u16,
    align: u32,
    header_region: usize,
    ring_region: usize,
    datasize: u16,
}

impl FifoLayout {
    /// Builds a layout for a region of `total_size` bytes holding `bd_count`
    /// descriptors at alignment quantum `align`.
    ///
    /// # Panics
    ///
    /// Panics if `bd_count` is not a power of two, if `align` is not a power
    /// of two `>= MIN_ALIGN`, or if `total_size` is too small to hold the
    /// header and ring at the requested alignment.
    #[must_use]
    pub const fn new(total_size: usize, bd_count: u16, align: u32) -> Self {
        assert!(bd_count > 0, "bd_count must be nonzero");
        assert!(bd_count.is_power_of_two(), "bd_count must be a power of two");
        assert!(align >= MIN_ALIGN, "align must be at least MIN_ALIGN");
        assert!(align.is_power_of_two(), "align must be a power of two");

        let header_region = round_up(HEADER_SIZE, align as usize);
        let ring_bytes = bd_count as usize * 4;
        let ring_region = round_up(ring_bytes, align as usize);

        assert!(
            total_size >= header_region + ring_region,
            "total_size too small to hold header and descriptor ring"
        );

        let data_capacity = total_size - header_region - ring_region;
        // Data area is trimmed to a multiple of align; any residue is discarded (§3).
        let datasize = data_capacity - (data_capacity % align as usize);
        assert!(datasize <= u16::MAX as usize, "datasize overflows u16");

        Self {
            bd_count,
            align,
            header_region,
            ring_region,
            datasize: datasize as u16,
        }
    }

    /// Rebuilds a layout purely from header fields read back out of shared
    /// memory, recomputing `H` and `R` rather than trusting caller-supplied
    /// constants.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DatafifoError::InvalidLayout`] if `bd_count` or
    /// `align` read from the header fail validation, or if `total_size` is
    /// too small for the header fields it claims to describe.
    pub fn from_header(
        total_size: usize,
        bd_count: u16,
        datasize: u16,
        align: u32,
    ) -> crate::Result<Self> {
        if bd_count == 0 || !bd_count.is_power_of_two() {
            return Err(crate::DatafifoError::InvalidLayout {
                reason: "bd_count is not a nonzero power of two",
            });
        }
        if align < MIN_ALIGN || !align.is_power_of_two() {
            return Err(crate::DatafifoError::InvalidLayout {
                reason: "align is not a power of two >= MIN_ALIGN",
            });
        }

        let header_region = round_up(HEADER_SIZE, align as usize);
        let ring_region = round_up(bd_count as usize * 4, align as usize);

        if total_size < header_region + ring_region + datasize as usize {
            return Err(crate::DatafifoError::InvalidLayout {
                reason: "total_size too small for header-described regions",
            });
        }

        Ok(Self {
            bd_count,
            align,
            header_region,
            ring_region,
            datasize,
        })
    }

    /// Number of descriptor slots in the ring.
    #[must_use]
    pub const fn bd_count(&self) -> u16 {
        self.bd_count
    }

    /// Alignment quantum, in bytes.
    #[must_use]
    pub const fn align(&self) -> u32 {
        self.align
    }

    /// Size of the data area, in bytes.
    #[must_use]
    pub const fn datasize(&self) -> u16 {
        self.datasize
    }

    /// Byte offset of the descriptor ring within the region (== `H`).
    #[must_use]
    pub const fn ring_offset(&self) -> usize {
        self.header_region
    }

    /// Byte offset of the data area within the region (== `H + R`).
    #[must_use]
    pub const fn data_offset(&self) -> usize {
        self.header_region + self.ring_region
    }

    /// Total size of the region this layout describes.
    #[must_use]
    pub const fn total_size(&self) -> usize {
        self.data_offset() + self.datasize as usize
    }
}

const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

/// Default layout used by the standard loopback/pipeline scenarios:
/// `FIFO_SIZE = 64 KiB`, `FIFO_BD_COUNT = 128`, `align = 16`.
pub const LOOPBACK_LAYOUT: (usize, u16, u32) =
    (DEFAULT_FIFO_SIZE, DEFAULT_BD_COUNT, DEFAULT_ALIGN);

impl Default for FifoLayout {
    fn default() -> Self {
        Self::new(DEFAULT_FIFO_SIZE, DEFAULT_BD_COUNT, DEFAULT_ALIGN)
    }
}

/// Batch-sizing tuning for a [`crate::pipe::Pipe`].
///
/// When the sink's total free space falls below `urgent_cap` bytes, the pipe
/// clamps its batch span to `max_batch_size_urgent`; otherwise it clamps to
/// `max_batch_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeTuning {
    pub(crate) urgent_cap: usize,
    pub(crate) max_batch_size: usize,
    pub(crate) max_batch_size_urgent: usize,
}

impl PipeTuning {
    /// Builds tuning parameters for a sink of the given total FIFO size,
    /// using the standard defaults (`URGENT_CAP = 2 KiB`,
    /// `MAX_BATCH_SIZE = fifo_size / 2`, `MAX_BATCH_SIZE_URGENT = URGENT_CAP`).
    #[must_use]
    pub const fn for_fifo_size(fifo_size: usize) -> Self {
        Self {
            urgent_cap: DEFAULT_URGENT_CAP,
            max_batch_size: fifo_size / 2,
            max_batch_size_urgent: DEFAULT_URGENT_CAP,
        }
    }
}

impl Default for PipeTuning {
    fn default() -> Self {
        Self::for_fifo_size(DEFAULT_FIFO_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_spec_scenario() {
        let layout = FifoLayout::default();
        assert_eq!(layout.bd_count(), 128);
        assert_eq!(layout.align(), 16);
        assert!(layout.datasize() as usize <= DEFAULT_FIFO_SIZE);
        assert_eq!(layout.ring_offset() % layout.align() as usize, 0);
        assert_eq!(layout.data_offset() % layout.align() as usize, 0);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two_bd_count() {
        let _ = FifoLayout::new(DEFAULT_FIFO_SIZE, 100, DEFAULT_ALIGN);
    }

    #[test]
    #[should_panic(expected = "align")]
    fn rejects_sub_minimum_align() {
        let _ = FifoLayout::new(DEFAULT_FIFO_SIZE, DEFAULT_BD_COUNT, 2);
    }

    #[test]
    fn from_header_round_trips_a_valid_layout() {
        let layout = FifoLayout::default();
        let reconnected = FifoLayout::from_header(
            layout.total_size(),
            layout.bd_count(),
            layout.datasize(),
            layout.align(),
        )
        .expect("valid header round-trips");
        assert_eq!(reconnected, layout);
    }

    #[test]
    fn from_header_rejects_bad_bd_count() {
        let err = FifoLayout::from_header(DEFAULT_FIFO_SIZE, 3, 1000, DEFAULT_ALIGN).unwrap_err();
        assert!(matches!(err, crate::DatafifoError::InvalidLayout { .. }));
    }

    #[test]
    fn pipe_tuning_defaults_match_spec() {
        let tuning = PipeTuning::for_fifo_size(DEFAULT_FIFO_SIZE);
        assert_eq!(tuning.urgent_cap, 2048);
        assert_eq!(tuning.max_batch_size, DEFAULT_FIFO_SIZE / 2);
        assert_eq!(tuning.max_batch_size_urgent, 2048);
    }
}
