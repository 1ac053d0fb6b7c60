//! Power-of-two sizing for mask-based wraparound.
//!
//! Ported from `cbuf_int.h`'s `next_pow2`/`next_multiple` helpers and
//! `cbuf.h`'s `cbuf_sz_buf`/`cbuf_sz_obj`/`cbuf_obj_cnt` inline accessors:
//! round the requested block size and block count up to powers of two, then
//! derive the shift and mask that make wraparound a single `& overflow_mask`
//! and block indexing a single `pos + (i << block_shift)`.

use thiserror::Error;

/// Largest total buffer size the 32-bit position counters can address in one
/// span.
const MAX_TOTAL_BYTES: u64 = 1 << 31;

/// Errors rounding a requested `(block_size, block_count)` into a valid
/// geometry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    /// `block_size` or `block_count` was zero.
    #[error("block_size and block_count must both be >= 1")]
    ZeroSize,
    /// The rounded-up total (`block_size * block_count`, both powers of two)
    /// exceeds what a 32-bit position counter can address.
    #[error("total buffer size {total} exceeds the 32-bit position span ({max})")]
    TooLarge {
        /// The rounded-up total that was requested.
        total: u64,
        /// The hard ceiling (`2^31` bytes).
        max: u64,
    },
}

/// Derived geometry for a ring: rounded block size/count, shift, and mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Power-of-two block size in bytes.
    pub block_size: u32,
    /// `log2(block_size)` — lets `offset()` multiply by a shift instead of `*`.
    pub block_shift: u32,
    /// Power-of-two block count.
    pub block_count: u32,
    /// `total_bytes - 1`, used to mask positions on wraparound.
    pub overflow_mask: u32,
}

impl Geometry {
    /// Rounds `block_size` and `block_count` up to powers of two and derives
    /// the shift/mask pair used for wraparound addressing.
    pub fn new(block_size: u32, block_count: u32) -> Result<Self, GeometryError> {
        if block_size == 0 || block_count == 0 {
            return Err(GeometryError::ZeroSize);
        }

        let block_size = next_pow2(block_size);
        let block_count = next_pow2(block_count);
        let block_shift = block_size.trailing_zeros();

        let total = u64::from(block_size) * u64::from(block_count);
        if total > MAX_TOTAL_BYTES {
            return Err(GeometryError::TooLarge {
                total,
                max: MAX_TOTAL_BYTES,
            });
        }

        Ok(Self {
            block_size,
            block_shift,
            block_count,
            #[allow(clippy::cast_possible_truncation)]
            overflow_mask: (total - 1) as u32,
        })
    }

    /// Total buffer size in bytes (`overflow_mask + 1`).
    #[inline]
    #[must_use]
    pub const fn total_bytes(&self) -> u32 {
        self.overflow_mask + 1
    }
}

/// Rounds `x` up to the next power of two. `next_pow2(0) == 1`.
#[must_use]
pub const fn next_pow2(x: u32) -> u32 {
    if x <= 1 {
        1
    } else {
        1 << (32 - (x - 1).leading_zeros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_power_of_two() {
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(2), 2);
        assert_eq!(next_pow2(3), 4);
        assert_eq!(next_pow2(8), 8);
        assert_eq!(next_pow2(9), 16);
        assert_eq!(next_pow2(0), 1);
    }

    #[test]
    fn geometry_derives_shift_and_mask() {
        let g = Geometry::new(100, 10).unwrap();
        assert_eq!(g.block_size, 128);
        assert_eq!(g.block_shift, 7);
        assert_eq!(g.block_count, 16);
        assert_eq!(g.total_bytes(), 128 * 16);
        assert_eq!(g.overflow_mask, 128 * 16 - 1);
    }

    #[test]
    fn rejects_zero_size() {
        assert_eq!(Geometry::new(0, 10), Err(GeometryError::ZeroSize));
        assert_eq!(Geometry::new(10, 0), Err(GeometryError::ZeroSize));
    }

    #[test]
    fn rejects_oversized_total() {
        let err = Geometry::new(1 << 20, 1 << 20).unwrap_err();
        assert!(matches!(err, GeometryError::TooLarge { .. }));
    }

    #[test]
    fn exact_power_of_two_span_is_accepted() {
        let g = Geometry::new(1 << 16, 1 << 15).unwrap();
        assert_eq!(u64::from(g.total_bytes()), MAX_TOTAL_BYTES);
    }
}
