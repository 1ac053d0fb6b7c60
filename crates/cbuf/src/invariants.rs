//! Debug assertion macros for the six-counter state machine.
//!
//! Active only in debug builds (`debug_assert!`), zero cost in release. This
//! is the crate's only form of runtime observability besides
//! [`crate::Metrics`]; there is no logging dependency here.

// =============================================================================
// INV-CONS-01: Conservation of bytes
// =============================================================================

/// `sz_unused + sz_ready + snd_reserved + snd_uncommitted + rcv_reserved +
/// rcv_uncommitted == total_bytes` at every quiescent observation.
macro_rules! debug_assert_conserved {
    ($unused:expr, $ready:expr, $snd_res:expr, $snd_unc:expr, $rcv_res:expr, $rcv_unc:expr, $total:expr) => {
        debug_assert_eq!(
            $unused + $ready + i64::from($snd_res) + i64::from($snd_unc) + i64::from($rcv_res) + i64::from($rcv_unc),
            i64::from($total),
            "INV-CONS-01 violated: counters do not sum to total_bytes"
        )
    };
}

// =============================================================================
// INV-CONS-02: Counters are non-negative multiples of block_size
// =============================================================================

/// `reserved`/`uncommitted` counters are non-negative multiples of
/// `block_size`.
macro_rules! debug_assert_block_multiple {
    ($name:literal, $value:expr, $block_size:expr) => {
        debug_assert!(
            $value % $block_size == 0,
            "INV-CONS-02 violated: {} = {} is not a multiple of block_size {}",
            $name,
            $value,
            $block_size
        )
    };
}

// =============================================================================
// INV-CONS-03: Pool sizes are bounded
// =============================================================================

/// `sz_unused` and `sz_ready` are each in `[0, total]`.
macro_rules! debug_assert_pool_bounded {
    ($name:literal, $value:expr, $total:expr) => {
        debug_assert!(
            $value >= 0 && $value <= i64::from($total),
            "INV-CONS-03 violated: {} = {} outside [0, {}]",
            $name,
            $value,
            $total
        )
    };
}

// =============================================================================
// INV-RES-01: A returned block address falls within the buffer span
// =============================================================================

/// Every block address handed out by `offset(pos, i)` falls within the
/// buffer span.
macro_rules! debug_assert_block_in_span {
    ($addr_offset:expr, $block_size:expr, $total:expr) => {
        debug_assert!(
            $addr_offset + $block_size <= $total,
            "INV-RES-01 violated: block at offset {} (size {}) exceeds span {}",
            $addr_offset,
            $block_size,
            $total
        )
    };
}

// =============================================================================
// INV-CKPT-01: Checkpoint verification is monotonic
// =============================================================================

/// A checkpoint's "actual consumer" position only moves forward between two
/// observations (used in tests, where both snapshots are visible).
macro_rules! debug_assert_checkpoint_monotonic {
    ($old_actual:expr, $new_actual:expr) => {
        debug_assert!(
            $new_actual.wrapping_sub($old_actual) < (1u64 << 63),
            "INV-CKPT-01 violated: actual consumer position regressed from {} to {}",
            $old_actual,
            $new_actual
        )
    };
}

pub(crate) use debug_assert_block_in_span;
pub(crate) use debug_assert_block_multiple;
pub(crate) use debug_assert_conserved;
pub(crate) use debug_assert_pool_bounded;
#[cfg(test)]
pub(crate) use debug_assert_checkpoint_monotonic;
