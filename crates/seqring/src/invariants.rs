//! Debug assertion macros for ring invariants.
//!
//! These are only active in debug builds (`debug_assert!`), so there is zero
//! overhead in release builds. Used by the slot protocol in `protocol.rs`.

// =============================================================================
// Ring shape
// =============================================================================

/// Assert that the mask describes the cell slice it indexes.
///
/// **Invariant**: `cell_mask + 1` is a power of two equal to the cell count,
/// so `pos & cell_mask` is always in bounds.
///
/// Used in: `Ring::new()`
macro_rules! debug_assert_ring_mask {
    ($mask:expr, $cells:expr) => {
        debug_assert!(
            ($mask).wrapping_add(1).is_power_of_two() && ($mask).wrapping_add(1) == $cells,
            "ring shape violated: mask {:#x} does not index {} cells",
            $mask,
            $cells
        )
    };
}

// =============================================================================
// Slot ownership
// =============================================================================

/// Assert that a slot won through the cursor is still in the state that made
/// it claimable.
///
/// **Invariant**: between a successful claim and the release store, only the
/// claiming thread may change `sequence`. A producer owning position `pos`
/// sees `pos`; a consumer sees `pos + 1`.
///
/// Used in: `Ring::try_enqueue()` and `Ring::try_dequeue()` after the claim
macro_rules! debug_assert_owned_slot {
    ($side:literal, $cell:expr, $expected:expr, $pos:expr) => {
        debug_assert!(
            {
                let seen = $cell.sequence.load(crate::shim::atomic::Ordering::Relaxed);
                seen == $expected
            },
            "slot ownership violated: {} at position {} found sequence changed under it (expected {})",
            $side,
            $pos,
            $expected
        )
    };
}

/// Assert that a sequence value being published stays on the two-state lattice.
///
/// **Invariant**: a cell's sequence only ever moves forward, either from `pos`
/// to `pos + 1` (publish) or from `pos + 1` to `pos + capacity` (re-arm).
///
/// Used in: `Ring::try_enqueue()` and `Ring::try_dequeue()` before the release
macro_rules! debug_assert_forward {
    ($side:literal, $old:expr, $new:expr) => {
        debug_assert!(
            ($new).wrapping_sub($old) as isize > 0,
            "sequence regression: {} would move sequence from {} to {}",
            $side,
            $old,
            $new
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_forward;
pub(crate) use debug_assert_owned_slot;
pub(crate) use debug_assert_ring_mask;
