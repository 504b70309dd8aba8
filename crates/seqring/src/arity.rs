//! Producer/consumer arity.
//!
//! Each side of a queue is independently [`Single`] or [`Multi`]. The cell
//! sequence protocol is identical for all four combinations; only the cursor
//! storage and the claim step differ:
//!
//! | Arity    | Cursor                 | Claim                                  |
//! |----------|------------------------|----------------------------------------|
//! | `Single` | `UnsafeCell<usize>`    | plain store of `pos + 1`, never fails  |
//! | `Multi`  | `AtomicUsize`          | `compare_exchange_weak(pos, pos + 1)`  |

use crate::shim::atomic::{AtomicUsize, Ordering};
use crate::shim::cell::UnsafeCell;

mod sealed {
    pub trait Sealed {}
}

/// One side (producer or consumer) of a queue: one thread or many.
///
/// This trait is sealed; [`Single`] and [`Multi`] are the only
/// implementations.
pub trait Arity: sealed::Sealed + Send + Sync + 'static {
    /// Whether many threads may operate this side concurrently.
    const MULTI: bool;
    /// Short label used in logs and debug output.
    const LABEL: &'static str;

    #[doc(hidden)]
    type Cursor;

    #[doc(hidden)]
    fn cursor(start: usize) -> Self::Cursor;

    /// Reads the cursor. Relaxed: the cell sequence is the real handoff.
    #[doc(hidden)]
    fn load(cursor: &Self::Cursor) -> usize;

    /// Advances the cursor from `pos` to `pos + 1`.
    ///
    /// # Safety
    ///
    /// For a single-threaded side the caller must be the only thread
    /// touching this cursor.
    #[doc(hidden)]
    unsafe fn claim(cursor: &Self::Cursor, pos: usize) -> bool;
}

/// Exactly one thread operates this side.
#[derive(Debug)]
pub enum Single {}

/// Any number of threads operate this side concurrently.
#[derive(Debug)]
pub enum Multi {}

impl sealed::Sealed for Single {}
impl sealed::Sealed for Multi {}

/// Cursor of a single-threaded side.
#[doc(hidden)]
pub struct SingleCursor(UnsafeCell<usize>);

impl Arity for Single {
    const MULTI: bool = false;
    const LABEL: &'static str = "single";

    type Cursor = SingleCursor;

    #[inline]
    fn cursor(start: usize) -> SingleCursor {
        SingleCursor(UnsafeCell::new(start))
    }

    #[inline]
    fn load(cursor: &SingleCursor) -> usize {
        // SAFETY: only the side's one thread reads or writes this cursor.
        cursor.0.with(|pos| unsafe { *pos })
    }

    #[inline]
    unsafe fn claim(cursor: &SingleCursor, pos: usize) -> bool {
        cursor.0.with_mut(|cur| *cur = pos.wrapping_add(1));
        true
    }
}

impl Arity for Multi {
    const MULTI: bool = true;
    const LABEL: &'static str = "multi";

    type Cursor = AtomicUsize;

    #[inline]
    fn cursor(start: usize) -> AtomicUsize {
        AtomicUsize::new(start)
    }

    #[inline]
    fn load(cursor: &AtomicUsize) -> usize {
        cursor.load(Ordering::Relaxed)
    }

    #[inline]
    unsafe fn claim(cursor: &AtomicUsize, pos: usize) -> bool {
        // Relaxed on both arms: the winner publishes through the cell
        // sequence, and a loser reports contention instead of retrying here.
        cursor
            .compare_exchange_weak(pos, pos.wrapping_add(1), Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }
}
