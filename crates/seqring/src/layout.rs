//! Ring Storage: the in-memory layout of a buffer-backed queue.
//!
//! ```text
//! offset 0    ┌──────────────────────────────────────────┐
//!             │ pad line                        (64 B)   │
//! offset 64   │ enqueue_index + pad             (64 B)   │ ← producers
//! offset 128  │ dequeue_index + pad             (64 B)   │ ← consumers
//! offset 192  │ cell_mask + pad                 (64 B)   │ ← read-only
//! offset 256  ├──────────────────────────────────────────┤
//!             │ Slot<T> { sequence, data } × capacity    │
//!             └──────────────────────────────────────────┘
//! ```
//!
//! The header lines are padded with explicit byte arrays rather than
//! `#[repr(align(64))]`, so the header itself needs only word alignment and a
//! 16-byte aligned buffer is always enough for it.

use crate::arity::Arity;
use crate::shim::atomic::AtomicUsize;
use crate::storage::QUEUE_ALIGN;
use crate::shim::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::{align_of, size_of, MaybeUninit};
use std::ptr;

/// Cache line size the header is padded to.
pub const CACHE_LINE_BYTES: usize = 64;

const LINE_PAD: usize = CACHE_LINE_BYTES - size_of::<usize>();

/// One ring cell: a sequence number and one record.
///
/// `sequence` is either the lap-relative write position of the cell (free for
/// the producer claiming that position) or that position + 1 (holding data
/// for the consumer claiming it). Whoever holds the claimed position owns
/// `data` until it publishes the next sequence value.
#[repr(C)]
pub(crate) struct Slot<T> {
    pub(crate) sequence: AtomicUsize,
    pub(crate) data: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    pub(crate) fn new(sequence: usize) -> Self {
        Self {
            sequence: AtomicUsize::new(sequence),
            data: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// A header field on a cache line of its own.
#[repr(C)]
pub(crate) struct Line<X> {
    pub(crate) value: X,
    _pad: [u8; LINE_PAD],
}

impl<X> Line<X> {
    fn new(value: X) -> Self {
        Self {
            value,
            _pad: [0; LINE_PAD],
        }
    }
}

#[repr(C)]
pub(crate) struct Header<P: Arity, C: Arity> {
    _pad0: [u8; CACHE_LINE_BYTES],
    pub(crate) enqueue_index: Line<P::Cursor>,
    pub(crate) dequeue_index: Line<C::Cursor>,
    pub(crate) cell_mask: Line<usize>,
}

/// Size and alignment arithmetic for a queue of `T` with arities `P`/`C`.
pub(crate) struct QueueLayout<T, P, C>(PhantomData<(T, P, C)>);

impl<T, P: Arity, C: Arity> QueueLayout<T, P, C> {
    /// Alignment the backing buffer must satisfy.
    pub(crate) const fn align() -> usize {
        let mut align = QUEUE_ALIGN;
        if align_of::<Header<P, C>>() > align {
            align = align_of::<Header<P, C>>();
        }
        if align_of::<Slot<T>>() > align {
            align = align_of::<Slot<T>>();
        }
        align
    }

    /// Byte offset of the first cell.
    pub(crate) const fn cells_offset() -> usize {
        let header = size_of::<Header<P, C>>();
        let slot_align = align_of::<Slot<T>>();
        (header + slot_align - 1) & !(slot_align - 1)
    }

    /// Header size plus `capacity` cells, or `None` on overflow.
    pub(crate) fn required_bytes(capacity: usize) -> Option<usize> {
        capacity
            .checked_mul(size_of::<Slot<T>>())?
            .checked_add(Self::cells_offset())
    }

    /// Zeroes the region and establishes the initial ring state.
    ///
    /// Afterwards `cell_mask == capacity - 1`, both cursors are 0, and cell
    /// `i` carries sequence `i`, i.e. every cell is ready for lap 0 producers.
    ///
    /// # Safety
    ///
    /// `base` must be aligned to [`align`](Self::align) and valid for writes
    /// of `required_bytes(capacity)` bytes; `capacity` must be a power of two.
    pub(crate) unsafe fn init_in_place(base: *mut u8, capacity: usize, bytes: usize) {
        debug_assert!(capacity.is_power_of_two());
        ptr::write_bytes(base, 0, bytes);

        ptr::write(
            base.cast::<Header<P, C>>(),
            Header {
                _pad0: [0; CACHE_LINE_BYTES],
                enqueue_index: Line::new(P::cursor(0)),
                dequeue_index: Line::new(C::cursor(0)),
                cell_mask: Line::new(capacity - 1),
            },
        );

        let cells = base.add(Self::cells_offset()).cast::<Slot<T>>();
        for i in 0..capacity {
            ptr::write(cells.add(i), Slot::new(i));
        }
    }

    /// Runs destructors for the header and cells written by `init_in_place`.
    ///
    /// Only the synchronization primitives are dropped; records are `Copy`.
    ///
    /// # Safety
    ///
    /// The region must have been initialized by `init_in_place` with the same
    /// capacity and must not be used afterwards.
    pub(crate) unsafe fn drop_in_place(base: *mut u8, capacity: usize) {
        if std::mem::needs_drop::<Header<P, C>>() {
            ptr::drop_in_place(base.cast::<Header<P, C>>());
        }
        if std::mem::needs_drop::<Slot<T>>() {
            let cells = base.add(Self::cells_offset()).cast::<Slot<T>>();
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(cells, capacity));
        }
    }
}
