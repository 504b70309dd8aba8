//! Queue with a compile-time capacity and the cells embedded in the value.
//!
//! [`InlineQueue<T, N, P, C>`] runs the same slot protocol as
//! [`Queue`](crate::Queue) but needs no sizing phase and no external buffer:
//! the cursors and the `[Slot<T>; N]` array are fields of the struct, so the
//! whole queue can live in a `static`-like owner, an `Arc`, or on the stack.
//!
//! # Memory Layout
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ enqueue_index  (CachePadded)   ← producers                 │
//! ├────────────────────────────────────────────────────────────┤
//! │ dequeue_index  (CachePadded)   ← consumers                 │
//! ├────────────────────────────────────────────────────────────┤
//! │ config, metrics, handle claims (cold)                      │
//! ├────────────────────────────────────────────────────────────┤
//! │ [Slot<T>; N]  (inline, no pointer indirection)             │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Size Constraints
//!
//! Each cell is `size_of::<usize>()` plus the record, rounded to the record's
//! alignment. `InlineQueue<u64, 4096, _, _>` is about 64KB; box large
//! instances rather than keeping them on a thread stack.

use crate::arity::{Arity, Multi};
use crate::handle::{sealed, Consumer, Producer, RawQueue, SideClaims};
use crate::layout::Slot;
use crate::protocol::Ring;
use crate::trace::debug;
use crate::{Config, Metrics, MetricsSnapshot, QueueError};
use crossbeam_utils::CachePadded;
use std::fmt;

/// Bounded queue of `N` cells stored inline.
#[repr(C)]
pub struct InlineQueue<T, const N: usize, P: Arity, C: Arity> {
    enqueue_index: CachePadded<P::Cursor>,
    dequeue_index: CachePadded<C::Cursor>,
    config: Config,
    metrics: Metrics,
    claims: SideClaims,
    cells: [Slot<T>; N],
}

// Safety: same reasoning as for `Queue`; the cells are reached only through
// the slot protocol and single-arity cursors only through unique handles.
unsafe impl<T: Send, const N: usize, P: Arity, C: Arity> Send for InlineQueue<T, N, P, C> {}
unsafe impl<T: Send, const N: usize, P: Arity, C: Arity> Sync for InlineQueue<T, N, P, C> {}

impl<T: Copy, const N: usize, P: Arity, C: Arity> InlineQueue<T, N, P, C> {
    /// Index mask: `N - 1` (valid because N is a power of 2).
    const MASK: usize = N - 1;

    /// Evaluated at monomorphization; a bad `N` fails the build.
    const SHAPE: () = {
        assert!(N >= 2, "InlineQueue capacity must be at least 2");
        assert!(N.is_power_of_two(), "InlineQueue capacity must be a power of 2");
    };

    /// Creates an empty queue under the default [`Config`].
    ///
    /// ```
    /// use seqring_rs::{InlineQueue, Multi};
    ///
    /// let queue: InlineQueue<u32, 8, Multi, Multi> = InlineQueue::new();
    /// queue.enqueue(5).unwrap();
    /// assert_eq!(queue.dequeue(), Ok(5));
    /// ```
    ///
    /// ```compile_fail
    /// use seqring_rs::{InlineQueue, Single};
    ///
    /// // 12 is not a power of two.
    /// let queue: InlineQueue<u32, 12, Single, Single> = InlineQueue::new();
    /// ```
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty queue. The capacity bounds in `config` do not apply;
    /// `N` is checked at compile time instead.
    pub fn with_config(config: Config) -> Self {
        let () = Self::SHAPE;

        debug!(
            capacity = N,
            producers = P::LABEL,
            consumers = C::LABEL,
            "inline queue created"
        );

        Self {
            enqueue_index: CachePadded::new(P::cursor(0)),
            dequeue_index: CachePadded::new(C::cursor(0)),
            config,
            metrics: Metrics::new(),
            claims: SideClaims::default(),
            cells: std::array::from_fn(Slot::new),
        }
    }

    /// Returns the queue capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Policy the queue was created with.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a snapshot of metrics if enabled.
    pub fn metrics(&self) -> MetricsSnapshot {
        if self.config.enable_metrics {
            self.metrics.snapshot()
        } else {
            MetricsSnapshot::default()
        }
    }

    #[inline]
    fn view(&self) -> Ring<'_, T, P, C> {
        Ring::new(
            &*self.enqueue_index,
            &*self.dequeue_index,
            &self.cells,
            Self::MASK,
            self.config.enable_metrics.then_some(&self.metrics),
        )
    }
}

impl<T: Copy + Send, const N: usize, P: Arity, C: Arity> InlineQueue<T, N, P, C> {
    /// Takes a producer handle; `None` while a single producer is held.
    pub fn producer(&self) -> Option<Producer<'_, Self>> {
        Producer::acquire(self)
    }

    /// Takes a consumer handle; `None` while a single consumer is held.
    pub fn consumer(&self) -> Option<Consumer<'_, Self>> {
        Consumer::acquire(self)
    }
}

impl<T: Copy, const N: usize, C: Arity> InlineQueue<T, N, Multi, C> {
    /// One enqueue attempt from any thread.
    ///
    /// Returns `Full` when no cell is free and `Contention` when another
    /// producer won the claim; the record is handed back in neither case.
    #[inline]
    pub fn try_enqueue(&self, item: T) -> Result<(), QueueError> {
        // SAFETY: the producer side is multi-threaded; claims use CAS.
        unsafe { self.view().try_enqueue(item) }
    }

    /// Enqueues from any thread, retrying while the claim is contended.
    ///
    /// ```
    /// use seqring_rs::{InlineQueue, Multi, QueueError, Single};
    ///
    /// let queue: InlineQueue<u8, 2, Multi, Single> = InlineQueue::new();
    /// queue.enqueue(1)?;
    /// queue.enqueue(2)?;
    /// assert_eq!(queue.enqueue(3), Err(QueueError::Full));
    /// # Ok::<(), QueueError>(())
    /// ```
    #[inline]
    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        // SAFETY: as above.
        unsafe { self.view().enqueue(item, self.config.backoff) }
    }
}

impl<T: Copy, const N: usize, P: Arity> InlineQueue<T, N, P, Multi> {
    /// One dequeue attempt from any thread: `Empty` when nothing is
    /// published, `Contention` when another consumer won the claim.
    #[inline]
    pub fn try_dequeue(&self) -> Result<T, QueueError> {
        // SAFETY: the consumer side is multi-threaded; claims use CAS.
        unsafe { self.view().try_dequeue() }
    }

    /// Dequeues from any thread, retrying while the claim is contended.
    #[inline]
    pub fn dequeue(&self) -> Result<T, QueueError> {
        // SAFETY: as above.
        unsafe { self.view().dequeue(self.config.backoff) }
    }
}

impl<T: Copy, const N: usize, P: Arity, C: Arity> Default for InlineQueue<T, N, P, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize, P: Arity, C: Arity> sealed::Sealed for InlineQueue<T, N, P, C> {}

impl<T: Copy + Send, const N: usize, P: Arity, C: Arity> RawQueue for InlineQueue<T, N, P, C> {
    type Item = T;
    type Producers = P;
    type Consumers = C;

    #[inline]
    fn ring(&self) -> Ring<'_, T, P, C> {
        self.view()
    }

    #[inline]
    fn claims(&self) -> &SideClaims {
        &self.claims
    }

    #[inline]
    fn capacity(&self) -> usize {
        N
    }

    #[inline]
    fn config(&self) -> &Config {
        &self.config
    }
}

impl<T, const N: usize, P: Arity, C: Arity> fmt::Debug for InlineQueue<T, N, P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineQueue")
            .field("producers", &P::LABEL)
            .field("consumers", &C::LABEL)
            .field("capacity", &N)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::Single;

    #[test]
    fn test_inline_fifo() {
        let queue: InlineQueue<u64, 4, Single, Single> = InlineQueue::new();
        let mut tx = queue.producer().unwrap();
        let mut rx = queue.consumer().unwrap();

        for i in 0..4 {
            tx.try_enqueue(i * 10).unwrap();
        }
        assert_eq!(tx.try_enqueue(99), Err(QueueError::Full));

        for i in 0..4 {
            assert_eq!(rx.try_dequeue(), Ok(i * 10));
        }
        assert_eq!(rx.try_dequeue(), Err(QueueError::Empty));
    }

    #[test]
    fn test_inline_wraps_many_laps() {
        let queue: InlineQueue<u32, 2, Multi, Multi> = InlineQueue::default();
        for i in 0..100 {
            queue.enqueue(i).unwrap();
            assert_eq!(queue.dequeue(), Ok(i));
        }
        assert_eq!(queue.try_dequeue(), Err(QueueError::Empty));
    }

    #[test]
    fn test_inline_cursor_lines_are_padded() {
        use std::mem::{align_of, offset_of};
        type Q = InlineQueue<u8, 2, Multi, Multi>;
        assert!(align_of::<Q>() >= 64);
        assert!(offset_of!(Q, dequeue_index) - offset_of!(Q, enqueue_index) >= 64);
    }
}
