//! The sequence-cell protocol shared by every queue front-end.

use crate::arity::Arity;
use crate::invariants::{debug_assert_forward, debug_assert_owned_slot, debug_assert_ring_mask};
use crate::layout::Slot;
use crate::shim::atomic::Ordering;
use crate::shim::hint;
use crate::{Backoff, Metrics, QueueError};

// =============================================================================
// SLOT PROTOCOL
// =============================================================================
//
// Every cell carries a sequence number. For a cursor position `pos` landing on
// a cell (`pos & mask`):
//
//   sequence == pos       cell is free for the producer claiming `pos`
//   sequence == pos + 1   cell holds data for the consumer claiming `pos`
//
// **Producer (enqueue):**
// 1. Load `enqueue_index` Relaxed (the cell sequence is the real handoff)
// 2. Load `cell.sequence` Acquire; difference = sequence - pos (signed)
// 3. difference == 0: claim `pos` (plain store or CAS), write data, then
//    store `sequence = pos + 1` Release so the data is visible first
// 4. difference < 0: the cell still holds the previous lap → Full
// 5. difference > 0, or the CAS was lost → Contention
//
// **Consumer (dequeue):** the same with difference = sequence - (pos + 1),
// and the release store re-arms the cell for the *next* lap of producers:
// `sequence = pos + mask + 1`. A producer one lap behind reads a sequence
// lower than its position and reports Full instead of overwriting the cell.
//
// Positions grow without bound and compare with wrapping arithmetic, so the
// protocol is immune to ABA on the cursor values.
//
// =============================================================================

/// Borrowed view of a ring: both cursors, the cells and the mask.
///
/// Every queue front-end builds one of these per operation; it is the single
/// implementation of the slot protocol in the crate.
#[doc(hidden)]
pub struct Ring<'a, T, P: Arity, C: Arity> {
    enqueue_index: &'a P::Cursor,
    dequeue_index: &'a C::Cursor,
    cells: &'a [Slot<T>],
    mask: usize,
    metrics: Option<&'a Metrics>,
}

impl<'a, T: Copy, P: Arity, C: Arity> Ring<'a, T, P, C> {
    #[inline]
    pub(crate) fn new(
        enqueue_index: &'a P::Cursor,
        dequeue_index: &'a C::Cursor,
        cells: &'a [Slot<T>],
        mask: usize,
        metrics: Option<&'a Metrics>,
    ) -> Self {
        debug_assert_ring_mask!(mask, cells.len());
        Self {
            enqueue_index,
            dequeue_index,
            cells,
            mask,
            metrics,
        }
    }

    #[inline]
    fn cell(&self, pos: usize) -> &'a Slot<T> {
        // SAFETY: mask + 1 == cells.len(), so the masked index is in bounds.
        unsafe { self.cells.get_unchecked(pos & self.mask) }
    }

    /// One enqueue attempt.
    ///
    /// # Safety
    ///
    /// If `P` is [`Single`](crate::Single), the caller must be the only thread
    /// enqueueing on this ring.
    pub(crate) unsafe fn try_enqueue(&self, item: T) -> Result<(), QueueError> {
        let outcome = self.attempt_enqueue(item);
        if let Some(metrics) = self.metrics {
            metrics.record_enqueue(outcome);
        }
        outcome
    }

    #[inline]
    unsafe fn attempt_enqueue(&self, item: T) -> Result<(), QueueError> {
        let pos = P::load(self.enqueue_index);
        let cell = self.cell(pos);
        let sequence = cell.sequence.load(Ordering::Acquire);
        let difference = sequence.wrapping_sub(pos) as isize;

        if difference == 0 {
            if P::claim(self.enqueue_index, pos) {
                debug_assert_owned_slot!("producer", cell, pos, pos);

                // SAFETY: winning `pos` while the cell reads `pos` makes this
                // thread its only writer until the release store below.
                cell.data.with_mut(|data| {
                    (*data).write(item);
                });

                let published = pos.wrapping_add(1);
                debug_assert_forward!("producer", sequence, published);
                cell.sequence.store(published, Ordering::Release);
                return Ok(());
            }
            // Another producer took `pos` first.
            return Err(QueueError::Contention);
        }

        if difference < 0 {
            Err(QueueError::Full)
        } else {
            Err(QueueError::Contention)
        }
    }

    /// One dequeue attempt.
    ///
    /// # Safety
    ///
    /// If `C` is [`Single`](crate::Single), the caller must be the only thread
    /// dequeueing from this ring.
    pub(crate) unsafe fn try_dequeue(&self) -> Result<T, QueueError> {
        let outcome = self.attempt_dequeue();
        if let Some(metrics) = self.metrics {
            metrics.record_dequeue(outcome.map(|_| ()));
        }
        outcome
    }

    #[inline]
    unsafe fn attempt_dequeue(&self) -> Result<T, QueueError> {
        let pos = C::load(self.dequeue_index);
        let cell = self.cell(pos);
        let sequence = cell.sequence.load(Ordering::Acquire);
        let difference = sequence.wrapping_sub(pos.wrapping_add(1)) as isize;

        if difference == 0 {
            if C::claim(self.dequeue_index, pos) {
                debug_assert_owned_slot!("consumer", cell, sequence, pos);

                // SAFETY: the Acquire load above pairs with the producer's
                // Release publish of `pos + 1`, so the record is initialized
                // and no producer touches it until the cell is re-armed.
                let item = cell.data.with(|data| (*data).assume_init_read());

                let rearmed = pos.wrapping_add(self.mask).wrapping_add(1);
                debug_assert_forward!("consumer", sequence, rearmed);
                cell.sequence.store(rearmed, Ordering::Release);
                return Ok(item);
            }
            return Err(QueueError::Contention);
        }

        if difference < 0 {
            Err(QueueError::Empty)
        } else {
            Err(QueueError::Contention)
        }
    }

    /// Enqueue, retrying for as long as the attempt reports contention.
    ///
    /// # Safety
    ///
    /// Same contract as [`try_enqueue`](Self::try_enqueue).
    pub(crate) unsafe fn enqueue(&self, item: T, backoff: bool) -> Result<(), QueueError> {
        retry_on_contention(backoff, || self.try_enqueue(item))
    }

    /// Dequeue, retrying for as long as the attempt reports contention.
    ///
    /// # Safety
    ///
    /// Same contract as [`try_dequeue`](Self::try_dequeue).
    pub(crate) unsafe fn dequeue(&self, backoff: bool) -> Result<T, QueueError> {
        retry_on_contention(backoff, || self.try_dequeue())
    }
}

/// Repeats `attempt` while it reports [`QueueError::Contention`].
///
/// `Full` and `Empty` are returned on the first sighting: they are steady
/// states and spinning on them would hide back-pressure from the caller.
/// Without `backoff` the retries are a tight spin with a PAUSE hint; with it
/// they are paced by [`Backoff::snooze`], which never gives up.
#[inline]
fn retry_on_contention<R>(
    backoff: bool,
    mut attempt: impl FnMut() -> Result<R, QueueError>,
) -> Result<R, QueueError> {
    let mut pacing = Backoff::new();
    loop {
        match attempt() {
            Err(QueueError::Contention) => {
                if backoff {
                    pacing.snooze();
                } else {
                    hint::spin_loop();
                }
            }
            outcome => return outcome,
        }
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::arity::{Multi, Single};
    use std::sync::atomic::Ordering as StdOrdering;

    fn cells<T>(n: usize) -> Vec<Slot<T>> {
        (0..n).map(Slot::new).collect()
    }

    #[test]
    fn test_enqueue_publishes_next_sequence() {
        let enq = Single::cursor(0);
        let deq = Single::cursor(0);
        let slots = cells::<u32>(4);
        let ring = Ring::<u32, Single, Single>::new(&enq, &deq, &slots, 3, None);

        unsafe { ring.try_enqueue(10).unwrap() };
        assert_eq!(slots[0].sequence.load(StdOrdering::Relaxed), 1);
        assert_eq!(Single::load(&enq), 1);

        assert_eq!(unsafe { ring.try_dequeue() }, Ok(10));
        // Re-armed for lap 1 producers: pos + capacity.
        assert_eq!(slots[0].sequence.load(StdOrdering::Relaxed), 4);
        assert_eq!(Single::load(&deq), 1);
    }

    #[test]
    fn test_full_and_empty_are_not_retried() {
        let enq = Multi::cursor(0);
        let deq = Multi::cursor(0);
        let slots = cells::<u8>(2);
        let ring = Ring::<u8, Multi, Multi>::new(&enq, &deq, &slots, 1, None);

        assert_eq!(unsafe { ring.dequeue(false) }, Err(QueueError::Empty));
        unsafe {
            ring.enqueue(1, false).unwrap();
            ring.enqueue(2, true).unwrap();
        }
        assert_eq!(unsafe { ring.enqueue(3, false) }, Err(QueueError::Full));
        assert_eq!(unsafe { ring.enqueue(3, true) }, Err(QueueError::Full));
    }

    #[test]
    fn test_stale_producer_view_reports_contention() {
        let enq = Multi::cursor(0);
        let deq = Multi::cursor(0);
        let slots = cells::<u64>(4);
        // Simulate a peer that already published position 0 while this
        // thread's cursor read is stale: sequence is ahead of `pos`.
        slots[0].sequence.store(1, StdOrdering::Relaxed);
        let ring = Ring::<u64, Multi, Multi>::new(&enq, &deq, &slots, 3, None);

        assert_eq!(unsafe { ring.try_enqueue(9) }, Err(QueueError::Contention));
        assert_eq!(Multi::load(&enq), 0);
    }

    #[test]
    fn test_retry_loops_only_on_contention() {
        let mut calls = 0;
        let outcome = retry_on_contention(false, || {
            calls += 1;
            if calls < 5 {
                Err(QueueError::Contention)
            } else {
                Ok(calls)
            }
        });
        assert_eq!(outcome, Ok(5));

        let mut calls = 0;
        let outcome: Result<(), _> = retry_on_contention(true, || {
            calls += 1;
            Err(QueueError::Full)
        });
        assert_eq!(outcome, Err(QueueError::Full));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_metrics_record_each_attempt() {
        let enq = Single::cursor(0);
        let deq = Single::cursor(0);
        let slots = cells::<u16>(2);
        let metrics = Metrics::new();
        let ring = Ring::<u16, Single, Single>::new(&enq, &deq, &slots, 1, Some(&metrics));

        unsafe {
            let _ = ring.try_dequeue();
            ring.try_enqueue(1).unwrap();
            ring.try_enqueue(2).unwrap();
            let _ = ring.try_enqueue(3);
            ring.try_dequeue().unwrap();
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.enqueued, 2);
        assert_eq!(snap.full, 1);
        assert_eq!(snap.dequeued, 1);
        assert_eq!(snap.empty, 1);
    }
}
