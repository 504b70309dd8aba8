//! Producer and consumer handles.
//!
//! A `Single` side has a plain, non-atomic cursor, so at most one thread may
//! drive it. Handles enforce that: a single-side handle is claimed through a
//! flag on the queue (released on drop) and its operations take `&mut self`.
//! `Multi` handles are unrestricted and `Clone`.

use crate::arity::{Arity, Multi};
use crate::protocol::Ring;
use crate::trace::{debug, trace};
use crate::{Config, QueueError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Claim flags for the two sides of a queue.
#[doc(hidden)]
#[derive(Debug, Default)]
pub struct SideClaims {
    producer: AtomicBool,
    consumer: AtomicBool,
}

impl SideClaims {
    /// Returns true if this call took the flag.
    fn take(flag: &AtomicBool) -> bool {
        !flag.swap(true, Ordering::Acquire)
    }

    fn release(flag: &AtomicBool) {
        flag.store(false, Ordering::Release);
    }
}

/// A queue the handles can drive: [`Queue`](crate::Queue) or
/// [`InlineQueue`](crate::InlineQueue).
///
/// This trait is sealed.
pub trait RawQueue: sealed::Sealed + Sync {
    /// Record type.
    type Item: Copy;
    /// Producer arity.
    type Producers: Arity;
    /// Consumer arity.
    type Consumers: Arity;

    #[doc(hidden)]
    fn ring(&self) -> Ring<'_, Self::Item, Self::Producers, Self::Consumers>;

    #[doc(hidden)]
    fn claims(&self) -> &SideClaims;

    /// Number of cells.
    fn capacity(&self) -> usize;

    /// Policy the queue was built with.
    fn config(&self) -> &Config;
}

/// Enqueue side of a queue.
pub struct Producer<'q, Q: RawQueue> {
    queue: &'q Q,
}

impl<'q, Q: RawQueue> Producer<'q, Q> {
    pub(crate) fn acquire(queue: &'q Q) -> Option<Self> {
        if !Q::Producers::MULTI && !SideClaims::take(&queue.claims().producer) {
            debug!("single producer handle already held");
            return None;
        }
        Some(Self { queue })
    }

    /// One non-blocking enqueue attempt.
    #[inline]
    pub fn try_enqueue(&mut self, item: Q::Item) -> Result<(), QueueError> {
        // SAFETY: a single-producer handle is unique (claim flag) and
        // borrowed mutably here, so this is the only thread on the cursor.
        unsafe { self.queue.ring().try_enqueue(item) }
    }

    /// Enqueue, retrying while the attempt reports contention.
    ///
    /// Returns `Err(QueueError::Full)` as soon as the queue is full.
    #[inline]
    pub fn enqueue(&mut self, item: Q::Item) -> Result<(), QueueError> {
        let backoff = self.queue.config().backoff;
        // SAFETY: as in `try_enqueue`.
        unsafe { self.queue.ring().enqueue(item, backoff) }
    }

    /// The queue this handle feeds.
    pub fn queue(&self) -> &'q Q {
        self.queue
    }
}

impl<Q: RawQueue> Drop for Producer<'_, Q> {
    fn drop(&mut self) {
        if !Q::Producers::MULTI {
            SideClaims::release(&self.queue.claims().producer);
            trace!("single producer handle released");
        }
    }
}

impl<Q: RawQueue<Producers = Multi>> Clone for Producer<'_, Q> {
    fn clone(&self) -> Self {
        Self { queue: self.queue }
    }
}

impl<Q: RawQueue> fmt::Debug for Producer<'_, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("arity", &Q::Producers::LABEL)
            .field("capacity", &self.queue.capacity())
            .finish()
    }
}

/// Dequeue side of a queue.
pub struct Consumer<'q, Q: RawQueue> {
    queue: &'q Q,
}

impl<'q, Q: RawQueue> Consumer<'q, Q> {
    pub(crate) fn acquire(queue: &'q Q) -> Option<Self> {
        if !Q::Consumers::MULTI && !SideClaims::take(&queue.claims().consumer) {
            debug!("single consumer handle already held");
            return None;
        }
        Some(Self { queue })
    }

    /// One non-blocking dequeue attempt.
    #[inline]
    pub fn try_dequeue(&mut self) -> Result<Q::Item, QueueError> {
        // SAFETY: a single-consumer handle is unique and borrowed mutably.
        unsafe { self.queue.ring().try_dequeue() }
    }

    /// Dequeue, retrying while the attempt reports contention.
    ///
    /// Returns `Err(QueueError::Empty)` as soon as the queue is empty.
    #[inline]
    pub fn dequeue(&mut self) -> Result<Q::Item, QueueError> {
        let backoff = self.queue.config().backoff;
        // SAFETY: as in `try_dequeue`.
        unsafe { self.queue.ring().dequeue(backoff) }
    }

    /// The queue this handle drains.
    pub fn queue(&self) -> &'q Q {
        self.queue
    }
}

impl<Q: RawQueue> Drop for Consumer<'_, Q> {
    fn drop(&mut self) {
        if !Q::Consumers::MULTI {
            SideClaims::release(&self.queue.claims().consumer);
            trace!("single consumer handle released");
        }
    }
}

impl<Q: RawQueue<Consumers = Multi>> Clone for Consumer<'_, Q> {
    fn clone(&self) -> Self {
        Self { queue: self.queue }
    }
}

impl<Q: RawQueue> fmt::Debug for Consumer<'_, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("arity", &Q::Consumers::LABEL)
            .field("capacity", &self.queue.capacity())
            .finish()
    }
}
