use crate::arity::{Arity, Multi, Single};
use crate::handle::{sealed, Consumer, Producer, RawQueue, SideClaims};
use crate::layout::{Header, QueueLayout, Slot};
use crate::protocol::Ring;
use crate::storage::{AlignedBuffer, Storage};
use crate::trace::{debug, warn};
use crate::{Config, InitError, Metrics, MetricsSnapshot, QueueError};
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};
use std::slice;

/// Bounded lock-free queue laid out in caller-owned memory.
///
/// `P` and `C` select the producer and consumer arity ([`Single`] or
/// [`Multi`]); the four combinations are available as [`Spsc`], [`Mpsc`],
/// [`Spmc`] and [`Mpmc`]. `S` is the backing [`Storage`].
///
/// Construction is two-phase: [`size_query`](Self::size_query) reports how
/// many bytes a capacity needs, the caller obtains that much memory, and
/// [`initialize`](Self::initialize) lays the queue out in it. The queue never
/// allocates; dropping it (or [`into_storage`](Self::into_storage)) just
/// releases the storage.
///
/// ```
/// use seqring_rs::{AlignedBuffer, Spsc, QueueError};
///
/// let bytes = Spsc::<u32>::size_query(4)?;
/// let queue = Spsc::<u32>::initialize(4, AlignedBuffer::zeroed(bytes).unwrap())?;
///
/// let mut tx = queue.producer().unwrap();
/// let mut rx = queue.consumer().unwrap();
/// for i in 0..4 {
///     tx.enqueue(i).unwrap();
/// }
/// assert_eq!(tx.try_enqueue(4), Err(QueueError::Full));
/// assert_eq!(rx.dequeue(), Ok(0));
/// # Ok::<(), seqring_rs::InitError>(())
/// ```
pub struct Queue<T, P: Arity, C: Arity, S: Storage = AlignedBuffer> {
    base: NonNull<u8>,
    cells: NonNull<Slot<T>>,
    capacity: usize,
    config: Config,
    metrics: Metrics,
    claims: SideClaims,
    storage: ManuallyDrop<S>,
    _marker: PhantomData<(T, P, C)>,
}

/// Single producer, single consumer.
pub type Spsc<T, S = AlignedBuffer> = Queue<T, Single, Single, S>;
/// Multiple producers, single consumer.
pub type Mpsc<T, S = AlignedBuffer> = Queue<T, Multi, Single, S>;
/// Single producer, multiple consumers.
pub type Spmc<T, S = AlignedBuffer> = Queue<T, Single, Multi, S>;
/// Multiple producers, multiple consumers.
pub type Mpmc<T, S = AlignedBuffer> = Queue<T, Multi, Multi, S>;

// Safety: records move between threads through the cells, so T must be Send.
// All shared state is reached through atomics or through slots owned by the
// protocol; single-arity cursors are only driven through unique handles.
unsafe impl<T: Send, P: Arity, C: Arity, S: Storage + Send> Send for Queue<T, P, C, S> {}
unsafe impl<T: Send, P: Arity, C: Arity, S: Storage + Send> Sync for Queue<T, P, C, S> {}

impl<T: Copy, P: Arity, C: Arity, S: Storage> Queue<T, P, C, S> {
    /// Bytes of storage a queue of `capacity` cells needs, under the default
    /// [`Config`].
    ///
    /// Deterministic: the same capacity always yields the same count, and it
    /// is exactly what [`initialize`](Self::initialize) will require.
    pub fn size_query(capacity: usize) -> Result<usize, InitError> {
        Self::size_query_with(&Config::default(), capacity)
    }

    /// Bytes of storage a queue of `capacity` cells needs under `config`.
    pub fn size_query_with(config: &Config, capacity: usize) -> Result<usize, InitError> {
        if let Err(err) = config.validate_capacity(capacity) {
            debug!(capacity, %err, "rejected queue capacity");
            return Err(err);
        }
        QueueLayout::<T, P, C>::required_bytes(capacity).ok_or(InitError::TooBig {
            capacity,
            max: config.max_capacity,
        })
    }

    /// Alignment the storage must satisfy: 16 bytes, or more for
    /// over-aligned records.
    pub const fn required_align() -> usize {
        QueueLayout::<T, P, C>::align()
    }

    /// Lays out a queue of `capacity` cells in `storage` under the default
    /// [`Config`].
    pub fn initialize(capacity: usize, storage: S) -> Result<Self, InitError> {
        Self::initialize_with(Config::default(), capacity, storage)
    }

    /// Lays out a queue of `capacity` cells in `storage`.
    ///
    /// Checks, in order: the capacity policy, that `storage` holds at least
    /// [`size_query_with`](Self::size_query_with) bytes, and that it starts on
    /// a [`required_align`](Self::required_align) boundary. On success the
    /// region is zeroed, every cell `i` carries sequence `i` and both cursors
    /// are 0.
    pub fn initialize_with(config: Config, capacity: usize, mut storage: S) -> Result<Self, InitError> {
        let required = Self::size_query_with(&config, capacity)?;

        let actual = storage.len();
        if actual < required {
            warn!(capacity, required, actual, "queue storage too small");
            return Err(InitError::BytesTooSmall { required, actual });
        }

        let align = Self::required_align();
        let raw = storage.as_mut_ptr();
        let base = match NonNull::new(raw) {
            Some(base) if (raw as usize) % align == 0 => base,
            _ => {
                warn!(capacity, align, "queue storage misaligned");
                return Err(InitError::NotAligned { align });
            }
        };

        // SAFETY: base is aligned and valid for `required` bytes, and
        // capacity passed validation (power of two).
        unsafe { QueueLayout::<T, P, C>::init_in_place(base.as_ptr(), capacity, required) };
        // SAFETY: cells_offset + capacity slots lies within `required`.
        let cells = unsafe {
            NonNull::new_unchecked(
                base.as_ptr()
                    .add(QueueLayout::<T, P, C>::cells_offset())
                    .cast::<Slot<T>>(),
            )
        };

        debug!(
            capacity,
            bytes = required,
            producers = P::LABEL,
            consumers = C::LABEL,
            "queue initialized"
        );

        Ok(Self {
            base,
            cells,
            capacity,
            config,
            metrics: Metrics::new(),
            claims: SideClaims::default(),
            storage: ManuallyDrop::new(storage),
            _marker: PhantomData,
        })
    }

    /// Number of cells.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Policy this queue was built with.
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

    /// Borrowed protocol view over the initialized region.
    #[inline]
    fn view(&self) -> Ring<'_, T, P, C> {
        // SAFETY: base and cells point into the region initialized by
        // `initialize_with`, which lives as long as `self`.
        let header = unsafe { &*self.base.as_ptr().cast::<Header<P, C>>() };
        let cells = unsafe { slice::from_raw_parts(self.cells.as_ptr(), self.capacity) };
        Ring::new(
            &header.enqueue_index.value,
            &header.dequeue_index.value,
            cells,
            header.cell_mask.value,
            self.config.enable_metrics.then_some(&self.metrics),
        )
    }

    /// Tears the queue down and hands the storage back.
    ///
    /// Records still in the queue are discarded.
    pub fn into_storage(self) -> S {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: the region was initialized in `initialize_with`; `this` is
        // never used again and its remaining fields need no drop.
        unsafe {
            QueueLayout::<T, P, C>::drop_in_place(this.base.as_ptr(), this.capacity);
            ManuallyDrop::take(&mut this.storage)
        }
    }
}

impl<T: Copy + Send, P: Arity, C: Arity, S: Storage + Send> Queue<T, P, C, S> {
    /// Takes a producer handle.
    ///
    /// Always succeeds for a multi-producer queue. For a single-producer
    /// queue it returns `None` while another handle is alive.
    pub fn producer(&self) -> Option<Producer<'_, Self>> {
        Producer::acquire(self)
    }

    /// Takes a consumer handle. Same rules as [`producer`](Self::producer).
    pub fn consumer(&self) -> Option<Consumer<'_, Self>> {
        Consumer::acquire(self)
    }
}

impl<T: Copy, C: Arity, S: Storage> Queue<T, Multi, C, S> {
    /// One non-blocking enqueue attempt from any thread.
    #[inline]
    pub fn try_enqueue(&self, item: T) -> Result<(), QueueError> {
        // SAFETY: the producer side is multi-threaded; claims use CAS.
        unsafe { self.view().try_enqueue(item) }
    }

    /// Enqueue from any thread, retrying while the attempt reports contention.
    #[inline]
    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        // SAFETY: as above.
        unsafe { self.view().enqueue(item, self.config.backoff) }
    }
}

impl<T: Copy, P: Arity, S: Storage> Queue<T, P, Multi, S> {
    /// One non-blocking dequeue attempt from any thread.
    #[inline]
    pub fn try_dequeue(&self) -> Result<T, QueueError> {
        // SAFETY: the consumer side is multi-threaded; claims use CAS.
        unsafe { self.view().try_dequeue() }
    }

    /// Dequeue from any thread, retrying while the attempt reports contention.
    #[inline]
    pub fn dequeue(&self) -> Result<T, QueueError> {
        // SAFETY: as above.
        unsafe { self.view().dequeue(self.config.backoff) }
    }
}

impl<T, P: Arity, C: Arity, S: Storage> sealed::Sealed for Queue<T, P, C, S> {}

impl<T: Copy + Send, P: Arity, C: Arity, S: Storage + Send> RawQueue for Queue<T, P, C, S> {
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
        self.capacity
    }

    #[inline]
    fn config(&self) -> &Config {
        &self.config
    }
}

impl<T, P: Arity, C: Arity, S: Storage> Drop for Queue<T, P, C, S> {
    fn drop(&mut self) {
        // SAFETY: initialized in `initialize_with` and not used after this.
        unsafe {
            QueueLayout::<T, P, C>::drop_in_place(self.base.as_ptr(), self.capacity);
            ManuallyDrop::drop(&mut self.storage);
        }
    }
}

impl<T, P: Arity, C: Arity, S: Storage> fmt::Debug for Queue<T, P, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("producers", &P::LABEL)
            .field("consumers", &C::LABEL)
            .field("capacity", &self.capacity)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: Copy, P: Arity, C: Arity> Queue<T, P, C, AlignedBuffer> {
    /// Runs both construction phases with a fresh [`AlignedBuffer`].
    pub fn allocate(capacity: usize) -> Result<Self, InitError> {
        Self::allocate_with(Config::default(), capacity)
    }

    /// Runs both construction phases with a fresh [`AlignedBuffer`] under
    /// `config`.
    pub fn allocate_with(config: Config, capacity: usize) -> Result<Self, InitError> {
        let bytes = Self::size_query_with(&config, capacity)?;
        let buffer = AlignedBuffer::zeroed_with_align(bytes, Self::required_align()).map_err(|_| {
            InitError::TooBig {
                capacity,
                max: config.max_capacity,
            }
        })?;
        Self::initialize_with(config, capacity, buffer)
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn test_queue_basic_round_trip() {
        let queue = Mpmc::<u64>::allocate(8).unwrap();
        assert_eq!(queue.capacity(), 8);

        queue.enqueue(100).unwrap();
        queue.enqueue(200).unwrap();

        assert_eq!(queue.dequeue(), Ok(100));
        assert_eq!(queue.dequeue(), Ok(200));
        assert_eq!(queue.dequeue(), Err(QueueError::Empty));
    }

    #[test]
    fn test_queue_full() {
        let queue = Mpsc::<u32>::allocate(16).unwrap();
        for i in 0..16 {
            queue.enqueue(i).unwrap();
        }
        assert_eq!(queue.try_enqueue(99), Err(QueueError::Full));
        assert_eq!(queue.enqueue(99), Err(QueueError::Full));

        let mut rx = queue.consumer().unwrap();
        for i in 0..16 {
            assert_eq!(rx.try_dequeue(), Ok(i));
        }
    }

    #[test]
    fn test_into_storage_returns_buffer() {
        let bytes = Spmc::<u8>::size_query(4).unwrap();
        let queue = Spmc::<u8>::initialize(4, AlignedBuffer::zeroed(bytes).unwrap()).unwrap();
        queue.producer().unwrap().enqueue(1).unwrap();
        let buffer = queue.into_storage();
        assert_eq!(Storage::len(&buffer), bytes);
    }

    #[test]
    fn test_metrics_disabled_by_default() {
        let queue = Mpmc::<u8>::allocate(2).unwrap();
        queue.enqueue(1).unwrap();
        assert_eq!(queue.metrics(), MetricsSnapshot::default());

        let config = Config {
            enable_metrics: true,
            ..Config::default()
        };
        let queue = Mpmc::<u8>::allocate_with(config, 2).unwrap();
        queue.enqueue(1).unwrap();
        queue.dequeue().unwrap();
        let _ = queue.dequeue();
        let snap = queue.metrics();
        assert_eq!((snap.enqueued, snap.dequeued, snap.empty), (1, 1, 1));
    }

    #[test]
    fn test_debug_output_names_arities() {
        let queue = Mpsc::<u8>::allocate(2).unwrap();
        let text = format!("{:?}", queue);
        assert!(text.contains("producers: \"multi\""));
        assert!(text.contains("consumers: \"single\""));
    }
}
