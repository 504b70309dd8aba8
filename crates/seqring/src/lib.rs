//! seqring - Bounded Lock-Free Queues on Per-Cell Sequence Numbers
//!
//! A fixed array of cells, each tagged with a sequence number, shared by any
//! number of producers and consumers without locks. A cell's sequence relative
//! to a cursor position says whether the cell is free for a producer or holds
//! data for a consumer, which rules out ABA on the cursors and gives
//! well-defined `Full`, `Empty` and `Contention` outcomes.
//!
//! Based on Dmitry Vyukov's
//! [bounded MPMC queue](http://www.1024cores.net/home/lock-free-algorithms/queues/bounded-mpmc-queue).
//!
//! # Key Features
//!
//! - One protocol, four arities: [`Spsc`], [`Mpsc`], [`Spmc`], [`Mpmc`] are
//!   the same generic [`Queue`] with [`Single`]/[`Multi`] per side
//! - Single-arity sides drop the CAS for a plain cursor increment
//! - Two-phase construction over caller-owned memory; the queue never allocates
//! - Cache-line separated producer, consumer and metadata lines
//! - [`InlineQueue`] for compile-time capacities with no external buffer
//!
//! # Example
//!
//! ```
//! use seqring_rs::{AlignedBuffer, Mpmc, QueueError};
//!
//! // Phase 1: how much memory does a 1024-cell queue of u64 need?
//! let bytes = Mpmc::<u64>::size_query(1024).unwrap();
//!
//! // The caller owns allocation policy.
//! let buffer = AlignedBuffer::zeroed(bytes).unwrap();
//!
//! // Phase 2: lay the queue out in that memory.
//! let queue = Mpmc::<u64>::initialize(1024, buffer).unwrap();
//!
//! std::thread::scope(|s| {
//!     for id in 0..4u64 {
//!         let queue = &queue;
//!         s.spawn(move || queue.enqueue(id).unwrap());
//!     }
//! });
//!
//! let mut sum = 0;
//! while let Ok(item) = queue.dequeue() {
//!     sum += item;
//! }
//! assert_eq!(sum, 0 + 1 + 2 + 3);
//! assert_eq!(queue.try_dequeue(), Err(QueueError::Empty));
//! ```

mod arity;
mod backoff;
mod config;
mod error;
mod handle;
mod inline_queue;
mod invariants;
mod layout;
mod metrics;
mod protocol;
mod queue;
mod shim;
mod storage;
mod trace;

pub use arity::{Arity, Multi, Single};
pub use backoff::Backoff;
pub use config::{
    Config, CONTENDED_CONFIG, DEFAULT_MAX_CAPACITY, LOW_LATENCY_CONFIG, MIN_CAPACITY,
};
pub use error::{InitError, QueueError};
pub use handle::{Consumer, Producer, RawQueue};
pub use inline_queue::InlineQueue;
pub use layout::CACHE_LINE_BYTES;
pub use metrics::{Metrics, MetricsSnapshot};
pub use queue::{Mpmc, Mpsc, Queue, Spmc, Spsc};
pub use storage::{AlignedBuffer, Storage, QUEUE_ALIGN};
pub use trace::init_tracing;
