use crate::QueueError;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of a queue's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Records accepted by an enqueue attempt.
    pub enqueued: u64,
    /// Records handed out by a dequeue attempt.
    pub dequeued: u64,
    /// Enqueue attempts refused with `Full`.
    pub full: u64,
    /// Dequeue attempts refused with `Empty`.
    pub empty: u64,
    /// Enqueue attempts that lost a claim to another producer.
    pub enqueue_contention: u64,
    /// Dequeue attempts that lost a claim to another consumer.
    pub dequeue_contention: u64,
}

#[derive(Debug, Default)]
struct SideCounters {
    ok: AtomicU64,
    refused: AtomicU64,
    contention: AtomicU64,
}

impl SideCounters {
    #[inline]
    fn record(&self, outcome: Result<(), QueueError>) {
        let counter = match outcome {
            Ok(()) => &self.ok,
            Err(QueueError::Contention) => &self.contention,
            Err(QueueError::Full | QueueError::Empty) => &self.refused,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Thread-safe queue counters.
///
/// Producer and consumer counters sit on separate cache lines so enabling
/// metrics does not make the two sides share a line they otherwise would not.
/// Counters are relaxed; a snapshot taken while the queue is live is not a
/// consistent cut.
#[derive(Debug, Default)]
pub struct Metrics {
    producer: CachePadded<SideCounters>,
    consumer: CachePadded<SideCounters>,
}

impl Metrics {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_enqueue(&self, outcome: Result<(), QueueError>) {
        self.producer.record(outcome);
    }

    #[inline]
    pub(crate) fn record_dequeue(&self, outcome: Result<(), QueueError>) {
        self.consumer.record(outcome);
    }

    /// Copies every counter with relaxed loads.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.producer.ok.load(Ordering::Relaxed),
            dequeued: self.consumer.ok.load(Ordering::Relaxed),
            full: self.producer.refused.load(Ordering::Relaxed),
            empty: self.consumer.refused.load(Ordering::Relaxed),
            enqueue_contention: self.producer.contention.load(Ordering::Relaxed),
            dequeue_contention: self.consumer.contention.load(Ordering::Relaxed),
        }
    }
}
