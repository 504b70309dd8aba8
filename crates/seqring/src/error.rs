use thiserror::Error;

/// Errors raised while sizing or initializing a queue.
///
/// These are fatal to the call that returned them and are never retried
/// internally. They are disjoint from [`QueueError`], which only the
/// enqueue/dequeue operations produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InitError {
    /// Capacity is below the configured floor (never less than 2).
    #[error("capacity {capacity} is below the minimum of {min}")]
    TooSmall {
        /// The requested capacity.
        capacity: usize,
        /// The effective minimum capacity.
        min: usize,
    },
    /// Capacity exceeds the configured ceiling, or the layout would overflow.
    #[error("capacity {capacity} exceeds the maximum of {max}")]
    TooBig {
        /// The requested capacity.
        capacity: usize,
        /// The configured maximum capacity.
        max: usize,
    },
    /// Capacity is not a power of two.
    #[error("capacity {capacity} is not a power of two")]
    NotPowerOfTwo {
        /// The requested capacity.
        capacity: usize,
    },
    /// The buffer does not start on the required boundary.
    #[error("buffer is not aligned to {align} bytes")]
    NotAligned {
        /// The alignment the buffer must satisfy.
        align: usize,
    },
    /// The buffer is shorter than the computed layout.
    #[error("buffer holds {actual} bytes but {required} are needed")]
    BytesTooSmall {
        /// Bytes required by the layout.
        required: usize,
        /// Bytes the caller supplied.
        actual: usize,
    },
}

/// Outcome of a single enqueue or dequeue attempt that did not transfer an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum QueueError {
    /// Every cell still holds an unconsumed item from the previous lap.
    #[error("queue is full")]
    Full,
    /// No published item is waiting at the consumer cursor.
    #[error("queue is empty")]
    Empty,
    /// A concurrent peer won the race for the same slot.
    #[error("lost a race for the slot to a concurrent peer")]
    Contention,
}

impl QueueError {
    /// Returns true for outcomes that resolve on their own if retried.
    ///
    /// Only [`QueueError::Contention`] is transient; `Full` and `Empty` are
    /// steady states the caller has to react to.
    #[inline]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Contention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_contention_is_transient() {
        assert!(QueueError::Contention.is_transient());
        assert!(!QueueError::Full.is_transient());
        assert!(!QueueError::Empty.is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = InitError::BytesTooSmall {
            required: 512,
            actual: 100,
        };
        assert_eq!(err.to_string(), "buffer holds 100 bytes but 512 are needed");
        assert_eq!(
            InitError::NotPowerOfTwo { capacity: 13 }.to_string(),
            "capacity 13 is not a power of two"
        );
        assert_eq!(QueueError::Full.to_string(), "queue is full");
    }
}
