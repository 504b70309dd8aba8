//! Property-based tests for capacity validation and the single-threaded
//! behaviour of every queue arity.
//!
//! Single-threaded runs are checked against a `VecDeque` bounded to the same
//! capacity: every enqueue/dequeue outcome must agree with the model.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use seqring_rs::{
    AlignedBuffer, Arity, InitError, InlineQueue, Mpmc, Multi, Queue, QueueError, Single,
    DEFAULT_MAX_CAPACITY, MIN_CAPACITY,
};
use std::collections::VecDeque;

fn capacity_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![
        0usize..4096,
        (0u32..usize::BITS).prop_map(|e| 1usize << e),
        any::<usize>(),
    ]
}

fn expected_validation(capacity: usize) -> Result<(), InitError> {
    if capacity < MIN_CAPACITY {
        Err(InitError::TooSmall {
            capacity,
            min: MIN_CAPACITY,
        })
    } else if capacity > DEFAULT_MAX_CAPACITY {
        Err(InitError::TooBig {
            capacity,
            max: DEFAULT_MAX_CAPACITY,
        })
    } else if !capacity.is_power_of_two() {
        Err(InitError::NotPowerOfTwo { capacity })
    } else {
        Ok(())
    }
}

fn check_validation<P: Arity, C: Arity>(capacity: usize) -> Result<(), TestCaseError> {
    let got = Queue::<u64, P, C>::size_query(capacity).map(|_| ());
    prop_assert_eq!(got, expected_validation(capacity));
    Ok(())
}

/// Repeats a single-threaded attempt past spurious `compare_exchange_weak`
/// failures, which a multi side reports as `Contention`.
fn settle<R>(mut attempt: impl FnMut() -> Result<R, QueueError>) -> Result<R, QueueError> {
    loop {
        match attempt() {
            Err(QueueError::Contention) => continue,
            outcome => return outcome,
        }
    }
}

/// Replays `ops` (Some = enqueue, None = dequeue) on a fresh queue and on the
/// model, comparing each outcome.
fn check_against_model<P: Arity, C: Arity>(
    capacity: usize,
    ops: &[Option<u32>],
) -> Result<(), TestCaseError> {
    let queue = Queue::<u32, P, C>::allocate(capacity).unwrap();
    let mut tx = queue.producer().unwrap();
    let mut rx = queue.consumer().unwrap();
    let mut model = VecDeque::with_capacity(capacity);

    for op in ops {
        match *op {
            Some(item) => {
                let got = settle(|| tx.try_enqueue(item));
                if model.len() == capacity {
                    prop_assert_eq!(got, Err(QueueError::Full));
                } else {
                    prop_assert_eq!(got, Ok(()));
                    model.push_back(item);
                }
            }
            None => {
                let got = settle(|| rx.try_dequeue());
                match model.pop_front() {
                    Some(expected) => prop_assert_eq!(got, Ok(expected)),
                    None => prop_assert_eq!(got, Err(QueueError::Empty)),
                }
            }
        }
    }

    while let Some(expected) = model.pop_front() {
        prop_assert_eq!(rx.dequeue(), Ok(expected));
    }
    prop_assert_eq!(rx.dequeue(), Err(QueueError::Empty));
    Ok(())
}

fn ops_strategy() -> impl Strategy<Value = Vec<Option<u32>>> {
    prop::collection::vec(prop::option::weighted(0.55, any::<u32>()), 0..300)
}

proptest! {
    /// Validation reports the first failing check in the order
    /// too small, too big, not a power of two.
    #[test]
    fn prop_capacity_validation(capacity in capacity_strategy()) {
        check_validation::<Single, Single>(capacity)?;
        check_validation::<Multi, Single>(capacity)?;
        check_validation::<Single, Multi>(capacity)?;
        check_validation::<Multi, Multi>(capacity)?;
    }

    /// The reported size is stable, grows with capacity, and is exactly
    /// what initialization needs.
    #[test]
    fn prop_size_query_is_exact(exp in 1u32..14) {
        let capacity = 1usize << exp;
        let bytes = Mpmc::<u64>::size_query(capacity).unwrap();
        prop_assert_eq!(Mpmc::<u64>::size_query(capacity).unwrap(), bytes);
        prop_assert!(Mpmc::<u64>::size_query(capacity * 2).unwrap() > bytes);

        prop_assert!(Mpmc::<u64>::initialize(capacity, AlignedBuffer::zeroed(bytes).unwrap()).is_ok());
        let short = Mpmc::<u64>::initialize(capacity, AlignedBuffer::zeroed(bytes - 1).unwrap());
        prop_assert_eq!(
            short.unwrap_err(),
            InitError::BytesTooSmall { required: bytes, actual: bytes - 1 }
        );
    }

    #[test]
    fn prop_spsc_matches_model(exp in 1u32..5, ops in ops_strategy()) {
        check_against_model::<Single, Single>(1 << exp, &ops)?;
    }

    #[test]
    fn prop_mpsc_matches_model(exp in 1u32..5, ops in ops_strategy()) {
        check_against_model::<Multi, Single>(1 << exp, &ops)?;
    }

    #[test]
    fn prop_spmc_matches_model(exp in 1u32..5, ops in ops_strategy()) {
        check_against_model::<Single, Multi>(1 << exp, &ops)?;
    }

    #[test]
    fn prop_mpmc_matches_model(exp in 1u32..5, ops in ops_strategy()) {
        check_against_model::<Multi, Multi>(1 << exp, &ops)?;
    }

    /// The const-capacity queue follows the same model.
    #[test]
    fn prop_inline_queue_matches_model(ops in ops_strategy()) {
        let queue = InlineQueue::<u32, 4, Multi, Multi>::new();
        let mut model = VecDeque::new();
        for op in ops {
            match op {
                Some(item) if model.len() == 4 => {
                    prop_assert_eq!(settle(|| queue.try_enqueue(item)), Err(QueueError::Full));
                }
                Some(item) => {
                    prop_assert_eq!(settle(|| queue.try_enqueue(item)), Ok(()));
                    model.push_back(item);
                }
                None => match model.pop_front() {
                    Some(expected) => prop_assert_eq!(settle(|| queue.try_dequeue()), Ok(expected)),
                    None => prop_assert_eq!(settle(|| queue.try_dequeue()), Err(QueueError::Empty)),
                },
            }
        }
    }

    /// Filling then draining any number of laps always returns to an empty
    /// queue that accepts exactly `capacity` more records.
    #[test]
    fn prop_laps_preserve_capacity(exp in 1u32..6, laps in 1usize..8) {
        let capacity = 1usize << exp;
        let queue = Mpmc::<u64>::allocate(capacity).unwrap();
        for lap in 0..laps {
            for i in 0..capacity {
                let item = (lap * capacity + i) as u64;
                prop_assert_eq!(settle(|| queue.try_enqueue(item)), Ok(()));
            }
            prop_assert_eq!(settle(|| queue.try_enqueue(0)), Err(QueueError::Full));
            for i in 0..capacity {
                prop_assert_eq!(settle(|| queue.try_dequeue()), Ok((lap * capacity + i) as u64));
            }
            prop_assert_eq!(settle(|| queue.try_dequeue()), Err(QueueError::Empty));
        }
    }
}
