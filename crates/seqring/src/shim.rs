//! Switches synchronization primitives between `std` and `loom`.
//!
//! With the `loom` feature enabled the queue's cursors, cell sequence
//! numbers and record cells become loom types, so `loom::model` explores every
//! interleaving of the real slot protocol and flags a record read that is not
//! ordered after its write.

#[cfg(not(feature = "loom"))]
pub(crate) mod atomic {
    pub(crate) use std::sync::atomic::{AtomicUsize, Ordering};
}

#[cfg(feature = "loom")]
pub(crate) mod atomic {
    pub(crate) use loom::sync::atomic::{AtomicUsize, Ordering};
}

#[cfg(not(feature = "loom"))]
pub(crate) mod hint {
    pub(crate) use std::hint::spin_loop;
}

#[cfg(feature = "loom")]
pub(crate) mod hint {
    // A spinning loom thread must yield or the model never makes progress.
    pub(crate) fn spin_loop() {
        loom::thread::yield_now();
    }
}

#[cfg(not(feature = "loom"))]
pub(crate) mod thread {
    pub(crate) use std::thread::yield_now;
}

#[cfg(feature = "loom")]
pub(crate) mod thread {
    pub(crate) use loom::thread::yield_now;
}

#[cfg(not(feature = "loom"))]
pub(crate) mod cell {
    /// `std::cell::UnsafeCell` behind loom's closure-based access API.
    pub(crate) struct UnsafeCell<T>(std::cell::UnsafeCell<T>);

    impl<T> UnsafeCell<T> {
        #[inline]
        pub(crate) const fn new(data: T) -> Self {
            Self(std::cell::UnsafeCell::new(data))
        }

        #[inline]
        pub(crate) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
            f(self.0.get())
        }

        #[inline]
        pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
            f(self.0.get())
        }
    }
}

#[cfg(feature = "loom")]
pub(crate) mod cell {
    pub(crate) use loom::cell::UnsafeCell;
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::cell::UnsafeCell;

    #[test]
    fn test_cell_access_goes_through_closures() {
        let cell = UnsafeCell::new(3u32);
        cell.with_mut(|value| unsafe { *value += 4 });
        assert_eq!(cell.with(|value| unsafe { *value }), 7);
    }
}
