//! Caller-owned backing memory.
//!
//! A queue never allocates. The caller sizes the region with
//! [`Queue::size_query`](crate::Queue::size_query), obtains memory however it
//! likes (arena, stack array, shared mapping, [`AlignedBuffer`]) and hands it
//! over through the [`Storage`] trait.

use std::alloc::{self, Layout, LayoutError};
use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::slice;

/// Minimum alignment of a queue's backing buffer.
pub const QUEUE_ALIGN: usize = 16;

/// A contiguous byte region a queue can be laid out in.
///
/// # Safety
///
/// Implementors must guarantee that:
/// - `as_mut_ptr()` returns the same address for as long as the value lives,
///   even if the value itself is moved;
/// - the `len()` bytes starting there are valid for reads and writes and are
///   not accessed through any other path while the value is held by a queue.
pub unsafe trait Storage {
    /// Start of the region.
    fn as_mut_ptr(&mut self) -> *mut u8;

    /// Length of the region in bytes.
    fn len(&self) -> usize;

    /// True for a zero-length region, which no queue fits in.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// SAFETY: the exclusive borrow pins the slice for 'a and excludes other access.
unsafe impl Storage for &mut [u8] {
    #[inline]
    fn as_mut_ptr(&mut self) -> *mut u8 {
        <[u8]>::as_mut_ptr(self)
    }

    #[inline]
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }
}

// SAFETY: as above; the queue zeroes the region before reading any of it.
unsafe impl Storage for &mut [MaybeUninit<u8>] {
    #[inline]
    fn as_mut_ptr(&mut self) -> *mut u8 {
        <[MaybeUninit<u8>]>::as_mut_ptr(self).cast()
    }

    #[inline]
    fn len(&self) -> usize {
        <[MaybeUninit<u8>]>::len(self)
    }
}

/// A zeroed heap region with a guaranteed alignment.
///
/// This is the allocation a caller makes between the sizing and the
/// initialization phase when it has no arena or mapping of its own.
///
/// ```
/// use seqring_rs::{AlignedBuffer, Mpmc};
///
/// let bytes = Mpmc::<u64>::size_query(64).unwrap();
/// let buffer = AlignedBuffer::zeroed(bytes).unwrap();
/// let queue = Mpmc::<u64>::initialize(64, buffer).unwrap();
/// queue.enqueue(7).unwrap();
/// assert_eq!(queue.dequeue(), Ok(7));
/// ```
#[derive(Debug)]
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

// SAFETY: AlignedBuffer uniquely owns its allocation, like Box<[u8]>.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// Allocates `len` zeroed bytes aligned to [`QUEUE_ALIGN`].
    pub fn zeroed(len: usize) -> Result<Self, LayoutError> {
        Self::zeroed_with_align(len, QUEUE_ALIGN)
    }

    /// Allocates `len` zeroed bytes aligned to `align` (a power of two).
    ///
    /// Needed only for element types whose alignment exceeds [`QUEUE_ALIGN`].
    pub fn zeroed_with_align(len: usize, align: usize) -> Result<Self, LayoutError> {
        // A zero-sized layout cannot be handed to the allocator.
        let layout = Layout::from_size_align(len.max(1), align)?;
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout)
        };
        Ok(Self { ptr, len, layout })
    }

    /// Alignment the region was allocated with.
    #[inline]
    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// The region's bytes, including any queue laid out in it.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len initialized (zeroed) bytes.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Mutable view of the region, for filling it before `initialize`.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self gives exclusive access.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

// SAFETY: the heap address never changes when the AlignedBuffer moves, and the
// allocation is owned exclusively.
unsafe impl Storage for AlignedBuffer {
    #[inline]
    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in zeroed_with_align with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_buffer_is_zeroed_and_aligned() {
        let buffer = AlignedBuffer::zeroed(1000).unwrap();
        assert_eq!(Storage::len(&buffer), 1000);
        assert_eq!(buffer.as_slice().as_ptr() as usize % QUEUE_ALIGN, 0);
        assert!(buffer.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_custom_alignment() {
        let buffer = AlignedBuffer::zeroed_with_align(256, 128).unwrap();
        assert_eq!(buffer.align(), 128);
        assert_eq!(buffer.as_slice().as_ptr() as usize % 128, 0);
        assert!(AlignedBuffer::zeroed_with_align(16, 3).is_err());
    }

    #[test]
    fn test_zero_length_buffer() {
        let mut buffer = AlignedBuffer::zeroed(0).unwrap();
        assert!(Storage::is_empty(&buffer));
        assert!(buffer.as_mut_slice().is_empty());
    }

    #[test]
    fn test_address_survives_move() {
        let mut buffer = AlignedBuffer::zeroed(64).unwrap();
        let before = Storage::as_mut_ptr(&mut buffer);
        let mut moved = Box::new(buffer);
        assert_eq!(Storage::as_mut_ptr(&mut *moved), before);
    }

    #[test]
    fn test_borrowed_slices_are_storage() {
        let mut bytes = [0u8; 32];
        let mut storage: &mut [u8] = &mut bytes[..];
        assert_eq!(Storage::len(&storage), 32);
        assert!(!Storage::as_mut_ptr(&mut storage).is_null());

        let mut raw = [MaybeUninit::<u8>::uninit(); 8];
        let storage: &mut [MaybeUninit<u8>] = &mut raw[..];
        assert_eq!(Storage::len(&storage), 8);
    }
}
