use crate::AllocError;
use std::alloc::{self, Layout};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::ptr::{null_mut, NonNull};

/// Owning handle over a block of raw, uninitialized storage for `capacity` cells of `T`.
///
/// The buffer only allocates and frees memory. It never reads, writes, constructs or drops
/// a `T`: whoever holds the buffer decides which cells are live. The null state (no allocation,
/// zero capacity) is the default, so an empty buffer costs nothing.
///
/// Zero-sized `T` never touches the allocator: the buffer reports the requested capacity and
/// points at a dangling, well-aligned address.
pub struct RawBuffer<T> {
    ptr: *mut T,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T> RawBuffer<T> {
    /// Returns the null state without allocating.
    pub const fn new() -> RawBuffer<T> {
        RawBuffer {
            ptr: null_mut(),
            capacity: 0,
            _marker: PhantomData,
        }
    }

    /// Reserves raw storage for `capacity` cells.
    ///
    /// Zero capacity returns the null state.
    pub fn allocate(capacity: usize) -> Result<RawBuffer<T>, AllocError> {
        if capacity == 0 {
            return Ok(RawBuffer::new());
        }

        if std::mem::size_of::<T>() == 0 {
            return Ok(RawBuffer {
                ptr: NonNull::dangling().as_ptr(),
                capacity,
                _marker: PhantomData,
            });
        }

        let layout = Layout::array::<T>(capacity).map_err(|_| AllocError::CapacityOverflow)?;
        let ptr = unsafe { alloc::alloc(layout) } as *mut T;
        if ptr.is_null() {
            return Err(AllocError::Allocator { layout });
        }

        trace!(target: "memseq::raw", "allocate {} cells ({} bytes) at {:?}", capacity, layout.size(), ptr);

        Ok(RawBuffer {
            ptr,
            capacity,
            _marker: PhantomData,
        })
    }

    /// Same as `allocate`, but panics on capacity overflow and aborts through
    /// `handle_alloc_error` when the allocator gives up.
    pub fn with_capacity(capacity: usize) -> RawBuffer<T> {
        match RawBuffer::allocate(capacity) {
            Ok(buffer) => buffer,
            Err(e) => e.bail(),
        }
    }

    /// Frees the block and returns to the null state. Releasing the null state is a no-op.
    pub fn release(&mut self) {
        if self.ptr.is_null() {
            return;
        }

        if std::mem::size_of::<T>() != 0 {
            trace!(target: "memseq::raw", "release {} cells at {:?}", self.capacity, self.ptr);
            unsafe {
                // the same layout was validated by `allocate`
                let layout = Layout::from_size_align_unchecked(
                    std::mem::size_of::<T>() * self.capacity,
                    std::mem::align_of::<T>(),
                );
                alloc::dealloc(self.ptr as *mut u8, layout);
            }
        }

        self.ptr = null_mut();
        self.capacity = 0;
    }

    /// Exchanges the blocks owned by the two buffers.
    #[inline(always)]
    pub fn swap(&mut self, other: &mut RawBuffer<T>) {
        std::mem::swap(&mut self.ptr, &mut other.ptr);
        std::mem::swap(&mut self.capacity, &mut other.capacity);
    }

    /// Returns a pointer to cell `offset`; `offset == capacity` yields the end pointer.
    ///
    /// In the null state this is a dangling, well-aligned pointer, good for zero-length
    /// accesses only.
    #[inline(always)]
    pub fn address(&self, offset: usize) -> *mut T {
        debug_assert!(offset <= self.capacity, "address offset {} is past capacity {}", offset, self.capacity);
        if self.ptr.is_null() {
            NonNull::dangling().as_ptr()
        } else {
            unsafe { self.ptr.add(offset) }
        }
    }

    /// Pointer to the first cell, never null.
    #[inline(always)]
    pub fn as_ptr(&self) -> *mut T {
        self.address(0)
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true when nothing is allocated.
    #[inline(always)]
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

// the buffer owns its cells the way `Box<[T]>` does
unsafe impl<T: Send> Send for RawBuffer<T> {}
unsafe impl<T: Sync> Sync for RawBuffer<T> {}

impl<T> Default for RawBuffer<T> {
    fn default() -> Self {
        RawBuffer::new()
    }
}

impl<T> Drop for RawBuffer<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Debug for RawBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBuffer")
            .field("ptr", &self.ptr)
            .field("capacity", &self.capacity)
            .finish()
    }
}
