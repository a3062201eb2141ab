use crate::relocate::{ByMove, Constructed, Relocate};
use crate::{AllocError, PushError, RawBuffer};
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut, Range};
use std::ptr;

/// Contiguous growable sequence of `T`.
///
/// The sequence owns one `RawBuffer<T>` and tracks how many leading cells are live: cells
/// `[0, len)` hold values, cells `[len, capacity)` are raw. Every operation keeps that split
/// intact, including when a constructor, `clone` or `default` panics halfway through.
///
/// Growth allocates a fresh buffer and relocates the live cells into it with the policy `R`:
/// `ByMove` (the default) moves the bits, `ByClone` clones the elements and drops the
/// originals only once the fresh buffer is complete. Either way a failed grow leaves the
/// sequence untouched, with its elements at their old addresses.
///
/// Positions are plain indices. Traversal goes through the slice the sequence derefs to.
pub struct Sequence<T, R = ByMove>
    where R: Relocate<T>
{
    data: RawBuffer<T>,
    len: usize,
    _policy: PhantomData<R>,
}

impl<T> Sequence<T> {
    /// Empty sequence, no allocation.
    pub const fn new() -> Sequence<T> {
        Sequence {
            data: RawBuffer::new(),
            len: 0,
            _policy: PhantomData,
        }
    }
}

impl<T, R> Sequence<T, R> where R: Relocate<T> {
    /// Empty sequence with room for exactly `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Sequence<T, R> {
        Sequence {
            data: RawBuffer::with_capacity(capacity),
            len: 0,
            _policy: PhantomData,
        }
    }

    /// Sequence of `len` default values in a buffer of exactly `len` cells.
    pub fn with_len(len: usize) -> Sequence<T, R> where T: Default {
        let mut sequence = Sequence::with_capacity(len);
        sequence.resize(len);
        sequence
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Address of the first cell. Dangling, never null, while nothing is allocated.
    #[inline(always)]
    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_ptr()
    }

    /// Addresses of the first live cell and one past the last.
    ///
    /// Both stay valid until the next reallocation or positional mutation.
    pub fn as_ptr_range(&self) -> Range<*const T> {
        self.as_ptr()..self.data.address(self.len) as *const T
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr(), self.len) }
    }

    /// Grows the buffer to exactly `capacity` cells if it is smaller.
    ///
    /// Panics on capacity overflow and aborts if the allocator fails. If relocation panics
    /// the sequence is left as it was.
    pub fn reserve(&mut self, capacity: usize) {
        if let Err(e) = self.try_reserve(capacity) {
            e.bail();
        }
    }

    /// Like `reserve`, but reports allocation failure instead of aborting.
    pub fn try_reserve(&mut self, capacity: usize) -> Result<(), AllocError> {
        if capacity <= self.capacity() {
            return Ok(());
        }

        let fresh = RawBuffer::allocate(capacity)?;
        debug!("reserve {} -> {} cells", self.capacity(), capacity);
        unsafe {
            R::relocate(self.data.as_ptr(), fresh.as_ptr(), self.len);
            self.install(fresh, self.len);
        }
        Ok(())
    }

    /// Appends `value`.
    pub fn push(&mut self, value: T) {
        self.push_with(move || value);
    }

    /// Appends `value`, handing it back if storage could not be secured.
    pub fn try_push(&mut self, value: T) -> Result<&mut T, PushError<T>> {
        if self.len < self.capacity() {
            return Ok(self.push_with(move || value));
        }

        match self.grown_buffer() {
            Ok(fresh) => {
                let slot = self.append_to(fresh, move || value);
                Ok(unsafe { &mut *slot })
            },
            Err(error) => Err(PushError { value, error }),
        }
    }

    /// Appends the value returned by `f` and returns a reference to it.
    ///
    /// When the buffer is full the new element is built in the fresh buffer before anything
    /// is relocated, so a panic in `f` discards only the fresh buffer.
    pub fn push_with<F>(&mut self, f: F) -> &mut T where F: FnOnce() -> T {
        let slot = if self.len == self.capacity() {
            let fresh = self.grown_buffer().unwrap_or_else(|e| e.bail());
            self.append_to(fresh, f)
        } else {
            unsafe {
                let slot = self.data.address(self.len);
                ptr::write(slot, f());
                self.len += 1;
                slot
            }
        };
        unsafe { &mut *slot }
    }

    /// Removes the last element and returns it, or `None` if empty.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            None
        } else {
            self.len -= 1;
            Some(unsafe { ptr::read(self.data.address(self.len)) })
        }
    }

    /// Inserts `value` at `index`, shifting later elements right.
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) -> &mut T {
        self.emplace(index, move || value)
    }

    /// Inserts the value returned by `f` at `index`, shifting later elements right.
    ///
    /// Panics if `index > len`. A panic in `f` leaves the sequence unchanged on both the
    /// in-place and the reallocating path.
    pub fn emplace<F>(&mut self, index: usize, f: F) -> &mut T where F: FnOnce() -> T {
        let len = self.len;
        if index > len {
            panic!("insertion index (is {}) should be <= len (is {})", index, len);
        }

        if len == self.capacity() {
            let fresh = self.grown_buffer().unwrap_or_else(|e| e.bail());
            unsafe {
                let slot = fresh.address(index);
                ptr::write(slot, f());
                let inserted = Constructed::new(slot, 1);

                let src = self.data.as_ptr();
                R::relocate(src, fresh.as_ptr(), index);
                let prefix = Constructed::new(fresh.as_ptr(), index);
                R::relocate(src.add(index), fresh.address(index + 1), len - index);

                prefix.keep();
                inserted.keep();
                self.install(fresh, len + 1);
            }
        } else {
            let value = f();
            unsafe {
                let at = self.data.address(index);
                ptr::copy(at, at.add(1), len - index);
                ptr::write(at, value);
            }
            self.len += 1;
        }

        unsafe { &mut *self.data.address(index) }
    }

    /// Drops the element at `index` and shifts later elements left.
    ///
    /// Returns `index`, which now names the element that followed the erased one, or equals
    /// `len()` if the last element was erased. Panics if `index >= len`.
    pub fn erase(&mut self, index: usize) -> usize {
        std::mem::drop(self.remove(index));
        index
    }

    /// Removes and returns the element at `index`, shifting later elements left.
    ///
    /// Panics if `index >= len`.
    pub fn remove(&mut self, index: usize) -> T {
        let len = self.len;
        if index >= len {
            panic!("removal index (is {}) should be < len (is {})", index, len);
        }

        unsafe {
            let at = self.data.address(index);
            let removed = ptr::read(at);
            ptr::copy(at.add(1), at, len - index - 1);
            self.len = len - 1;
            removed
        }
    }

    /// Drops every element past the first `len`. Does nothing if the sequence is not longer.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let tail = ptr::slice_from_raw_parts_mut(self.data.address(len), self.len - len);
        self.len = len;
        unsafe { ptr::drop_in_place(tail) };
    }

    /// Drops every element, keeping the buffer.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Resizes to `len` elements, filling new cells with `T::default()`.
    pub fn resize(&mut self, len: usize) where T: Default {
        self.resize_with(len, T::default);
    }

    /// Resizes to `len` elements, filling new cells with values returned by `f`.
    ///
    /// The buffer first grows to exactly `len` cells if needed. If `f` panics, the values
    /// built so far stay in the sequence.
    pub fn resize_with<F>(&mut self, len: usize, mut f: F) where F: FnMut() -> T {
        self.reserve(len);
        if len < self.len {
            self.truncate(len);
        } else {
            while self.len < len {
                unsafe { ptr::write(self.data.address(self.len), f()) };
                self.len += 1;
            }
        }
    }

    /// Exchanges contents with `other`. Never fails.
    pub fn swap_with(&mut self, other: &mut Sequence<T, R>) {
        self.data.swap(&mut other.data);
        std::mem::swap(&mut self.len, &mut other.len);
    }

    fn grown_buffer(&self) -> Result<RawBuffer<T>, AllocError> {
        let capacity = match self.capacity() {
            0 => 1,
            n => n.checked_mul(2).ok_or(AllocError::CapacityOverflow)?,
        };
        debug!("grow {} -> {} cells", self.capacity(), capacity);
        RawBuffer::allocate(capacity)
    }

    /// Builds the value returned by `f` at cell `len` of `fresh`, relocates everything else
    /// behind it, and installs `fresh`. Returns the address of the new element.
    fn append_to<F>(&mut self, fresh: RawBuffer<T>, f: F) -> *mut T where F: FnOnce() -> T {
        let len = self.len;
        unsafe {
            let slot = fresh.address(len);
            ptr::write(slot, f());
            let appended = Constructed::new(slot, 1);
            R::relocate(self.data.as_ptr(), fresh.as_ptr(), len);
            appended.keep();
            self.install(fresh, len + 1);
        }
        self.data.address(len)
    }

    /// Makes `fresh` (already holding `len` live cells) the active buffer, retires the
    /// originals and frees the old block.
    ///
    /// `len` is committed before the originals are retired, so a panicking `drop` during
    /// retirement cannot orphan the relocated cells.
    unsafe fn install(&mut self, mut fresh: RawBuffer<T>, len: usize) {
        let retired = self.len;
        self.data.swap(&mut fresh);
        self.len = len;
        R::retire(fresh.as_ptr(), retired);
    }
}

impl<T, R> Drop for Sequence<T, R> where R: Relocate<T> {
    fn drop(&mut self) {
        unsafe { ptr::drop_in_place(self.as_mut_slice()) };
    }
}

impl<T, R> Default for Sequence<T, R> where R: Relocate<T> {
    fn default() -> Self {
        Sequence {
            data: RawBuffer::new(),
            len: 0,
            _policy: PhantomData,
        }
    }
}

impl<T, R> Clone for Sequence<T, R> where T: Clone, R: Relocate<T> {
    /// Copies every element into a buffer sized to the source length.
    fn clone(&self) -> Self {
        let mut copy = Sequence {
            data: RawBuffer::with_capacity(self.len),
            len: 0,
            _policy: PhantomData,
        };
        for item in self.iter() {
            unsafe { ptr::write(copy.data.address(copy.len), item.clone()) };
            copy.len += 1;
        }
        copy
    }

    /// Copy assignment. Reuses our buffer whenever the source fits in it, even when shrinking;
    /// otherwise clones the source aside and swaps it in.
    fn clone_from(&mut self, source: &Self) {
        if source.len > self.capacity() {
            let mut copy = source.clone();
            self.swap_with(&mut copy);
            return;
        }

        let common = self.len.min(source.len);
        self.as_mut_slice()[..common].clone_from_slice(&source.as_slice()[..common]);

        if source.len < self.len {
            self.truncate(source.len);
        } else {
            for item in source.as_slice()[self.len..].iter() {
                unsafe { ptr::write(self.data.address(self.len), item.clone()) };
                self.len += 1;
            }
        }
    }
}

impl<T, R> Deref for Sequence<T, R> where R: Relocate<T> {
    type Target = [T];

    #[inline(always)]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, R> DerefMut for Sequence<T, R> where R: Relocate<T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, R> AsRef<[T]> for Sequence<T, R> where R: Relocate<T> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, R> AsMut<[T]> for Sequence<T, R> where R: Relocate<T> {
    fn as_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, R> Debug for Sequence<T, R> where T: Debug, R: Relocate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self.as_slice(), f)
    }
}

impl<T, U, R, Q> PartialEq<Sequence<U, Q>> for Sequence<T, R>
    where T: PartialEq<U>, R: Relocate<T>, Q: Relocate<U>
{
    fn eq(&self, other: &Sequence<U, Q>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T, U, R> PartialEq<[U]> for Sequence<T, R> where T: PartialEq<U>, R: Relocate<T> {
    fn eq(&self, other: &[U]) -> bool {
        self.as_slice() == other
    }
}

impl<T, U, R> PartialEq<&[U]> for Sequence<T, R> where T: PartialEq<U>, R: Relocate<T> {
    fn eq(&self, other: &&[U]) -> bool {
        self.as_slice() == *other
    }
}

impl<T, U, R, const N: usize> PartialEq<[U; N]> for Sequence<T, R> where T: PartialEq<U>, R: Relocate<T> {
    fn eq(&self, other: &[U; N]) -> bool {
        self.as_slice() == &other[..]
    }
}

impl<T, R> Eq for Sequence<T, R> where T: Eq, R: Relocate<T> {}

impl<T, R> Hash for Sequence<T, R> where T: Hash, R: Relocate<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Hash::hash(self.as_slice(), state)
    }
}

impl<T, R> FromIterator<T> for Sequence<T, R> where R: Relocate<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        let mut sequence = Sequence::default();
        sequence.reserve(lower);
        for item in iter {
            sequence.push(item);
        }
        sequence
    }
}

impl<'a, T, R> From<&'a [T]> for Sequence<T, R> where T: Clone, R: Relocate<T> {
    fn from(items: &'a [T]) -> Self {
        items.iter().cloned().collect()
    }
}

impl<'a, T, R> IntoIterator for &'a Sequence<T, R> where R: Relocate<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T, R> IntoIterator for &'a mut Sequence<T, R> where R: Relocate<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

impl<T, R> IntoIterator for Sequence<T, R> where R: Relocate<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        let mut this = ManuallyDrop::new(self);
        let data = std::mem::take(&mut this.data);
        IntoIter {
            data,
            start: 0,
            end: this.len,
        }
    }
}

/// Owning iterator over the elements of a `Sequence`.
///
/// Elements not yielded are dropped with the iterator, then the buffer is released.
pub struct IntoIter<T> {
    data: RawBuffer<T>,
    start: usize,
    end: usize,
}

impl<T> IntoIter<T> {
    /// Elements not yet yielded.
    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.data.address(self.start), self.end - self.start) }
    }
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.start == self.end {
            return None;
        }
        let item = unsafe { ptr::read(self.data.address(self.start)) };
        self.start += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.end - self.start;
        (len, Some(len))
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    fn next_back(&mut self) -> Option<T> {
        if self.start == self.end {
            return None;
        }
        self.end -= 1;
        Some(unsafe { ptr::read(self.data.address(self.end)) })
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<T> Drop for IntoIter<T> {
    fn drop(&mut self) {
        let rest = ptr::slice_from_raw_parts_mut(self.data.address(self.start), self.end - self.start);
        self.start = self.end;
        unsafe { ptr::drop_in_place(rest) };
    }
}

impl<T> Debug for IntoIter<T> where T: Debug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("IntoIter").field(&self.as_slice()).finish()
    }
}
