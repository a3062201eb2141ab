//! Compile-time choice of how live cells travel from an old buffer into a fresh one.
//!
//! `ByMove` copies the bits and leaves the old cells raw; it cannot fail and works for every
//! type. `ByClone` clones each element and keeps the originals live until the fresh buffer is
//! complete, so a panicking `clone` leaves the old buffer exactly as it was.

use std::ptr;

/// Relocation strategy used by every grow path of `Sequence`.
///
/// # Safety
///
/// `relocate` must leave `count` live values in `dst`. An implementation that sets
/// `CONSUMES_SOURCE` must never unwind and must leave `src` cells raw. One that does not set
/// it must leave `src` cells live, and on unwinding must drop whatever it already
/// constructed in `dst`.
pub unsafe trait Relocate<T> {
    /// True if relocated source cells no longer hold live values.
    const CONSUMES_SOURCE: bool;

    /// Fills raw cells `dst[0..count)` from live cells `src[0..count)`.
    unsafe fn relocate(src: *const T, dst: *mut T, count: usize);

    /// Drops the originals that a non-consuming relocation left behind.
    #[inline(always)]
    unsafe fn retire(src: *mut T, count: usize) {
        if !Self::CONSUMES_SOURCE {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(src, count));
        }
    }
}

/// Bitwise move. The default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByMove;

/// Clone into the fresh buffer, then drop the originals.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByClone;

unsafe impl<T> Relocate<T> for ByMove {
    const CONSUMES_SOURCE: bool = true;

    #[inline(always)]
    unsafe fn relocate(src: *const T, dst: *mut T, count: usize) {
        ptr::copy_nonoverlapping(src, dst, count);
    }
}

unsafe impl<T: Clone> Relocate<T> for ByClone {
    const CONSUMES_SOURCE: bool = false;

    unsafe fn relocate(src: *const T, dst: *mut T, count: usize) {
        let mut done = Constructed::new(dst, 0);
        for i in 0..count {
            ptr::write(dst.add(i), (*src.add(i)).clone());
            done.len += 1;
        }
        done.keep();
    }
}

/// Scoped ownership of a run of freshly constructed cells.
///
/// Dropping the guard drops the run; `keep` hands the cells over to their final owner.
pub(crate) struct Constructed<T> {
    start: *mut T,
    pub(crate) len: usize,
}

impl<T> Constructed<T> {
    #[inline(always)]
    pub(crate) fn new(start: *mut T, len: usize) -> Constructed<T> {
        Constructed { start, len }
    }

    #[inline(always)]
    pub(crate) fn keep(self) {
        std::mem::forget(self);
    }
}

impl<T> Drop for Constructed<T> {
    fn drop(&mut self) {
        trace!(target: "memseq::relocate", "unwind {} constructed cells", self.len);
        unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.start, self.len)) };
    }
}

#[cfg(test)]
mod relocate_tests {
    use super::{ByClone, ByMove, Relocate};
    use crate::dropflag::{fail_after, panics, schedule, DropFlag, Fragile, Tracked};
    use crate::RawBuffer;
    use std::cell::RefCell;

    #[test]
    fn move_leaves_count_unchanged() {
        let live = DropFlag::new(RefCell::new(0));
        let old = RawBuffer::<Tracked>::with_capacity(3);
        let fresh = RawBuffer::<Tracked>::with_capacity(3);
        unsafe {
            for i in 0..3 {
                std::ptr::write(old.address(i), Tracked::new(i as i32, &live));
            }
            <ByMove as Relocate<Tracked>>::relocate(old.address(0), fresh.address(0), 3);
            <ByMove as Relocate<Tracked>>::retire(old.address(0), 3);
            assert_eq!(3, *live.borrow());
            assert_eq!(2, (*fresh.address(2)).value);
            std::ptr::drop_in_place(std::ptr::slice_from_raw_parts_mut(fresh.address(0), 3));
        }
        assert_eq!(0, *live.borrow());
    }

    #[test]
    fn clone_keeps_originals_until_retired() {
        let live = DropFlag::new(RefCell::new(0));
        let old = RawBuffer::<Tracked>::with_capacity(2);
        let fresh = RawBuffer::<Tracked>::with_capacity(2);
        unsafe {
            std::ptr::write(old.address(0), Tracked::new(7, &live));
            std::ptr::write(old.address(1), Tracked::new(8, &live));
            <ByClone as Relocate<Tracked>>::relocate(old.address(0), fresh.address(0), 2);
            assert_eq!(4, *live.borrow());
            <ByClone as Relocate<Tracked>>::retire(old.address(0), 2);
            assert_eq!(2, *live.borrow());
            assert_eq!(8, (*fresh.address(1)).value);
            std::ptr::drop_in_place(std::ptr::slice_from_raw_parts_mut(fresh.address(0), 2));
        }
        assert_eq!(0, *live.borrow());
    }

    #[test]
    fn failed_clone_unwinds_partial_run() {
        let sched = schedule();
        let old = RawBuffer::<Fragile>::with_capacity(4);
        let fresh = RawBuffer::<Fragile>::with_capacity(4);
        unsafe {
            for i in 0..4 {
                std::ptr::write(old.address(i), Fragile::new(i as i32, &sched));
            }
        }
        fail_after(&sched, 3);

        assert!(panics(|| unsafe {
            <ByClone as Relocate<Fragile>>::relocate(old.address(0), fresh.address(0), 4)
        }));

        assert_eq!(4, sched.borrow().live, "only the originals survive");
        unsafe {
            assert_eq!(3, (*old.address(3)).value);
            std::ptr::drop_in_place(std::ptr::slice_from_raw_parts_mut(old.address(0), 4));
        }
        assert_eq!(0, sched.borrow().live);
    }
}
