//! This module is for testing only

use std::cell::RefCell;
use std::fmt::Debug;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

pub type DropFlag<T> = Rc<RefCell<T>>;

/// Element that counts its live instances in a shared flag.
pub struct Tracked {
    pub value: i32,
    live: DropFlag<i64>,
}

impl Tracked {
    pub fn new(value: i32, live: &DropFlag<i64>) -> Tracked {
        *live.borrow_mut() += 1;
        Tracked { value, live: live.clone() }
    }
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        Tracked::new(self.value, &self.live)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        *self.live.borrow_mut() -= 1;
    }
}

impl PartialEq for Tracked {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Debug for Tracked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.value, f)
    }
}

#[derive(Default)]
pub struct Schedule {
    pub clones: usize,
    pub fail_at: Option<usize>,
    pub fail_next_drop: bool,
    pub live: i64,
}

pub fn schedule() -> DropFlag<Schedule> {
    DropFlag::new(RefCell::new(Schedule::default()))
}

/// Makes the `k`-th clone from now panic.
pub fn fail_after(schedule: &DropFlag<Schedule>, k: usize) {
    let mut s = schedule.borrow_mut();
    s.fail_at = Some(s.clones + k);
}

/// Makes the next `Fragile` drop panic once it has been counted.
pub fn fail_next_drop(schedule: &DropFlag<Schedule>) {
    schedule.borrow_mut().fail_next_drop = true;
}

/// Element whose `clone` or `drop` panics when its schedule says so.
pub struct Fragile {
    pub value: i32,
    schedule: DropFlag<Schedule>,
}

impl Fragile {
    pub fn new(value: i32, schedule: &DropFlag<Schedule>) -> Fragile {
        schedule.borrow_mut().live += 1;
        Fragile { value, schedule: schedule.clone() }
    }
}

impl Clone for Fragile {
    fn clone(&self) -> Self {
        let failing = {
            let mut s = self.schedule.borrow_mut();
            s.clones += 1;
            s.fail_at == Some(s.clones)
        };
        if failing {
            panic!("clone of {} refused", self.value);
        }
        Fragile::new(self.value, &self.schedule)
    }
}

impl Drop for Fragile {
    fn drop(&mut self) {
        let failing = {
            let mut s = self.schedule.borrow_mut();
            s.live -= 1;
            std::mem::replace(&mut s.fail_next_drop, false)
        };
        if failing {
            panic!("drop of {} refused", self.value);
        }
    }
}

impl Debug for Fragile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.value, f)
    }
}

/// Element that can only be moved.
#[derive(Debug, PartialEq, Default)]
pub struct Token(pub Box<i32>);

/// Runs `f` and reports whether it panicked.
pub fn panics<F: FnOnce()>(f: F) -> bool {
    catch_unwind(AssertUnwindSafe(f)).is_err()
}

#[test]
fn dropflag() {
    let live = DropFlag::new(RefCell::new(0));
    let a = Tracked::new(1, &live);
    let b = a.clone();
    assert_eq!(2, *live.borrow());
    std::mem::drop(a);
    std::mem::drop(b);
    assert_eq!(0, *live.borrow());
}

#[test]
fn fragile_clone_fails_on_schedule() {
    let sched = schedule();
    let a = Fragile::new(5, &sched);
    fail_after(&sched, 2);
    let b = a.clone();
    assert!(panics(|| {
        let _ = a.clone();
    }));
    assert_eq!(2, sched.borrow().live);
    std::mem::drop(b);
    assert_eq!(1, sched.borrow().live);
}
