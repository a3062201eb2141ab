//! Contiguous growable sequence built on an explicit split between raw storage and live
//! elements.
//!
//! `RawBuffer<T>` owns uninitialized, aligned memory and never touches a `T`. `Sequence<T, R>`
//! sits on one `RawBuffer<T>` and decides which cells are live. Growth relocates through the
//! compile-time policy `R`: `ByMove` or `ByClone`.

#[macro_use]
mod logging;

mod error;
mod raw;
mod relocate;
mod sequence;

pub use error::{AllocError, PushError};
pub use raw::RawBuffer;
pub use relocate::{ByClone, ByMove, Relocate};
pub use sequence::{IntoIter, Sequence};

#[cfg(test)]
pub mod dropflag;
