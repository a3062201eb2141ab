use std::alloc::Layout;
use std::fmt::{Debug, Display};

/// Failure to secure raw storage for a `RawBuffer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The requested cell count does not fit in `isize::MAX` bytes.
    CapacityOverflow,
    /// The global allocator returned null for this layout.
    Allocator { layout: Layout },
}

impl AllocError {
    /// Turns the error into the same outcome `std::vec::Vec` produces for an infallible request.
    pub(crate) fn bail(self) -> ! {
        match self {
            AllocError::CapacityOverflow => panic!("capacity overflow"),
            AllocError::Allocator { layout } => std::alloc::handle_alloc_error(layout),
        }
    }
}

impl Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocError::CapacityOverflow => Display::fmt("Requested capacity exceeds isize::MAX bytes", f),
            AllocError::Allocator { layout } => write!(f, "Allocator could not provide {} bytes aligned to {}", layout.size(), layout.align()),
        }
    }
}

impl std::error::Error for AllocError {}

/// Returned by `Sequence::try_push` when the value could not be stored.
///
/// The rejected value is handed back untouched.
pub struct PushError<T> {
    pub value: T,
    pub error: AllocError,
}

impl<T> PushError<T> {
    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T> Debug for PushError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushError")
            .field("error", &self.error)
            .finish()
    }
}

impl<T> Display for PushError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Value was not pushed - {}", self.error)
    }
}

impl<T> std::error::Error for PushError<T> {}
