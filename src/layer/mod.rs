//! The protocol layers.
//!
//! There is exactly one layer of substance in this crate, the entanglement
//! protocol itself in [`entl`](entl/index.html). The error type here is
//! shared by the administrative surface and the adapter boundary.
use core::fmt;

pub mod entl;

/// The error type of fallible layer operations.
///
/// Protocol faults (sequence violations, link loss) are *not* errors in this
/// sense. They latch inside the state machine and surface through
/// [`entl::Action::ERROR`] and the latch accessors; this type only covers
/// the operations a caller invokes directly.
///
/// [`entl::Action::ERROR`]: entl/struct.Action.html
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A bounded resource (queue slot, transmit descriptor) was unavailable.
    Exhausted,
    /// A provided buffer had an unacceptable size.
    BadSize,
    /// The operation is not permitted in the current state.
    Illegal,
}

/// The result type of fallible layer operations.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Exhausted => f.write_str("resource exhausted"),
            Error::BadSize => f.write_str("bad buffer size"),
            Error::Illegal => f.write_str("illegal operation"),
        }
    }
}
