//! Error type shared by the fallible entry points of the crate.
//!
//! Programmer errors (a non-positive total passed to [`Progress::new`](crate::Progress::new))
//! panic; every such constructor has a `try_` twin that returns [`Error`] instead.
//! Output failures inside reporters never surface here: progress reporting must not abort
//! the work it is monitoring.

/// Errors returned by the fallible constructors and the scheduler entry points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The total item count must be strictly positive.
    #[error("total should be greater than 0, got {0}")]
    InvalidTotal(i64),

    /// The tracker's reporter was already moved into a running scheduler task.
    #[error("progress tracker was already started")]
    AlreadyStarted,

    /// An iterator did not report an exact, non-zero length.
    #[error("iterator length is unknown or zero")]
    UnknownLength,
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
