use std::io;

use thiserror::Error;

/// Errors returned by a [`Pollset`].
///
/// [`Pollset`]: crate::Pollset
#[derive(Debug, Error)]
pub enum Error {
    /// The native readiness facility could not be opened, e.g. because the
    /// file descriptor table is full.
    #[error("unable to create pollset: {0}")]
    ResourceExhausted(#[source] io::Error),
    /// Thread safety was requested, but this host has no locking primitive
    /// available.
    #[error("thread safe pollsets are not supported on this host")]
    NotImplemented,
    /// The backend refused to watch a descriptor. Nothing was registered.
    #[error("backend rejected registration: {0}")]
    BackendRejected(#[source] io::Error),
    /// The descriptor was not known to the backend.
    #[error("descriptor not found")]
    NotFound,
    /// No descriptor became ready before the timeout elapsed.
    #[error("timed out waiting for readiness")]
    TimedOut,
    /// Waiting on the native readiness facility failed, e.g. the call was
    /// interrupted by a signal.
    #[error("polling failed: {0}")]
    Os(#[source] io::Error),
}

impl Error {
    /// Whether or not this is a [`TimedOut`] error.
    ///
    /// [`TimedOut`]: Error::TimedOut
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Error::TimedOut)
    }

    /// Returns the native error code wrapped by this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::ResourceExhausted(err) |
            Error::BackendRejected(err) |
            Error::Os(err) => err.raw_os_error(),
            Error::NotImplemented | Error::NotFound | Error::TimedOut => None,
        }
    }
}
