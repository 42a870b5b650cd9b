use std::cmp::min;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use log::debug;

use crate::event::Interests;

mod poll;

pub use self::poll::{Events as PollEvents, Poll};

#[cfg(any(target_os = "android", target_os = "linux"))]
mod epoll;

#[cfg(any(target_os = "android", target_os = "linux"))]
pub use self::epoll::{Events as SelectorEvents, Selector};

#[cfg(any(target_os = "dragonfly", target_os = "freebsd", target_os = "macos",
          target_os = "netbsd", target_os = "openbsd"))]
mod kqueue;

#[cfg(any(target_os = "dragonfly", target_os = "freebsd", target_os = "macos",
          target_os = "netbsd", target_os = "openbsd"))]
pub use self::kqueue::{Events as SelectorEvents, Selector};

/// Value of a native handle after it's closed.
const CLOSED_FD: RawFd = -1;

const NANOS_PER_MILLI: u128 = 1_000_000;

/// Convert a `Duration` to milliseconds, rounding up so we don't return before
/// the timeout elapsed.
fn duration_to_millis(duration: Duration) -> libc::c_int {
    let millis = (duration.as_nanos() + NANOS_PER_MILLI - 1) / NANOS_PER_MILLI;
    min(millis, libc::c_int::MAX as u128) as libc::c_int
}

/// Load the native handle, returns [`CLOSED_FD`] once closed. Any system call
/// made with a closed handle fails with `EBADF`.
fn load_fd(fd: &AtomicI32) -> RawFd {
    fd.load(Ordering::Acquire)
}

/// Close the native handle, only the first call closes it.
fn close_fd(fd: &AtomicI32) -> io::Result<()> {
    let fd = fd.swap(CLOSED_FD, Ordering::AcqRel);
    if fd == CLOSED_FD {
        return Ok(());
    }

    if unsafe { libc::close(fd) } == -1 {
        // Possible errors:
        // - EBADF, EIO: can't recover.
        // - EINTR: could try again but we can't be sure if the file
        //          descriptor was closed or not, so to be safe we don't
        //          close it again.
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Register each interest in `interests` separately using `register`. If
/// registering an interest fails the interests registered before it are
/// removed again using `deregister`, and the error is returned.
#[cfg_attr(any(target_os = "android", target_os = "linux"), allow(dead_code))]
fn register_each<R, D>(interests: Interests, mut register: R, mut deregister: D) -> io::Result<()>
    where R: FnMut(Interests) -> io::Result<()>,
          D: FnMut(Interests) -> io::Result<()>,
{
    let mut registered: Option<Interests> = None;
    for interest in interests.split() {
        if let Err(err) = register(interest) {
            for interest in registered.iter().flat_map(|registered| registered.split()) {
                if let Err(err) = deregister(interest) {
                    debug!("unable to roll back registration: interest={:?}, err={}", interest, err);
                }
            }
            return Err(err);
        }
        registered = Some(registered.map_or(interest, |registered| registered | interest));
    }
    Ok(())
}
