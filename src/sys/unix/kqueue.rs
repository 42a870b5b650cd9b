use std::os::unix::io::RawFd;
use std::sync::atomic::AtomicI32;
use std::time::Duration;
use std::{cmp, io, mem, ptr};

use log::error;

use crate::backend::{Backend, NativeEvent, NativeEvents, Tag};
use crate::event::{Interests, Ready};
use crate::sys::unix::{close_fd, load_fd, register_each};

// Of course each OS that implements kqueue has chosen to go for different types
// in the `kevent` structure, hence the type definitions below.

// Type of `nchanges` in the `kevent` system call.
#[cfg(not(target_os = "netbsd"))]
#[allow(non_camel_case_types)]
type nchanges_t = libc::c_int;
#[cfg(target_os = "netbsd")]
#[allow(non_camel_case_types)]
type nchanges_t = libc::size_t;

// Type of the `filter` field in the `kevent` structure.
#[cfg(any(target_os = "dragonfly", target_os = "freebsd", target_os = "openbsd"))]
#[allow(non_camel_case_types)]
type kevent_filter_t = libc::c_short;
#[cfg(target_os = "macos")]
#[allow(non_camel_case_types)]
type kevent_filter_t = i16;
#[cfg(target_os = "netbsd")]
#[allow(non_camel_case_types)]
type kevent_filter_t = u32;

// Type of the `flags` field in the `kevent` structure.
#[cfg(any(target_os = "dragonfly", target_os = "freebsd", target_os = "openbsd"))]
#[allow(non_camel_case_types)]
type kevent_flags_t = libc::c_ushort;
#[cfg(target_os = "macos")]
#[allow(non_camel_case_types)]
type kevent_flags_t = u16;
#[cfg(target_os = "netbsd")]
#[allow(non_camel_case_types)]
type kevent_flags_t = u32;

// Type of the `udata` field in the `kevent` structure.
#[cfg(not(target_os = "netbsd"))]
#[allow(non_camel_case_types)]
type kevent_udata_t = *mut libc::c_void;
#[cfg(target_os = "netbsd")]
#[allow(non_camel_case_types)]
type kevent_udata_t = libc::intptr_t;

/// Backend based on kqueue.
///
/// Each interest is a separate filter in kqueue, so watching a descriptor for
/// both readable and writable interests registers two filters, both with the
/// same tag. Filters are level-triggered.
#[derive(Debug)]
pub struct Selector {
    kq: AtomicI32,
}

impl Selector {
    /// Create a new kqueue.
    pub fn new() -> io::Result<Selector> {
        let kq = unsafe { libc::kqueue() };
        if kq == -1 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::fcntl(kq, libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
            let err = io::Error::last_os_error();
            let _ = unsafe { libc::close(kq) };
            Err(err)
        } else {
            Ok(Selector { kq: AtomicI32::new(kq) })
        }
    }
}

impl Backend for Selector {
    type Events = Events;

    fn watch(&self, fd: RawFd, interests: Interests, tag: Tag) -> io::Result<()> {
        let kq = load_fd(&self.kq);
        register_each(interests,
            |interest| {
                let flags = libc::EV_ADD | libc::EV_RECEIPT;
                kevent_register(kq, &mut [new_kevent(fd, interest_to_filter(interest), flags, tag)])
            },
            |interest| {
                let flags = libc::EV_DELETE | libc::EV_RECEIPT;
                kevent_register(kq, &mut [new_kevent(fd, interest_to_filter(interest), flags, tag)])
            })
    }

    fn unwatch(&self, fd: RawFd, interests: Interests) -> io::Result<()> {
        let kq = load_fd(&self.kq);
        let mut result = Ok(());
        for interest in interests.split() {
            let mut change = [new_kevent(fd, interest_to_filter(interest), libc::EV_DELETE | libc::EV_RECEIPT, Tag(0))];
            if let Err(err) = kevent_register(kq, &mut change) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<()> {
        events.events.clear();
        let events_cap = cmp::min(events.events.capacity(), libc::c_int::MAX as usize) as nchanges_t;

        let timespec = timeout.map(timespec_from_duration);
        #[allow(trivial_casts)]
        let timespec_ptr = timespec
            .as_ref()
            .map(|t| t as *const libc::timespec)
            .unwrap_or(ptr::null());

        let n_events = unsafe {
            libc::kevent(load_fd(&self.kq), ptr::null(), 0,
                events.events.as_mut_ptr(), events_cap, timespec_ptr)
        };
        match n_events {
            -1 => Err(io::Error::last_os_error()),
            n => {
                // Safety: the kernel initialised the first `n` events.
                unsafe { events.events.set_len(n as usize) };
                Ok(())
            },
        }
    }

    fn close(&self) -> io::Result<()> {
        close_fd(&self.kq)
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        if let Err(err) = close_fd(&self.kq) {
            error!("error closing kqueue: {}", err);
        }
    }
}

/// Native event buffer of [`Selector`].
#[derive(Debug)]
pub struct Events {
    events: Vec<libc::kevent>,
}

// Only the `udata` field is a pointer, which we only use as integer.
unsafe impl Send for Events {}

impl NativeEvents for Events {
    fn with_capacity(capacity: usize) -> Events {
        Events { events: Vec::with_capacity(capacity) }
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn get(&self, index: usize) -> Option<NativeEvent> {
        self.events.get(index).map(kevent_to_event)
    }
}

/// Create a `timespec` from a duration.
fn timespec_from_duration(duration: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: cmp::min(duration.as_secs(), libc::time_t::MAX as u64) as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    }
}

/// The kqueue filter for a single interest.
fn interest_to_filter(interest: Interests) -> kevent_filter_t {
    if interest.is_readable() {
        libc::EVFILT_READ
    } else {
        libc::EVFILT_WRITE
    }
}

/// Convert a `kevent` into a `NativeEvent`.
fn kevent_to_event(kevent: &libc::kevent) -> NativeEvent {
    let tag = Tag(kevent.udata as usize as u64);
    let mut readiness = Ready::empty();

    if kevent.filter == libc::EVFILT_READ {
        readiness |= Ready::READABLE;
    }

    if kevent.filter == libc::EVFILT_WRITE {
        readiness |= Ready::WRITABLE;
    }

    if contains_flag(kevent.flags, libc::EV_EOF) {
        readiness |= Ready::HUP;

        // When the read end of the socket is closed, EV_EOF is set on
        // flags, and fflags contains the error if there is one.
        if kevent.fflags != 0 {
            readiness |= Ready::ERROR;
        }
    }

    if contains_flag(kevent.flags, libc::EV_ERROR) {
        // The actual error is stored in `kevent.data`, but we can't pass it
        // to the user from here. So the user needs to try and retrieve the
        // error themselves.
        readiness |= Ready::ERROR;
    }

    NativeEvent { tag, readiness }
}

/// Create a new `kevent`.
fn new_kevent(fd: RawFd, filter: kevent_filter_t, flags: kevent_flags_t, tag: Tag) -> libc::kevent {
    // Zeroed as some platforms have additional fields.
    let mut kevent: libc::kevent = unsafe { mem::zeroed() };
    kevent.ident = fd as libc::uintptr_t;
    kevent.filter = filter;
    kevent.flags = flags;
    kevent.udata = tag.0 as usize as kevent_udata_t;
    kevent
}

/// Apply `changes`, all of which must have `EV_RECEIPT` set.
fn kevent_register(kq: RawFd, changes: &mut [libc::kevent]) -> io::Result<()> {
    // No blocking.
    let timeout = libc::timespec { tv_sec: 0, tv_nsec: 0 };

    let ok = unsafe {
        libc::kevent(kq, changes.as_ptr(), changes.len() as nchanges_t,
            changes.as_mut_ptr(), changes.len() as nchanges_t, &timeout)
    };

    if ok == -1 {
        // EINTR is the only error that we can handle, but according to the man
        // page of FreeBSD: "When kevent() call fails with EINTR error, all
        // changes in the changelist have been applied", so we're done.
        //
        // EOPNOTSUPP (NetBSD only),
        // EACCES, EEBADF, FAULT, EINVAL and ESRCH: all have to do with invalid
        //                                          argument, which shouldn't
        //                                          happen or are the users
        //                                          fault, e.g. bad fd.
        // ENOMEM: can't handle.
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => Ok(()),
            _ => Err(err),
        }
    } else {
        check_errors(changes)
    }
}

/// Check all events for possible errors, it returns the first error found.
fn check_errors(events: &[libc::kevent]) -> io::Result<()> {
    for event in events {
        // Check for the error flag, the actual error will be in the `data`
        // field.
        if contains_flag(event.flags, libc::EV_ERROR) && event.data != 0 {
            return Err(io::Error::from_raw_os_error(event.data as i32));
        }
    }
    Ok(())
}

/// Whether or not the provided `flags` contains the provided `flag`.
const fn contains_flag(flags: kevent_flags_t, flag: kevent_flags_t) -> bool {
    (flags & flag) != 0
}
