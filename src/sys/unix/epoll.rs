use std::os::unix::io::RawFd;
use std::sync::atomic::AtomicI32;
use std::time::Duration;
use std::{io, ptr};

use log::error;

use crate::backend::{Backend, NativeEvent, NativeEvents, Tag};
use crate::event::{Interests, Ready};
use crate::sys::unix::{close_fd, duration_to_millis, load_fd};

/// Backend based on Linux's epoll.
///
/// Descriptors are watched level-triggered, with the tag stored in the `u64`
/// payload of the `epoll_event`.
#[derive(Debug)]
pub struct Selector {
    epfd: AtomicI32,
}

impl Selector {
    /// Create a new epoll instance.
    pub fn new() -> io::Result<Selector> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(Selector { epfd: AtomicI32::new(epfd) })
        }
    }
}

impl Backend for Selector {
    type Events = Events;

    fn watch(&self, fd: RawFd, interests: Interests, tag: Tag) -> io::Result<()> {
        // A single call for all interests, so this is atomic.
        let mut epoll_event = new_epoll_event(interests, tag);
        epoll_ctl(load_fd(&self.epfd), libc::EPOLL_CTL_ADD, fd, &mut epoll_event)
    }

    fn unwatch(&self, fd: RawFd, _interests: Interests) -> io::Result<()> {
        // epoll only has a single registration per descriptor, which is always
        // removed completely.
        epoll_ctl(load_fd(&self.epfd), libc::EPOLL_CTL_DEL, fd, ptr::null_mut())
    }

    fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<()> {
        events.events.clear();
        let events_cap = events.events.capacity().min(libc::c_int::MAX as usize) as libc::c_int;
        let timeout_ms = timeout.map(duration_to_millis).unwrap_or(-1);

        let n_events = unsafe {
            libc::epoll_wait(load_fd(&self.epfd), events.events.as_mut_ptr(), events_cap, timeout_ms)
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
        close_fd(&self.epfd)
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        if let Err(err) = close_fd(&self.epfd) {
            error!("error closing epoll: {}", err);
        }
    }
}

/// Native event buffer of [`Selector`].
#[derive(Debug)]
pub struct Events {
    events: Vec<libc::epoll_event>,
}

impl NativeEvents for Events {
    fn with_capacity(capacity: usize) -> Events {
        Events { events: Vec::with_capacity(capacity) }
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn get(&self, index: usize) -> Option<NativeEvent> {
        self.events.get(index).map(ep_event_to_event)
    }
}

/// Convert a `epoll_event` into a `NativeEvent`.
fn ep_event_to_event(ep_event: &libc::epoll_event) -> NativeEvent {
    let tag = Tag(ep_event.u64);
    let epoll = ep_event.events;
    let mut readiness = Ready::empty();

    if contains_flag(epoll, libc::EPOLLIN | libc::EPOLLPRI) {
        readiness |= Ready::READABLE;
    }

    if contains_flag(epoll, libc::EPOLLOUT) {
        readiness |= Ready::WRITABLE;
    }

    if contains_flag(epoll, libc::EPOLLERR) {
        readiness |= Ready::ERROR;
    }

    if contains_flag(epoll, libc::EPOLLRDHUP | libc::EPOLLHUP) {
        readiness |= Ready::HUP;
    }

    NativeEvent { tag, readiness }
}

/// Whether or not the provided `flags` contains the provided `flag`.
fn contains_flag(flags: u32, flag: libc::c_int) -> bool {
    (flags & flag as u32) != 0
}

/// Create a new `epoll_event`.
fn new_epoll_event(interests: Interests, tag: Tag) -> libc::epoll_event {
    libc::epoll_event {
        events: to_epoll_events(interests),
        u64: tag.0,
    }
}

fn to_epoll_events(interests: Interests) -> u32 {
    let mut events = libc::EPOLLRDHUP;

    if interests.is_readable() {
        events |= libc::EPOLLIN | libc::EPOLLPRI;
    }

    if interests.is_writable() {
        events |= libc::EPOLLOUT;
    }

    events as u32
}

fn epoll_ctl(epfd: RawFd, op: libc::c_int, fd: RawFd, event: *mut libc::epoll_event) -> io::Result<()> {
    if unsafe { libc::epoll_ctl(epfd, op, fd, event) } == -1 {
        // Possible errors:
        // EBADF, EEXIST, ENOENT, EPERM: user error.
        // EINVAL, ELOOP: shouldn't happen.
        // ENOMEM, ENOSPC: can't handle.
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
