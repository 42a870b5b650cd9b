use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

use crate::backend::{Backend, NativeEvent, NativeEvents, Tag};
use crate::event::{Interests, Ready};
use crate::sys::unix::duration_to_millis;

/// Backend based on `poll(2)`, available on all unix platforms.
///
/// Unlike kqueue and epoll there is no kernel side registration, instead this
/// keeps a table of watched descriptors from which the `pollfd` array is
/// build on each call to [`wait`]. Changing the table wakes a blocked call to
/// `wait`, which then continues waiting on the new table for the remainder of
/// the timeout.
///
/// [`wait`]: Backend::wait
#[derive(Debug)]
pub struct Poll {
    registrations: Mutex<Vec<Registration>>,
    waker: Waker,
    closed: AtomicBool,
}

#[derive(Copy, Clone, Debug)]
struct Registration {
    fd: RawFd,
    interests: Ready,
    tag: Tag,
}

impl Poll {
    /// Create a new `poll(2)` backend.
    pub fn new() -> io::Result<Poll> {
        Ok(Poll {
            registrations: Mutex::new(Vec::new()),
            waker: Waker::new()?,
            closed: AtomicBool::new(false),
        })
    }

    /// Wake a blocked call to `wait` so it picks up the changed table.
    fn wake(&self) {
        if let Err(err) = self.waker.wake() {
            debug!("unable to wake poll backend: err={}", err);
        }
    }

    fn registrations(&self) -> io::Result<MutexGuard<'_, Vec<Registration>>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        Ok(self.registrations.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Backend for Poll {
    type Events = Events;

    fn watch(&self, fd: RawFd, interests: Interests, tag: Tag) -> io::Result<()> {
        // `poll(2)` silently ignores invalid descriptors, check it here so the
        // caller gets an error like it would with the other backends.
        if fd < 0 || unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }

        let mut registrations = self.registrations()?;
        if registrations.iter().any(|r| r.fd == fd) {
            return Err(io::Error::from_raw_os_error(libc::EEXIST));
        }
        registrations.push(Registration { fd, interests: Ready::from(interests), tag });
        drop(registrations);
        self.wake();
        Ok(())
    }

    fn unwatch(&self, fd: RawFd, interests: Interests) -> io::Result<()> {
        let mut registrations = self.registrations()?;
        let index = registrations.iter().position(|r| r.fd == fd)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))?;

        let registration = &mut registrations[index];
        let unwatched = Ready::from(interests);
        let missing = unwatched - registration.interests;
        registration.interests.remove(unwatched);
        if registration.interests.is_empty() {
            let _ = registrations.swap_remove(index);
        }
        drop(registrations);
        self.wake();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(io::Error::from_raw_os_error(libc::ENOENT))
        }
    }

    fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<()> {
        // Overflowing deadlines are treated as no timeout.
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        loop {
            events.clear();
            events.fds.push(libc::pollfd {
                fd: self.waker.reader.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            });
            {
                let registrations = self.registrations()?;
                for registration in registrations.iter() {
                    events.fds.push(libc::pollfd {
                        fd: registration.fd,
                        events: to_poll_events(registration.interests),
                        revents: 0,
                    });
                    events.tags.push(registration.tag);
                }
            }

            let timeout_ms = match deadline {
                Some(deadline) => duration_to_millis(deadline.saturating_duration_since(Instant::now())),
                None if timeout.is_some() => libc::c_int::MAX,
                None => -1,
            };
            let n_events = unsafe {
                libc::poll(events.fds.as_mut_ptr(), events.fds.len() as libc::nfds_t, timeout_ms)
            };
            if n_events == -1 {
                return Err(io::Error::last_os_error());
            }

            let capacity = events.capacity;
            let Events { fds, tags, ready, .. } = events;
            let (waker, fds) = fds.split_at(1);
            let woken = waker[0].revents != 0;
            if woken {
                self.waker.snooze()?;
            }

            let found = fds.iter().zip(tags.iter())
                .filter(|(pollfd, _)| pollfd.revents != 0)
                .take(capacity)
                .map(|(pollfd, tag)| NativeEvent { tag: *tag, readiness: revents_to_ready(pollfd.revents) });
            ready.extend(found);

            // Woken because the table changed, but nothing is ready yet: wait
            // on the new table.
            let expired = deadline.map_or(false, |deadline| Instant::now() >= deadline);
            if !woken || !ready.is_empty() || expired {
                return Ok(());
            }
        }
    }

    fn close(&self) -> io::Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.registrations.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
        Ok(())
    }
}

/// Native event buffer of [`Poll`].
#[derive(Debug)]
pub struct Events {
    /// `pollfd` array passed to `poll(2)`, the first entry is the waker.
    fds: Vec<libc::pollfd>,
    /// Tag of each entry in `fds`, except the waker.
    tags: Vec<Tag>,
    /// Translated events, at most `capacity`.
    ready: Vec<NativeEvent>,
    capacity: usize,
}

impl Events {
    fn clear(&mut self) {
        self.fds.clear();
        self.tags.clear();
        self.ready.clear();
    }
}

impl NativeEvents for Events {
    fn with_capacity(capacity: usize) -> Events {
        Events {
            fds: Vec::with_capacity(capacity + 1),
            tags: Vec::with_capacity(capacity),
            ready: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn len(&self) -> usize {
        self.ready.len()
    }

    fn get(&self, index: usize) -> Option<NativeEvent> {
        self.ready.get(index).copied()
    }
}

/// Self pipe used to wake a blocked `poll(2)` call.
#[derive(Debug)]
struct Waker {
    reader: UnixStream,
    writer: UnixStream,
}

impl Waker {
    fn new() -> io::Result<Waker> {
        let (writer, reader) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        writer.set_nonblocking(true)?;
        Ok(Waker { reader, writer })
    }

    fn wake(&self) -> io::Result<()> {
        match (&self.writer).write(&[1]) {
            Ok(_) => Ok(()),
            // Buffer is full, so a wake up is already pending.
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Drain all pending wake ups.
    fn snooze(&self) -> io::Result<()> {
        let mut buf = [0; 64];
        loop {
            match (&self.reader).read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

fn to_poll_events(interests: Ready) -> libc::c_short {
    let mut events = 0;
    if interests.is_readable() {
        events |= libc::POLLIN | libc::POLLPRI;
    }
    if interests.is_writable() {
        events |= libc::POLLOUT;
    }
    events
}

/// Convert the returned events of a `pollfd` into `Ready`.
fn revents_to_ready(revents: libc::c_short) -> Ready {
    let mut readiness = Ready::empty();

    if (revents & (libc::POLLIN | libc::POLLPRI)) != 0 {
        readiness |= Ready::READABLE;
    }

    if (revents & libc::POLLOUT) != 0 {
        readiness |= Ready::WRITABLE;
    }

    if (revents & (libc::POLLERR | libc::POLLNVAL)) != 0 {
        readiness |= Ready::ERROR;
    }

    if (revents & libc::POLLHUP) != 0 {
        readiness |= Ready::HUP;
    }

    readiness
}
