//! Thread-safe readiness notification set.
//!
//! # Implementation notes
//!
//! Every added descriptor has a record, which is in one of three rings:
//!
//!  * active: the descriptor is added and watched by the backend.
//!  * dead: the descriptor was removed, but a poll that started before the
//!    removal might still get an event tagged with this record from the
//!    backend.
//!  * free: the record can be reused for the next added descriptor.
//!
//! A removed record moves to the dead ring, and only moves to the free ring
//! once a poll that *started* after the removal has returned. That poll is
//! proof that the backend no longer holds an event for the record, as the
//! descriptor was unwatched before it started.

use std::{fmt, io};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, error, trace};

use crate::backend::{Backend, NativeEvents, Selector};
use crate::event::{Event, Id, Interests};
use crate::{Descriptor, Error};

mod lock;
mod rings;

pub use self::rings::RingStats;

use self::lock::{Lock, THREADS_AVAILABLE};
use self::rings::Rings;

/// Readiness notification set.
///
/// A `Pollset` monitors a set of [descriptors], waiting until one or more
/// become ready for [reading] or [writing], or until a timeout elapses.
///
/// Descriptors are [added] with the interests to monitor and [removed] by
/// descriptor. Calling [`poll`] blocks until readiness or the timeout and
/// fills a caller owned buffer with the [events] for the descriptors that are
/// ready.
///
/// If created thread safe all methods can be called concurrently from
/// multiple threads, e.g. one thread blocked in `poll` while others add and
/// remove descriptors. If not created thread safe the caller must ensure it's
/// never used concurrently, doing so panics.
///
/// By default the pollset is backed by the platform's [`Selector`], a
/// different [`Backend`] can be used with [`Pollset::with_backend`].
///
/// [descriptors]: Descriptor
/// [reading]: crate::event::Ready::READABLE
/// [writing]: crate::event::Ready::WRITABLE
/// [added]: Pollset::add
/// [removed]: Pollset::remove
/// [`poll`]: Pollset::poll
/// [events]: Event
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::io::Write;
/// use std::os::unix::net::UnixStream;
///
/// use pollset::{Descriptor, Pollset};
/// use pollset::event::Interests;
///
/// let pollset = Pollset::new(16, false)?;
/// let mut events = Vec::new();
///
/// let (stream, mut peer) = UnixStream::pair()?;
/// pollset.add(Descriptor::socket(&stream), Interests::READABLE)?;
///
/// peer.write_all(b"Hello world")?;
///
/// let n = pollset.poll(&mut events, None)?;
/// assert_eq!(n, 1);
/// assert_eq!(events[0].descriptor(), Descriptor::socket(&stream));
/// assert!(events[0].readiness().is_readable());
/// #     Ok(())
/// # }
/// ```
pub struct Pollset<B = Selector>
    where B: Backend,
{
    backend: B,
    rings: Lock<Rings>,
    /// Native event buffer, only used by a single call to `poll` at a time.
    native: Lock<B::Events>,
    capacity: usize,
    thread_safe: bool,
    destroyed: AtomicBool,
}

impl Pollset {
    /// Create a new `Pollset` backed by the platform's default [`Selector`].
    ///
    /// `capacity` is the maximum number of descriptors that can be added at
    /// the same time, and the maximum number of events returned by a single
    /// call to [`poll`].
    ///
    /// [`poll`]: Pollset::poll
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceExhausted`] if the native facility can't be
    /// created, or [`Error::NotImplemented`] if `thread_safe` is requested on
    /// a host without locking support.
    ///
    /// # Panics
    ///
    /// This panics if `capacity` is zero.
    pub fn new(capacity: usize, thread_safe: bool) -> Result<Pollset, Error> {
        let backend = Selector::new().map_err(Error::ResourceExhausted)?;
        Pollset::with_backend(backend, capacity, thread_safe)
    }
}

impl<B> Pollset<B>
    where B: Backend,
{
    /// Create a new `Pollset` using the provided `backend`.
    ///
    /// See [`Pollset::new`] for the arguments and errors.
    pub fn with_backend(backend: B, capacity: usize, thread_safe: bool) -> Result<Pollset<B>, Error> {
        assert!(capacity > 0, "pollset capacity must be non-zero");
        check_thread_safety(thread_safe)?;
        trace!("creating pollset: capacity={}, thread_safe={}", capacity, thread_safe);

        Ok(Pollset {
            backend,
            rings: Lock::new(Rings::new(), thread_safe),
            native: Lock::new(B::Events::with_capacity(capacity), thread_safe),
            capacity,
            thread_safe,
            destroyed: AtomicBool::new(false),
        })
    }

    /// Add a `descriptor` to the pollset, monitoring it for `interests`.
    ///
    /// The [`Id`] of the events for the descriptor will be the raw descriptor
    /// number, use [`add_with_id`] to use a different id.
    ///
    /// [`add_with_id`]: Pollset::add_with_id
    ///
    /// # Errors
    ///
    /// If the backend can't watch the descriptor, e.g. because it's invalid,
    /// [`Error::BackendRejected`] is returned and nothing is watched.
    ///
    /// The descriptor can only be added once, adding an already added
    /// descriptor returns [`Error::BackendRejected`] with `EEXIST`. Adding
    /// more descriptors than the capacity of the pollset returns
    /// [`Error::BackendRejected`] with `ENOSPC`.
    pub fn add(&self, descriptor: Descriptor, interests: Interests) -> Result<(), Error> {
        self.add_with_id(descriptor, interests, Id(descriptor.as_raw_fd() as usize))
    }

    /// Add a `descriptor` to the pollset, monitoring it for `interests`. All
    /// events for the descriptor will have the provided `id`.
    ///
    /// See [`Pollset::add`] for the errors.
    pub fn add_with_id(&self, descriptor: Descriptor, interests: Interests, id: Id) -> Result<(), Error> {
        trace!("adding descriptor: descriptor={:?}, interests={:?}, id={}", descriptor, interests, id);
        let mut rings = self.rings.lock();

        if rings.find_active(descriptor).is_some() {
            return Err(Error::BackendRejected(io::Error::from_raw_os_error(libc::EEXIST)));
        } else if rings.active_len() >= self.capacity {
            return Err(Error::BackendRejected(io::Error::from_raw_os_error(libc::ENOSPC)));
        }

        let tag = match rings.allocate(descriptor, interests, id) {
            Some(tag) => tag,
            None => return Err(Error::BackendRejected(io::Error::from_raw_os_error(libc::ENOSPC))),
        };
        match self.backend.watch(descriptor.as_raw_fd(), interests, tag) {
            Ok(()) => {
                rings.activate(tag);
                Ok(())
            },
            Err(err) => {
                debug!("backend rejected descriptor: descriptor={:?}, err={}", descriptor, err);
                rings.release(tag);
                Err(Error::BackendRejected(err))
            },
        }
    }

    /// Remove a `descriptor` from the pollset.
    ///
    /// Returns `true` if the descriptor was added, `false` otherwise. Removing
    /// a descriptor that was never added, or was already removed, is not an
    /// error.
    ///
    /// Events for the descriptor may still be returned by a call to [`poll`]
    /// that was in progress while the descriptor was removed.
    ///
    /// [`poll`]: Pollset::poll
    pub fn remove(&self, descriptor: Descriptor) -> bool {
        trace!("removing descriptor: descriptor={:?}", descriptor);
        let mut rings = self.rings.lock();

        let found = rings.find_active(descriptor);
        // Without a record we don't know the interests, try to unwatch all.
        let interests = found.map_or(Interests::BOTH, |index| rings.record(index).interests);
        if let Err(err) = self.unwatch(descriptor, interests) {
            debug!("unable to unwatch descriptor: descriptor={:?}, err={}", descriptor, err);
        }

        match found {
            Some(index) => {
                rings.retire(index);
                true
            },
            None => false,
        }
    }

    /// Unwatch `descriptor` with the backend. The descriptor might already be
    /// closed or was never added, so any failure is reported as not found.
    fn unwatch(&self, descriptor: Descriptor, interests: Interests) -> Result<(), Error> {
        self.backend.unwatch(descriptor.as_raw_fd(), interests)
            .map_err(|err| {
                trace!("backend unwatch failed: descriptor={:?}, err={}", descriptor, err);
                Error::NotFound
            })
    }

    /// Poll for readiness events.
    ///
    /// This blocks until at least one descriptor is ready or until `timeout`
    /// elapses. A timeout of `None` blocks indefinitely, a timeout of zero
    /// returns immediately.
    ///
    /// `events` is cleared and filled with at most the capacity of the
    /// pollset of [`Event`]s, the number of events is returned. The events
    /// are owned by the caller, so they stay valid across later calls to
    /// `poll`. In thread safe mode concurrent calls to `poll` are serialised.
    ///
    /// # Errors
    ///
    /// If no descriptor became ready before the timeout elapsed
    /// [`Error::TimedOut`] is returned, this is expected and not really an
    /// error. If waiting fails, e.g. due to it being interrupted by a signal,
    /// [`Error::Os`] is returned.
    pub fn poll(&self, events: &mut Vec<Event>, timeout: Option<Duration>) -> Result<usize, Error> {
        trace!("polling pollset: timeout={:?}", timeout);
        events.clear();
        let mut native = self.native.lock();
        let marker = self.rings.lock().retired();

        let result = self.backend.wait(&mut *native, timeout);

        let mut rings = self.rings.lock();
        let result = match result {
            Ok(()) if native.is_empty() => Err(Error::TimedOut),
            Ok(()) => {
                for index in 0..native.len() {
                    let native_event = match native.get(index) {
                        Some(native_event) => native_event,
                        None => break,
                    };
                    let record = match rings.resolve(native_event.tag) {
                        Some(record) => record,
                        None => {
                            debug!("dropping event with stale tag: tag={:?}", native_event.tag);
                            continue;
                        },
                    };
                    record.readiness = native_event.readiness.mask(record.interests);
                    if !record.readiness.is_empty() {
                        events.push(Event::new(record.descriptor, record.id, record.readiness));
                    }
                }
                Ok(events.len())
            },
            Err(err) => Err(Error::Os(err)),
        };

        // Any record that was dead before we started can't be referenced by
        // the backend anymore.
        rings.reclaim(marker);
        result
    }

    /// Release the native facility.
    ///
    /// Only the first call releases it, any later call is a no-op. This is
    /// also called when the pollset is dropped. With the provided backends
    /// all operations on a destroyed pollset fail with a `EBADF` error.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        trace!("destroying pollset");
        if let Err(err) = self.backend.close() {
            // Never retried, the handle might be closed already.
            error!("error closing pollset backend: {}", err);
        }
    }

    /// The capacity the pollset was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of descriptors currently added.
    pub fn len(&self) -> usize {
        self.rings.lock().active_len()
    }

    /// Whether or not no descriptors are added.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether or not the pollset was created thread safe.
    pub fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }

    /// The backend of the pollset.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The current sizes of the record rings.
    pub fn stats(&self) -> RingStats {
        self.rings.lock().stats()
    }
}

fn check_thread_safety(thread_safe: bool) -> Result<(), Error> {
    if thread_safe && !THREADS_AVAILABLE {
        Err(Error::NotImplemented)
    } else {
        Ok(())
    }
}

impl<B> Drop for Pollset<B>
    where B: Backend,
{
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<B> fmt::Debug for Pollset<B>
    where B: Backend + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Pollset")
            .field("backend", &self.backend)
            .field("capacity", &self.capacity)
            .field("thread_safe", &self.thread_safe)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
