//! Backend strategies.
//!
//! A [`Backend`] translates between a native readiness facility and the
//! portable event model of [`Pollset`]. The following implementations are
//! provided:
//!
//! | OS      | Default [`Selector`] |
//! |---------|----------------------|
//! | FreeBSD | [kqueue](https://www.freebsd.org/cgi/man.cgi?query=kqueue) |
//! | Linux   | [epoll](http://man7.org/linux/man-pages/man7/epoll.7.html) |
//! | Mac OS  | [kqueue](https://developer.apple.com/legacy/library/documentation/Darwin/Reference/ManPages/man2/kqueue.2.html) |
//! | NetBSD  | [kqueue](http://netbsd.gw.com/cgi-bin/man-cgi?kqueue) |
//! | OpenBSD | [kqueue](https://man.openbsd.org/kqueue) |
//!
//! On all unix platforms the [`Poll`] backend, based on `poll(2)`, is
//! available as well.
//!
//! [`Pollset`]: crate::Pollset

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::event::{Interests, Ready};

pub use crate::sys::{Poll, PollEvents, Selector, SelectorEvents};

/// A native readiness facility.
///
/// All methods take `&self`, a backend must support [`wait`] being called
/// concurrently with [`watch`] and [`unwatch`] from other threads.
///
/// [`wait`]: Backend::wait
/// [`watch`]: Backend::watch
/// [`unwatch`]: Backend::unwatch
pub trait Backend: Send + Sync {
    /// The native event buffer filled by [`Backend::wait`].
    type Events: NativeEvents;

    /// Start watching `fd` for `interests`, any readiness event must be
    /// returned with `tag`.
    ///
    /// This must be atomic: if an error is returned `fd` must not be watched
    /// for any of the `interests`.
    fn watch(&self, fd: RawFd, interests: Interests, tag: Tag) -> io::Result<()>;

    /// Stop watching `fd` for `interests`.
    ///
    /// All `interests` must be attempted, the first error is returned.
    fn unwatch(&self, fd: RawFd, interests: Interests) -> io::Result<()>;

    /// Block until at least one watched descriptor is ready, or until
    /// `timeout` elapsed. A timeout of `None` means block indefinitely.
    ///
    /// `events` is cleared and filled with at most its capacity of events. If
    /// it's empty after returning the timeout elapsed.
    fn wait(&self, events: &mut Self::Events, timeout: Option<Duration>) -> io::Result<()>;

    /// Release the native handle.
    ///
    /// Only the first call may release the handle, any later call must be a
    /// no-op.
    fn close(&self) -> io::Result<()>;
}

/// Buffer of native events.
pub trait NativeEvents: Send {
    /// Create a new buffer that can hold `capacity` events.
    fn with_capacity(capacity: usize) -> Self;

    /// The number of events currently in the buffer.
    fn len(&self) -> usize;

    /// Whether or not the buffer is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the translated event at `index`.
    fn get(&self, index: usize) -> Option<NativeEvent>;
}

/// A native event translated into the portable model.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NativeEvent {
    /// The tag the descriptor was watched with.
    pub tag: Tag,
    /// The translated readiness.
    pub readiness: Ready,
}

/// Opaque identifier handed to the native facility when watching a
/// descriptor, and returned by it with each readiness event.
///
/// A tag packs the index of a record and the generation of that record. A
/// record's generation changes every time it's reused, which allows a tag
/// returned by the facility to be checked before it's trusted.
///
/// Some facilities (kqueue) only carry a pointer sized value, so the packed
/// tag never exceeds `usize::MAX`. On 32 bit targets this limits the number
/// of records to [`Tag::MAX_RECORDS`] and the generation to 16 bits.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Tag(pub u64);

#[cfg(target_pointer_width = "64")]
const INDEX_BITS: u32 = 32;
#[cfg(not(target_pointer_width = "64"))]
const INDEX_BITS: u32 = 16;

const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

impl Tag {
    /// Maximum number of records that can be addressed by a tag.
    pub const MAX_RECORDS: usize = INDEX_MASK as usize;

    /// Mask applied to generations, they wrap around within it.
    pub(crate) const GENERATION_MASK: u32 = (usize::MAX as u64 >> INDEX_BITS) as u32;

    /// Create a new tag.
    pub(crate) const fn new(index: u32, generation: u32) -> Tag {
        Tag((((generation & Tag::GENERATION_MASK) as u64) << INDEX_BITS) | (index as u64 & INDEX_MASK))
    }

    /// The index of the record.
    pub(crate) const fn index(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    /// The generation of the record.
    pub(crate) const fn generation(self) -> u32 {
        (self.0 >> INDEX_BITS) as u32
    }
}
