//! Readiness event types.

use crate::Descriptor;

mod id;
mod interests;
mod ready;

pub use self::id::Id;
pub use self::interests::Interests;
pub use self::ready::Ready;

/// A readiness event.
///
/// `Event` is a [readiness state] paired with the [`Descriptor`] it was
/// reported for and the [`Id`] the descriptor was added with. It is returned
/// by [`Pollset::poll`].
///
/// [readiness state]: Ready
/// [`Pollset::poll`]: crate::Pollset::poll
///
/// # Examples
///
/// ```
/// use pollset::Descriptor;
/// use pollset::event::{Event, Id, Ready};
///
/// let event = Event::new(Descriptor::Socket(3), Id(0), Ready::READABLE | Ready::WRITABLE);
///
/// assert_eq!(event.descriptor(), Descriptor::Socket(3));
/// assert_eq!(event.id(), Id(0));
/// assert_eq!(event.readiness(), Ready::READABLE | Ready::WRITABLE);
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Event {
    descriptor: Descriptor,
    id: Id,
    readiness: Ready,
}

impl Event {
    /// Creates a new `Event`.
    pub fn new(descriptor: Descriptor, id: Id, readiness: Ready) -> Event {
        Event { descriptor, id, readiness }
    }

    /// Returns the descriptor the event is reported for.
    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    /// Returns the event's id.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the event's readiness.
    pub fn readiness(&self) -> Ready {
        self.readiness
    }
}
