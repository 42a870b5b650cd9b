use std::fmt;

/// Associates readiness events with the descriptor that was added.
///
/// `Id` is an optional argument to [`Pollset::add_with_id`] and is handed back
/// in every [`Event`] for that descriptor. When a descriptor is added using
/// [`Pollset::add`] the id defaults to the raw descriptor number.
///
/// `Id` does not have to be unique within a `Pollset`, it is effectively
/// opaque to the pollset.
///
/// [`Pollset::add_with_id`]: crate::Pollset::add_with_id
/// [`Pollset::add`]: crate::Pollset::add
/// [`Event`]: crate::event::Event
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Id(pub usize);

impl From<usize> for Id {
    fn from(val: usize) -> Id {
        Id(val)
    }
}

impl From<Id> for usize {
    fn from(val: Id) -> usize {
        val.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}
