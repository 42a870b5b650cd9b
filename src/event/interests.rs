use std::num::NonZeroU8;
use std::ops::BitOr;

/// Interests used in [adding] a descriptor to a [`Pollset`].
///
/// Interests indicate what readiness should be monitored for. For example if
/// a socket is added with [readable] interests and the socket becomes
/// writable, no writable event will be returned from [`poll`].
///
/// `Interests` can never be empty, a descriptor is always added with at least
/// one interest.
///
/// [adding]: crate::Pollset::add
/// [`Pollset`]: crate::Pollset
/// [readable]: Interests::READABLE
/// [`poll`]: crate::Pollset::poll
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Interests(NonZeroU8);

const READABLE: u8 = 1 << 0;
const WRITABLE: u8 = 1 << 1;

impl Interests {
    /// Readable interest.
    pub const READABLE: Interests = Interests(unsafe { NonZeroU8::new_unchecked(READABLE) });

    /// Writable interest.
    pub const WRITABLE: Interests = Interests(unsafe { NonZeroU8::new_unchecked(WRITABLE) });

    /// Both readable and writable interests, used when the interests of a
    /// descriptor are unknown.
    pub(crate) const BOTH: Interests = Interests(unsafe { NonZeroU8::new_unchecked(READABLE | WRITABLE) });

    /// Returns true if the value includes readable interest.
    #[inline]
    pub fn is_readable(self) -> bool {
        (self.0.get() & READABLE) != 0
    }

    /// Returns true if the value includes writable interest.
    #[inline]
    pub fn is_writable(self) -> bool {
        (self.0.get() & WRITABLE) != 0
    }

    /// Split the interests into the individual interests it contains, readable
    /// first.
    #[cfg_attr(any(target_os = "android", target_os = "linux"), allow(dead_code))]
    pub(crate) fn split(self) -> impl Iterator<Item = Interests> {
        [Interests::READABLE, Interests::WRITABLE].into_iter()
            .filter(move |interest| (self.0.get() & interest.0.get()) != 0)
    }
}

impl BitOr for Interests {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Interests(unsafe { NonZeroU8::new_unchecked(self.0.get() | rhs.0.get()) })
    }
}
