use bitflags::bitflags;

use crate::event::Interests;

bitflags! {
    /// A set of readiness event kinds.
    ///
    /// `Ready` is a set of operation descriptors indicating which kind of
    /// operation is ready to be performed. For example, `Ready::READABLE`
    /// indicates that the associated descriptor is ready to perform a read
    /// operation.
    ///
    /// `Ready` values can be combined together using the various bitwise
    /// operators, see examples below.
    ///
    /// Readable and writable readiness is only ever reported for a descriptor
    /// if it was [added] with the matching [`Interests`]. Error and hup
    /// readiness is always reported.
    ///
    /// [added]: crate::Pollset::add
    ///
    /// # Examples
    ///
    /// ```
    /// use pollset::event::Ready;
    ///
    /// let ready = Ready::READABLE | Ready::WRITABLE;
    ///
    /// assert!(ready.is_readable());
    /// assert!(ready.is_writable());
    /// assert!(!ready.is_error());
    /// ```
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct Ready: u8 {
        /// Readable readiness
        const READABLE = 0b0000_0001;
        /// Writable readiness.
        const WRITABLE = 0b0000_0010;
        /// Error readiness.
        const ERROR    = 0b0000_0100;
        /// Hup readiness, the other side hung up or the end of the file was
        /// reached.
        const HUP      = 0b0000_1000;
    }
}

impl Ready {
    /// Returns true if the value includes readable readiness.
    #[inline]
    pub fn is_readable(&self) -> bool {
        self.contains(Ready::READABLE)
    }

    /// Returns true if the value includes writable readiness.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.contains(Ready::WRITABLE)
    }

    /// Returns true if the value includes error readiness.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.contains(Ready::ERROR)
    }

    /// Returns true if the value includes HUP readiness.
    #[inline]
    pub fn is_hup(&self) -> bool {
        self.contains(Ready::HUP)
    }

    /// Remove any readable or writable readiness not included in `interests`.
    pub(crate) fn mask(self, interests: Interests) -> Ready {
        self & (Ready::from(interests) | Ready::ERROR | Ready::HUP)
    }
}

impl From<Interests> for Ready {
    fn from(interests: Interests) -> Ready {
        let mut ready = Ready::empty();
        if interests.is_readable() {
            ready |= Ready::READABLE;
        }
        if interests.is_writable() {
            ready |= Ready::WRITABLE;
        }
        ready
    }
}
