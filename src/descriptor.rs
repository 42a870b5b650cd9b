use std::os::unix::io::{AsRawFd, RawFd};

/// A descriptor that can be added to a [`Pollset`].
///
/// The pollset does not own the descriptor, it will never close it. The
/// caller must keep the descriptor open for as long as it's added, and should
/// [remove] it before closing it.
///
/// The identity of a descriptor, as used by [remove], is its raw descriptor
/// number irrespective of the kind.
///
/// [`Pollset`]: crate::Pollset
/// [remove]: crate::Pollset::remove
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::os::unix::io::AsRawFd;
/// use std::os::unix::net::UnixStream;
///
/// use pollset::Descriptor;
///
/// let (stream, _peer) = UnixStream::pair()?;
/// let descriptor = Descriptor::socket(&stream);
///
/// assert!(descriptor.is_socket());
/// assert_eq!(descriptor.as_raw_fd(), stream.as_raw_fd());
/// #     Ok(())
/// # }
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Descriptor {
    /// A socket.
    Socket(RawFd),
    /// Any other file, e.g. a pipe or character device.
    File(RawFd),
}

impl Descriptor {
    /// Create a socket descriptor.
    pub fn socket<S>(socket: &S) -> Descriptor
        where S: AsRawFd + ?Sized,
    {
        Descriptor::Socket(socket.as_raw_fd())
    }

    /// Create a file descriptor.
    pub fn file<F>(file: &F) -> Descriptor
        where F: AsRawFd + ?Sized,
    {
        Descriptor::File(file.as_raw_fd())
    }

    /// Whether or not the descriptor is a socket.
    pub fn is_socket(&self) -> bool {
        matches!(self, Descriptor::Socket(_))
    }

    /// Whether or not the descriptor is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, Descriptor::File(_))
    }

    /// Whether or not `self` and `other` identify the same underlying
    /// descriptor.
    pub(crate) fn same_as(&self, other: &Descriptor) -> bool {
        self.as_raw_fd() == other.as_raw_fd()
    }
}

impl AsRawFd for Descriptor {
    fn as_raw_fd(&self) -> RawFd {
        match *self {
            Descriptor::Socket(fd) | Descriptor::File(fd) => fd,
        }
    }
}
