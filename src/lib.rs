//! A portable, thread-safe readiness notification set. The core of the
//! library is [`Pollset`], which monitors a set of descriptors (sockets or
//! files) and blocks until one or more of them become ready for reading or
//! writing.
//!
//! A `Pollset` is backed by the native readiness facility of the operating
//! system, kqueue or epoll, see the [`backend`] module. Other facilities can
//! be plugged in by implementing [`Backend`].
//!
//! [`Backend`]: backend::Backend
//!
//! # Usage
//!
//! Using the library starts by creating a [`Pollset`], with the maximum number
//! of descriptors it may hold and whether or not it must be safe to use from
//! multiple threads at the same time.
//!
//! Next [descriptors] are [added] with the [interests] to monitor. Then the
//! pollset can be [polled], which blocks until at least one descriptor is
//! ready or until the timeout expires. Next it's the applications turn to
//! process each [event]. Do this in a loop and you've got yourself an event
//! loop.
//!
//! [descriptors]: Descriptor
//! [added]: Pollset::add
//! [interests]: event::Interests
//! [polled]: Pollset::poll
//! [event]: Event
//!
//! # Examples
//!
//! The example below shows a simple non-blocking echo server using Unix
//! sockets.
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::io::{self, Read, Write};
//! use std::os::unix::net::UnixStream;
//! use std::time::Duration;
//!
//! use pollset::event::Interests;
//! use pollset::{Descriptor, Error, Pollset};
//!
//! // Create a pollset that can hold up to 128 descriptors, which we'll only
//! // use from a single thread.
//! let pollset = Pollset::new(128, false)?;
//! // Buffer to receive the events, reused on each poll.
//! let mut events = Vec::new();
//!
//! // Our "server" end of a connection, and the "client" end.
//! let (mut stream, mut client) = UnixStream::pair()?;
//! stream.set_nonblocking(true)?;
//!
//! // Add the stream so we can receive readiness events about incoming data.
//! pollset.add(Descriptor::socket(&stream), Interests::READABLE)?;
//!
//! client.write_all(b"Hello world")?;
//!
//! // Start our event loop.
//! # let mut i = 0;
//! loop {
//! #   i += 1;
//! #   if i == 2 { return Ok(()) }
//!     match pollset.poll(&mut events, Some(Duration::from_secs(1))) {
//!         Ok(_) => {},
//!         // No readiness within a second, try again.
//!         Err(Error::TimedOut) => continue,
//!         Err(err) => return Err(err.into()),
//!     }
//!
//!     // Process each event.
//!     for event in &events {
//!         if event.readiness().is_readable() {
//!             let mut buf = [0; 128];
//!             match stream.read(&mut buf) {
//!                 Ok(n) => stream.write_all(&buf[..n])?,
//!                 Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {},
//!                 Err(err) => return Err(err.into()),
//!             }
//!         }
//!     }
//! }
//! # }
//! ```

#![warn(anonymous_parameters,
        bare_trait_objects,
        missing_debug_implementations,
        missing_docs,
        trivial_casts,
        trivial_numeric_casts,
        unused_extern_crates,
        unused_import_braces,
        unused_qualifications,
        variant_size_differences,
)]

// Disallow warnings in examples, we want to set a good example after all.
#![doc(test(attr(deny(warnings))))]

#[cfg(not(unix))]
compile_error!("pollset only supports unix platforms");

mod descriptor;
mod error;
mod pollset;
mod sys;

pub mod backend;
pub mod event;

pub use crate::descriptor::Descriptor;
pub use crate::error::Error;
pub use crate::pollset::{Pollset, RingStats};

#[doc(no_inline)]
pub use crate::event::{Event, Interests, Ready};
