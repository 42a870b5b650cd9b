//! Platform specific types.
//!
//! Each platform must have at least the following types:
//!
//! * `Selector`: the default native backend, e.g. `kqueue` or `epoll`.
//! * `SelectorEvents`: the native event buffer of `Selector`.
//! * `Poll` and `PollEvents`: the `poll(2)` based fallback backend.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use self::unix::*;
