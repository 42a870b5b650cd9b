//! Collection of testing utilities.

// Not all functions are used in all tests, causing warnings of unused functions
// while other tests are actually using them.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::fmt;

use log::warn;

use pollset::backend::{Backend, NativeEvent, NativeEvents, Tag};
use pollset::event::{Interests, Ready};
use pollset::{Descriptor, Event, Pollset};

/// Allowed margin for deadlines to be overrun.
pub const TIMEOUT_MARGIN: Duration = Duration::from_millis(50);

/// Initialise the test setup, things like logging etc.
pub fn init() {
    let env = env_logger::Env::new().filter("LOG_LEVEL");
    // Logger could already be set, so we ignore the result.
    drop(env_logger::try_init_from_env(env));
}

/// Initialise the test setup (same as `init`) and create a `Pollset` with the
/// default backend.
pub fn init_with_pollset(capacity: usize, thread_safe: bool) -> Pollset {
    init();
    Pollset::new(capacity, thread_safe).expect("unable to create Pollset")
}

/// Poll `pollset` and compare the retrieved events with the `expected` ones.
/// The event is only loosely checked; it only checks if an events readiness
/// contains the expected readiness and the descriptors match.
pub fn expect_events<B: Backend>(pollset: &Pollset<B>, mut expected: Vec<(Descriptor, Ready)>) {
    let mut events = Vec::new();
    let _ = pollset.poll(&mut events, Some(Duration::from_millis(500)))
        .expect("unable to poll");

    for event in events.iter() {
        let index = expected.iter()
            .position(|(descriptor, readiness)| {
                event.descriptor() == *descriptor &&
                event.readiness().contains(*readiness)
            });

        if let Some(index) = index {
            let _ = expected.swap_remove(index);
        } else {
            // Must accept sporadic events.
            warn!("got unexpected event: {:?}", event);
        }
    }

    assert!(expected.is_empty(), "the following expected events were not found: {:?}", expected);
}

/// Poll `pollset` and make sure no events are returned.
pub fn expect_no_events<B: Backend>(pollset: &Pollset<B>) {
    let mut events = Vec::new();
    match pollset.poll(&mut events, Some(Duration::from_millis(50))) {
        Ok(_) => panic!("got unexpected events: {:?}", events),
        Err(err) => assert!(err.is_timed_out(), "unexpected error: {}", err),
    }
}

/// Assert that `result` is an error and the formatted error (via
/// `fmt::Display`) contains `expected_msg`.
pub fn assert_error<T, E: fmt::Display>(result: Result<T, E>, expected_msg: &str) {
    match result {
        Ok(_) => panic!("unexpected OK result"),
        Err(err) => assert!(err.to_string().contains(expected_msg),
            "wanted: {}, got: {}", expected_msg, err),
    }
}

/// Fill the send buffer of `stream` so it's no longer writable.
pub fn fill_send_buffer(stream: &mut UnixStream) {
    stream.set_nonblocking(true).expect("unable to set non-blocking");
    let buf = [0; 4096];
    loop {
        match stream.write(&buf) {
            Ok(_) => continue,
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => return,
            Err(err) => panic!("unexpected error filling send buffer: {}", err),
        }
    }
}

/// Returns the events as `(Descriptor, Ready)` pairs.
pub fn simplify(events: &[Event]) -> Vec<(Descriptor, Ready)> {
    events.iter().map(|event| (event.descriptor(), event.readiness())).collect()
}

/// A `Backend` implementation that is fully controlled by the test.
///
/// Readiness is only reported if it's marked using [`TestBackend::ready`].
/// Calls to `wait` can be blocked using [`TestBackend::gate`].
#[derive(Debug, Default)]
pub struct TestBackend {
    watched: Mutex<HashMap<RawFd, (Interests, Tag)>>,
    rejected: Mutex<Vec<RawFd>>,
    pending: Mutex<Vec<NativeEvent>>,
    gate: Mutex<Option<Gate>>,
    wait_error: Mutex<Option<i32>>,
    waits: AtomicUsize,
    closes: Arc<AtomicUsize>,
    closed: AtomicUsize,
}

#[derive(Debug)]
struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// Handle to control a gated [`TestBackend::wait`].
#[derive(Debug)]
pub struct GateHandle {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl GateHandle {
    /// Block until a call to `wait` has started.
    pub fn wait_entered(&self) {
        self.entered.recv_timeout(Duration::from_secs(5))
            .expect("wait was never called");
    }

    /// Let the blocked `wait` call return.
    pub fn release(&self) {
        self.release.send(()).expect("wait is no longer gated");
    }
}

impl TestBackend {
    pub fn new() -> TestBackend {
        TestBackend::default()
    }

    /// Make calls to `watch` for `fd` fail.
    pub fn reject(&self, fd: RawFd) {
        self.rejected.lock().unwrap().push(fd);
    }

    /// Mark `fd` as ready, returned by the next call to `wait`. `fd` must be
    /// watched.
    pub fn ready(&self, fd: RawFd, readiness: Ready) {
        let tag = self.watched.lock().unwrap().get(&fd)
            .map(|(_, tag)| *tag)
            .expect("marking unwatched descriptor as ready");
        self.pending.lock().unwrap().push(NativeEvent { tag, readiness });
    }

    /// Queue an event with an arbitrary tag.
    pub fn ready_tag(&self, tag: Tag, readiness: Ready) {
        self.pending.lock().unwrap().push(NativeEvent { tag, readiness });
    }

    /// Make the next call to `wait` fail with `errno`.
    pub fn fail_wait(&self, errno: i32) {
        *self.wait_error.lock().unwrap() = Some(errno);
    }

    /// Block the next call to `wait` until released.
    pub fn gate(&self) -> GateHandle {
        let (entered_send, entered_recv) = channel();
        let (release_send, release_recv) = channel();
        *self.gate.lock().unwrap() = Some(Gate { entered: entered_send, release: release_recv });
        GateHandle { entered: entered_recv, release: release_send }
    }

    /// Interests `fd` is watched with.
    pub fn watched(&self, fd: RawFd) -> Option<Interests> {
        self.watched.lock().unwrap().get(&fd).map(|(interests, _)| *interests)
    }

    /// Tag `fd` is watched with.
    pub fn tag(&self, fd: RawFd) -> Option<Tag> {
        self.watched.lock().unwrap().get(&fd).map(|(_, tag)| *tag)
    }

    /// Number of calls to `wait`.
    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    /// Number of calls to `close`.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Shared counter of the number of calls to `close`, usable after the
    /// backend is dropped.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    /// Number of times the backend was actually closed.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_open(&self) -> io::Result<()> {
        if self.closed() > 0 {
            Err(io::Error::from_raw_os_error(libc::EBADF))
        } else {
            Ok(())
        }
    }
}

impl Backend for TestBackend {
    type Events = TestEvents;

    fn watch(&self, fd: RawFd, interests: Interests, tag: Tag) -> io::Result<()> {
        self.check_open()?;
        if self.rejected.lock().unwrap().contains(&fd) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        let mut watched = self.watched.lock().unwrap();
        if watched.contains_key(&fd) {
            return Err(io::Error::from_raw_os_error(libc::EEXIST));
        }
        let _ = watched.insert(fd, (interests, tag));
        Ok(())
    }

    fn unwatch(&self, fd: RawFd, _interests: Interests) -> io::Result<()> {
        self.check_open()?;
        match self.watched.lock().unwrap().remove(&fd) {
            Some(_) => Ok(()),
            None => Err(io::Error::from_raw_os_error(libc::ENOENT)),
        }
    }

    fn wait(&self, events: &mut TestEvents, _timeout: Option<Duration>) -> io::Result<()> {
        let _ = self.waits.fetch_add(1, Ordering::SeqCst);
        events.events.clear();
        self.check_open()?;

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.send(()).unwrap();
            gate.release.recv().unwrap();
        }

        let wait_error = self.wait_error.lock().unwrap().take();
        if let Some(errno) = wait_error {
            return Err(io::Error::from_raw_os_error(errno));
        }

        let mut pending = self.pending.lock().unwrap();
        let n = pending.len().min(events.capacity);
        events.events.extend(pending.drain(..n));
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        if self.closes.fetch_add(1, Ordering::SeqCst) == 0 {
            let _ = self.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Native event buffer of [`TestBackend`].
#[derive(Debug)]
pub struct TestEvents {
    events: Vec<NativeEvent>,
    capacity: usize,
}

impl NativeEvents for TestEvents {
    fn with_capacity(capacity: usize) -> TestEvents {
        TestEvents { events: Vec::with_capacity(capacity), capacity }
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn get(&self, index: usize) -> Option<NativeEvent> {
        self.events.get(index).copied()
    }
}
