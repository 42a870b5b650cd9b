//! Tests of the provided backends, used directly and by a `Pollset`.

use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pollset::backend::{Backend, NativeEvents, Poll, PollEvents, Selector, SelectorEvents, Tag};
use pollset::event::{Interests, Ready};
use pollset::{Descriptor, Pollset, RingStats};

mod util;

use self::util::{expect_events, expect_no_events, fill_send_buffer, init, simplify};

const TIMEOUT: Option<Duration> = Some(Duration::from_millis(500));

fn assert_errno<T: std::fmt::Debug>(result: std::io::Result<T>, errno: i32) {
    match result {
        Ok(value) => panic!("unexpected OK result: {:?}", value),
        Err(err) => assert_eq!(err.raw_os_error(), Some(errno), "unexpected error: {}", err),
    }
}

/// Collect all events in `events` as `(Tag, Ready)` pairs.
fn collect<E: NativeEvents>(events: &E) -> Vec<(Tag, Ready)> {
    (0..events.len())
        .filter_map(|index| events.get(index))
        .map(|event| (event.tag, event.readiness))
        .collect()
}

#[test]
fn selector_watch_and_wait() {
    init();
    let selector = Selector::new().unwrap();
    let mut events = SelectorEvents::with_capacity(8);

    let (mut stream, mut peer) = UnixStream::pair().unwrap();
    let tag = Tag((1 << 16) | 3);
    selector.watch(stream.as_raw_fd(), Interests::READABLE, tag).unwrap();

    selector.wait(&mut events, Some(Duration::ZERO)).unwrap();
    assert!(events.is_empty());

    peer.write_all(b"Hello").unwrap();
    selector.wait(&mut events, TIMEOUT).unwrap();
    assert_eq!(collect(&events), vec![(tag, Ready::READABLE)]);

    let mut buf = [0; 8];
    assert_eq!(stream.read(&mut buf).unwrap(), 5);
    selector.unwatch(stream.as_raw_fd(), Interests::READABLE).unwrap();

    peer.write_all(b"Hello").unwrap();
    selector.wait(&mut events, Some(Duration::ZERO)).unwrap();
    assert!(events.is_empty());
}

#[test]
fn selector_errors() {
    init();
    let selector = Selector::new().unwrap();
    let (stream, _peer) = UnixStream::pair().unwrap();
    let fd = stream.as_raw_fd();

    assert_errno(selector.watch(-1, Interests::READABLE, Tag(0)), libc::EBADF);
    assert_errno(selector.unwatch(fd, Interests::READABLE), libc::ENOENT);

    selector.watch(fd, Interests::WRITABLE, Tag(0)).unwrap();
    // kqueue modifies an existing filter instead.
    #[cfg(any(target_os = "android", target_os = "linux"))]
    assert_errno(selector.watch(fd, Interests::WRITABLE, Tag(0)), libc::EEXIST);

    selector.close().unwrap();
    // Closing again is a no-op.
    selector.close().unwrap();
    assert_errno(selector.watch(fd, Interests::READABLE, Tag(0)), libc::EBADF);
    let mut events = SelectorEvents::with_capacity(1);
    assert_errno(selector.wait(&mut events, Some(Duration::ZERO)), libc::EBADF);
}

#[test]
fn selector_limits_events() {
    init();
    let selector = Selector::new().unwrap();
    let mut events = SelectorEvents::with_capacity(2);

    let streams: Vec<_> = (0..4).map(|_| UnixStream::pair().unwrap()).collect();
    for (index, (stream, _)) in streams.iter().enumerate() {
        selector.watch(stream.as_raw_fd(), Interests::WRITABLE, Tag(index as u64)).unwrap();
    }

    selector.wait(&mut events, TIMEOUT).unwrap();
    assert_eq!(events.len(), 2);
}

#[test]
fn poll_watch_and_wait() {
    init();
    let poll = Poll::new().unwrap();
    let mut events = PollEvents::with_capacity(8);

    let (stream, mut peer) = UnixStream::pair().unwrap();
    let tag = Tag(7);
    poll.watch(stream.as_raw_fd(), Interests::READABLE | Interests::WRITABLE, tag).unwrap();

    poll.wait(&mut events, TIMEOUT).unwrap();
    assert_eq!(collect(&events), vec![(tag, Ready::WRITABLE)]);

    peer.write_all(b"Hello").unwrap();
    poll.wait(&mut events, TIMEOUT).unwrap();
    assert_eq!(collect(&events), vec![(tag, Ready::READABLE | Ready::WRITABLE)]);

    // Unwatching a single interest keeps the other.
    poll.unwatch(stream.as_raw_fd(), Interests::WRITABLE).unwrap();
    poll.wait(&mut events, TIMEOUT).unwrap();
    assert_eq!(collect(&events), vec![(tag, Ready::READABLE)]);

    poll.unwatch(stream.as_raw_fd(), Interests::READABLE).unwrap();
    poll.wait(&mut events, Some(Duration::ZERO)).unwrap();
    assert!(events.is_empty());
}

#[test]
fn poll_errors() {
    init();
    let poll = Poll::new().unwrap();
    let (stream, _peer) = UnixStream::pair().unwrap();
    let fd = stream.as_raw_fd();

    assert_errno(poll.watch(-1, Interests::READABLE, Tag(0)), libc::EBADF);
    assert_errno(poll.unwatch(fd, Interests::READABLE), libc::ENOENT);

    poll.watch(fd, Interests::READABLE, Tag(0)).unwrap();
    assert_errno(poll.watch(fd, Interests::WRITABLE, Tag(0)), libc::EEXIST);
    // Not watched for writable, but readable is still unwatched.
    assert_errno(poll.unwatch(fd, Interests::READABLE | Interests::WRITABLE), libc::ENOENT);
    assert_errno(poll.unwatch(fd, Interests::READABLE), libc::ENOENT);

    poll.close().unwrap();
    poll.close().unwrap();
    assert_errno(poll.watch(fd, Interests::READABLE, Tag(0)), libc::EBADF);
    let mut events = PollEvents::with_capacity(1);
    assert_errno(poll.wait(&mut events, Some(Duration::ZERO)), libc::EBADF);
}

#[test]
fn pollset_with_poll_backend() {
    init();
    let pollset = Pollset::with_backend(Poll::new().unwrap(), 4, false).unwrap();

    let (a, mut a_peer) = UnixStream::pair().unwrap();
    let (mut b, _b_peer) = UnixStream::pair().unwrap();
    fill_send_buffer(&mut b);

    pollset.add(Descriptor::socket(&a), Interests::READABLE).unwrap();
    pollset.add(Descriptor::socket(&b), Interests::WRITABLE).unwrap();
    expect_no_events(&pollset);

    a_peer.write_all(b"Hello").unwrap();
    expect_events(&pollset, vec![(Descriptor::socket(&a), Ready::READABLE)]);

    assert!(pollset.remove(Descriptor::socket(&a)));
    expect_no_events(&pollset);
    assert_eq!(pollset.stats(), RingStats { active: 1, dead: 0, free: 1, allocated: 2 });

    // Invalid descriptors are rejected, like the other backends.
    let err = pollset.add(Descriptor::File(-1), Interests::READABLE).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    assert_eq!(pollset.len(), 1);
}

#[test]
fn poll_backend_wakes_on_watch() {
    init();
    let poll = Arc::new(Poll::new().unwrap());
    let (stream, _peer) = UnixStream::pair().unwrap();
    let tag = Tag(3);

    let handle = {
        let poll = Arc::clone(&poll);
        thread::spawn(move || {
            let mut events = PollEvents::with_capacity(4);
            let start = Instant::now();
            poll.wait(&mut events, Some(Duration::from_secs(2))).unwrap();
            (collect(&events), start.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(50));
    poll.watch(stream.as_raw_fd(), Interests::WRITABLE, tag).unwrap();

    let (events, elapsed) = handle.join().unwrap();
    assert_eq!(events, vec![(tag, Ready::WRITABLE)]);
    assert!(elapsed < Duration::from_secs(1), "wait wasn't woken: {:?}", elapsed);
}

#[test]
fn poll_backend_wake_keeps_timeout() {
    init();
    let poll = Poll::new().unwrap();
    let (stream, _peer) = UnixStream::pair().unwrap();
    let mut events = PollEvents::with_capacity(4);

    // Pending wake up from watching, but nothing is ready.
    poll.watch(stream.as_raw_fd(), Interests::READABLE, Tag(0)).unwrap();
    let timeout = Duration::from_millis(100);
    let start = Instant::now();
    poll.wait(&mut events, Some(timeout)).unwrap();
    assert!(events.is_empty());
    assert!(start.elapsed() >= timeout, "wait returned early: {:?}", start.elapsed());
}

#[test]
fn pollset_with_poll_backend_add_while_polling() {
    init();
    let pollset = Arc::new(Pollset::with_backend(Poll::new().unwrap(), 4, true).unwrap());
    let (stream, _peer) = UnixStream::pair().unwrap();
    let descriptor = Descriptor::socket(&stream);

    let handle = {
        let pollset = Arc::clone(&pollset);
        thread::spawn(move || {
            let mut events = Vec::new();
            let start = Instant::now();
            pollset.poll(&mut events, Some(Duration::from_secs(2))).unwrap();
            (simplify(&events), start.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(50));
    pollset.add(descriptor, Interests::WRITABLE).unwrap();

    let (events, elapsed) = handle.join().unwrap();
    assert_eq!(events, vec![(descriptor, Ready::WRITABLE)]);
    assert!(elapsed < Duration::from_secs(1), "poll wasn't woken: {:?}", elapsed);
}
