use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

/// Whether or not a locking primitive is available on this host.
pub(crate) const THREADS_AVAILABLE: bool = cfg!(target_has_atomic = "ptr");

/// Lock that only blocks if the pollset was created thread safe.
///
/// In single threaded mode acquiring the lock never blocks, the caller
/// promised not to use the pollset concurrently so the lock must always be
/// free. If it's not that promise was broken and we panic rather than
/// corrupting the rings.
///
/// A poisoned lock is recovered, the guarded state is consistent at every
/// point a panic can happen while holding it.
#[derive(Debug)]
pub(crate) struct Lock<T> {
    inner: Mutex<T>,
    thread_safe: bool,
}

impl<T> Lock<T> {
    pub(crate) const fn new(value: T, thread_safe: bool) -> Lock<T> {
        Lock { inner: Mutex::new(value), thread_safe }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        if self.thread_safe {
            return self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        }

        match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(err)) => err.into_inner(),
            Err(TryLockError::WouldBlock) =>
                panic!("concurrent use of a pollset that was not created thread safe"),
        }
    }
}
