//! Session lock that counts acquisitions.

use std::sync::{
    Arc, MutexGuard,
    atomic::{AtomicUsize, Ordering},
};

use skein_core::SessionLock;
use skein_runtime::MutexSessionLock;

/// [`MutexSessionLock`] that counts how often it was acquired.
#[derive(Clone, Default)]
pub struct CountingSessionLock {
    inner: MutexSessionLock,
    acquisitions: Arc<AtomicUsize>,
}

impl CountingSessionLock {
    /// Create an unlocked lock with a zero count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the lock was acquired.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Check if the lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

impl SessionLock for CountingSessionLock {
    type Guard<'a> = MutexGuard<'a, ()>;

    fn acquire(&self) -> Self::Guard<'_> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.inner.acquire()
    }
}
